use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::compactor;
use crate::engine::Engine;
use crate::limits::*;
use crate::notify::Dispatcher;

/// A tenant slug doubles as the WAL file stem, so it is restricted to ASCII
/// letters, digits, `-` and `_`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_TENANT_NAME_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Manages per-tenant engines. Each tenant gets its own Engine + WAL +
/// compactor. Tenant = database name from the pgwire connection.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    dispatcher: Arc<dyn Dispatcher>,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            dispatcher,
        }
    }

    /// Get or lazily open the engine for `slug`.
    pub fn get_or_create(&self, slug: &str) -> io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(slug) {
            return Ok(engine.value().clone());
        }
        if !is_valid_slug(slug) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "invalid tenant slug {slug:?}: expected 1 to {MAX_TENANT_NAME_LEN} ASCII letters, digits, '-' or '_'"
                ),
            ));
        }

        if self.engines.len() >= MAX_TENANTS {
            return Err(io::Error::other("too many tenants"));
        }

        // Two connections may race to open the same tenant; the entry lock
        // makes sure only one engine (and one WAL writer) ever exists.
        let engine = match self.engines.entry(slug.to_string()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(vacant) => {
                let wal_path = self.data_dir.join(format!("{slug}.wal"));
                let engine = Arc::new(Engine::new(slug, wal_path, self.dispatcher.clone())?);
                let compactor_engine = engine.clone();
                let threshold = self.compact_threshold;
                tokio::spawn(async move {
                    compactor::run_compactor(compactor_engine, threshold).await;
                });
                vacant.insert(engine.clone());
                engine
            }
        };

        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        info!(tenant = slug, "tenant engine opened");
        Ok(engine)
    }

    pub fn get(&self, slug: &str) -> Option<Arc<Engine>> {
        self.engines.get(slug).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
