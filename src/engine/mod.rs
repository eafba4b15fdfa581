mod availability;
mod booking;
mod catalog;
mod conflict;
mod error;
mod lifecycle;
mod queries;
#[cfg(test)]
mod tests;

pub use availability::{candidate_starts, day_slots, free_starts, is_offered, merge_overlapping};
pub use conflict::cancellation_cutoff;
pub use error::{EngineError, Entity};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock};
use tracing::warn;
use ulid::Ulid;

use crate::limits::{COMMIT_RETRY_BACKOFF_MS, MAX_COMMIT_ATTEMPTS};
use crate::model::*;
use crate::notify::{DeliveryFailure, Dispatcher, Notice, NoticeKind};
use crate::wal::Wal;

pub type SharedProfessional = Arc<RwLock<ProfessionalState>>;

/// A committed mutation plus the fate of its post-commit notice.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    /// Set when the notice could not be delivered; the mutation stands.
    pub warning: Option<DeliveryFailure>,
}

impl<T> Outcome<T> {
    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    /// Start recording appends so a compaction snapshot can be completed
    /// with everything committed while it was being taken.
    BeginCompact,
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the tenant's WAL file.
struct WalWriter {
    wal: Wal,
    /// Events committed since `BeginCompact`, if a compaction is running.
    tail: Option<Vec<Event>>,
}

impl WalWriter {
    /// Every append that is already queued when the first one arrives joins
    /// the same batch and shares a single fsync.
    async fn run(mut self, mut rx: mpsc::Receiver<WalCommand>) {
        while let Some(cmd) = rx.recv().await {
            let (event, response) = match cmd {
                WalCommand::Append { event, response } => (event, response),
                other => {
                    self.handle_control(other);
                    continue;
                }
            };
            let mut batch: Vec<PendingAppend> = vec![(event, response)];
            let mut deferred = None;
            while let Ok(next) = rx.try_recv() {
                match next {
                    WalCommand::Append { event, response } => batch.push((event, response)),
                    other => {
                        deferred = Some(other);
                        break;
                    }
                }
            }
            self.commit_batch(batch);
            if let Some(other) = deferred {
                self.handle_control(other);
            }
        }
    }

    fn commit_batch(&mut self, batch: Vec<PendingAppend>) {
        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let started = std::time::Instant::now();

        let appended = batch
            .iter()
            .try_for_each(|(event, _)| self.wal.append_buffered(event));
        // Flush even after a failed append so half-written bytes do not leak
        // into the next batch.
        let flushed = self.wal.flush_sync();
        let result = appended.and(flushed);

        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        if result.is_ok()
            && let Some(tail) = self.tail.as_mut()
        {
            tail.extend(batch.iter().map(|(event, _)| event.clone()));
        }
        for (_, tx) in batch {
            let reply = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(reply);
        }
    }

    fn handle_control(&mut self, cmd: WalCommand) {
        match cmd {
            WalCommand::BeginCompact => self.tail = Some(Vec::new()),
            WalCommand::Compact {
                mut events,
                response,
            } => {
                events.extend(self.tail.take().unwrap_or_default());
                let result = Wal::write_compact_file(self.wal.path(), &events)
                    .and_then(|()| self.wal.swap_compact_file());
                let _ = response.send(result);
            }
            WalCommand::AppendsSinceCompact { response } => {
                let _ = response.send(self.wal.appends_since_compact());
            }
            WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
        }
    }
}

/// Apply a professional-scoped event. The caller holds the lock.
/// Booking the same appointment id twice is a no-op, so a retried commit
/// that reached the log more than once replays cleanly.
fn apply_to_professional(
    ps: &mut ProfessionalState,
    event: &Event,
    index: &DashMap<Ulid, Ulid>,
) {
    match event {
        Event::ProfessionalSaved { name, active, .. } => {
            ps.name = name.clone();
            ps.active = *active;
        }
        Event::AppointmentBooked { appointment } => {
            if ps.appointment(appointment.id).is_none() {
                index.insert(appointment.id, ps.id);
                ps.insert_appointment(appointment.clone());
            }
        }
        Event::StatusChanged { id, status, .. } => {
            if let Some(appointment) = ps.appointment_mut(*id) {
                appointment.status = *status;
            }
        }
        // Tenant-level events never reach a professional.
        Event::ProfileSaved { .. }
        | Event::HoursSet { .. }
        | Event::ServiceSaved { .. }
        | Event::ProfessionalRemoved { .. } => {}
    }
}

/// The professional an event belongs to, for professional-scoped events.
fn event_professional_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ProfessionalSaved { id, .. } => Some(*id),
        Event::AppointmentBooked { appointment } => Some(appointment.professional_id),
        Event::StatusChanged {
            professional_id, ..
        } => Some(*professional_id),
        Event::ProfileSaved { .. }
        | Event::HoursSet { .. }
        | Event::ServiceSaved { .. }
        | Event::ProfessionalRemoved { .. } => None,
    }
}

/// One tenant's scheduling state. Every lookup goes through this struct, so
/// nothing owned by another tenant is reachable from here.
pub struct Engine {
    tenant: String,
    pub(super) profile: RwLock<Option<TenantProfile>>,
    pub(super) hours: RwLock<WeeklyHours>,
    pub(super) services: DashMap<Ulid, Service>,
    /// One lock per professional: bookings for the same professional
    /// serialize, everything else runs in parallel.
    pub(super) professionals: DashMap<Ulid, SharedProfessional>,
    /// Reverse lookup: appointment id → professional id.
    pub(super) appointment_index: DashMap<Ulid, Ulid>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Held by catalog mutations across commit + apply, and by compaction
    /// while it snapshots, so a snapshot never misses a committed change.
    pub(super) catalog_lock: Mutex<()>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl Engine {
    pub fn new(
        tenant: impl Into<String>,
        wal_path: PathBuf,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(WalWriter { wal, tail: None }.run(wal_rx));

        let mut profile = None;
        let mut hours = WeeklyHours::default();
        let services = DashMap::new();
        let appointment_index = DashMap::new();
        let mut professionals: HashMap<Ulid, ProfessionalState> = HashMap::new();

        for event in &events {
            match event {
                Event::ProfileSaved { profile: p } => profile = Some(p.clone()),
                Event::HoursSet { weekday, hours: h } => hours.set(*weekday, *h),
                Event::ServiceSaved { service } => {
                    services.insert(service.id, service.clone());
                }
                Event::ProfessionalRemoved { id } => {
                    professionals.remove(id);
                }
                Event::ProfessionalSaved { id, name, active } => {
                    professionals
                        .entry(*id)
                        .or_insert_with(|| ProfessionalState::new(*id, name.clone(), *active));
                    if let Some(ps) = professionals.get_mut(id) {
                        apply_to_professional(ps, event, &appointment_index);
                    }
                }
                other => {
                    if let Some(pid) = event_professional_id(other)
                        && let Some(ps) = professionals.get_mut(&pid)
                    {
                        apply_to_professional(ps, other, &appointment_index);
                    }
                }
            }
        }

        Ok(Self {
            tenant: tenant.into(),
            profile: RwLock::new(profile),
            hours: RwLock::new(hours),
            services,
            professionals: professionals
                .into_iter()
                .map(|(id, ps)| (id, Arc::new(RwLock::new(ps))))
                .collect(),
            appointment_index,
            wal_tx,
            catalog_lock: Mutex::new(()),
            dispatcher,
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Write one event through the group-commit writer.
    async fn wal_append(&self, event: &Event) -> io::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| io::Error::other("WAL writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("WAL writer dropped response"))?
    }

    /// Durably record `event`, retrying transient store failures a bounded
    /// number of times before giving up with `Unavailable`.
    pub(super) async fn commit(&self, event: &Event) -> Result<(), EngineError> {
        let mut attempt = 1;
        loop {
            match self.wal_append(event).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < MAX_COMMIT_ATTEMPTS => {
                    warn!(tenant = %self.tenant, attempt, "WAL append failed, retrying: {e}");
                    tokio::time::sleep(Duration::from_millis(
                        COMMIT_RETRY_BACKOFF_MS * u64::from(attempt),
                    ))
                    .await;
                    attempt += 1;
                }
                Err(e) => return Err(EngineError::Unavailable(e.to_string())),
            }
        }
    }

    /// Commit + apply in one call, under the caller's professional lock.
    pub(super) async fn persist_and_apply(
        &self,
        ps: &mut ProfessionalState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.commit(event).await?;
        apply_to_professional(ps, event, &self.appointment_index);
        Ok(())
    }

    pub fn get_professional(&self, id: &Ulid) -> Option<SharedProfessional> {
        self.professionals.get(id).map(|e| e.value().clone())
    }

    /// The tenant profile, provided the business exists and is active.
    pub(super) async fn require_tenant(&self) -> Result<TenantProfile, EngineError> {
        match self.profile.read().await.as_ref() {
            Some(p) if p.active => Ok(p.clone()),
            _ => Err(EngineError::UnknownTenant),
        }
    }

    /// Lookup appointment → professional, acquire that professional's write lock.
    pub(super) async fn resolve_appointment_write(
        &self,
        appointment_id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<ProfessionalState>, EngineError> {
        let professional_id = self
            .appointment_index
            .get(&appointment_id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(Entity::Appointment, appointment_id))?;
        let ps = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(Entity::Appointment, appointment_id))?;
        Ok(ps.write_owned().await)
    }

    /// Hand a lifecycle notice to the dispatcher after the commit. Failure is
    /// logged and returned as a warning, never as an error.
    pub(super) async fn emit_notice(
        &self,
        profile: &TenantProfile,
        kind: NoticeKind,
        appointment: &Appointment,
    ) -> Option<DeliveryFailure> {
        let label = kind.label();
        let notice = Notice {
            tenant: self.tenant.clone(),
            business_name: profile.name.clone(),
            recipient: profile.notification_email.clone(),
            kind,
            appointment: appointment.clone(),
        };
        match self.dispatcher.dispatch(&notice).await {
            Ok(()) => None,
            Err(failure) => {
                warn!(
                    tenant = %self.tenant,
                    appointment = %appointment.id,
                    "{label} notice not delivered: {failure}"
                );
                metrics::counter!(crate::observability::NOTICE_FAILURES_TOTAL, "event" => label)
                    .increment(1);
                Some(failure)
            }
        }
    }

    /// Rewrite the WAL with the minimal event set that recreates current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog_lock.lock().await;
        self.wal_tx
            .send(WalCommand::BeginCompact)
            .await
            .map_err(|_| EngineError::Unavailable("WAL writer shut down".into()))?;

        let mut events = Vec::new();
        if let Some(profile) = self.profile.read().await.clone() {
            events.push(Event::ProfileSaved { profile });
        }
        for (weekday, hours) in self.hours.read().await.entries() {
            events.push(Event::HoursSet { weekday, hours });
        }
        for entry in self.services.iter() {
            events.push(Event::ServiceSaved {
                service: entry.value().clone(),
            });
        }
        let professionals: Vec<SharedProfessional> =
            self.professionals.iter().map(|e| e.value().clone()).collect();
        for ps in professionals {
            let guard = ps.read().await;
            events.push(Event::ProfessionalSaved {
                id: guard.id,
                name: guard.name.clone(),
                active: guard.active,
            });
            events.extend(guard.appointments.iter().map(|a| Event::AppointmentBooked {
                appointment: a.clone(),
            }));
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
