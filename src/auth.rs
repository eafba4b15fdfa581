use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};

use crate::observability::AUTH_FAILURES_TOTAL;
use crate::tenant::is_valid_slug;

/// Shared-password auth. The database name is the tenant slug, so a
/// malformed one is refused before any engine is created for it.
#[derive(Debug)]
pub struct AgendaAuthSource {
    password: String,
}

impl AgendaAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for AgendaAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        if let Some(db) = login.database() {
            if !is_valid_slug(db) {
                metrics::counter!(AUTH_FAILURES_TOTAL).increment(1);
                return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                    "FATAL".into(),
                    "3D000".into(),
                    format!("invalid business name: {db}"),
                ))));
            }
        }
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}
