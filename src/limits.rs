//! Hard limits and scheduling policy constants.

// ── Scheduling policy ───────────────────────────────────────────

/// Step between candidate start times offered by availability.
pub const SLOT_GRANULARITY_MINUTES: u32 = 30;

/// Clients may cancel only while the appointment is further away than this.
pub const CANCELLATION_CUTOFF_MINUTES: i64 = 120;

/// How far back the client "my appointments" lookup reaches.
pub const CLIENT_LOOKUP_WINDOW_DAYS: i64 = 30;

/// Default forward window for the staff appointment list.
pub const STAFF_LIST_WINDOW_DAYS: i64 = 30;

/// Calendar years accepted for any date or start time. Four-digit years only.
pub const MIN_CALENDAR_YEAR: i32 = 1000;
pub const MAX_CALENDAR_YEAR: i32 = 9999;

/// WAL append attempts inside one booking before reporting `Unavailable`.
pub const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Linear backoff step between commit attempts.
pub const COMMIT_RETRY_BACKOFF_MS: u64 = 20;

// ── Tenants ─────────────────────────────────────────────────────

pub const MAX_TENANTS: usize = 10_000;
pub const MAX_TENANT_NAME_LEN: usize = 200;

// ── Catalog ─────────────────────────────────────────────────────

pub const MAX_PROFESSIONALS_PER_TENANT: usize = 1_000;
pub const MAX_SERVICES_PER_TENANT: usize = 1_000;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_SERVICE_DURATION_MINUTES: u32 = 24 * 60;

// ── Appointments ────────────────────────────────────────────────

pub const MAX_APPOINTMENTS_PER_PROFESSIONAL: usize = 200_000;
pub const MAX_PHONE_LEN: usize = 20;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_NOTES_LEN: usize = 2_000;
pub const MAX_REASON_LEN: usize = 500;
