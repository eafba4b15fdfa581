use ulid::Ulid;

use crate::model::{Status, WallClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Professional,
    Service,
    Appointment,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Professional => "professional",
            Entity::Service => "service",
            Entity::Appointment => "appointment",
        })
    }
}

#[derive(Debug)]
pub enum EngineError {
    /// Malformed or out-of-range caller input; nothing was touched.
    InvalidInput(String),
    NotFound(Entity, Ulid),
    /// The tenant has no profile yet, or it is inactive.
    UnknownTenant,
    /// The requested interval is not bookable. `conflicting` names the
    /// appointment that holds it, `None` when it is not an offered slot at all.
    SlotTaken { conflicting: Option<Ulid> },
    NotCancellable(&'static str),
    TooLateToCancel { cutoff: WallClock },
    InvalidTransition { from: Status, to: Status },
    HasAppointments(Ulid),
    HoursNotConfigured(u8),
    LimitExceeded(&'static str),
    /// The store kept failing after bounded retries. Try again later.
    Unavailable(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::NotFound(entity, id) => write!(f, "{entity} not found: {id}"),
            EngineError::UnknownTenant => write!(f, "business not found or inactive"),
            EngineError::SlotTaken {
                conflicting: Some(id),
            } => write!(f, "slot taken: conflicts with appointment {id}"),
            EngineError::SlotTaken { conflicting: None } => {
                write!(f, "slot taken: requested time is not an available slot")
            }
            EngineError::NotCancellable(why) => write!(f, "appointment cannot be cancelled: {why}"),
            EngineError::TooLateToCancel { cutoff } => write!(
                f,
                "too late to cancel: cancellations close {} hours before the appointment (cutoff was {})",
                crate::limits::CANCELLATION_CUTOFF_MINUTES / 60,
                cutoff.format("%Y-%m-%d %H:%M")
            ),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid status transition: {from} -> {to}")
            }
            EngineError::HasAppointments(id) => {
                write!(f, "professional {id} has appointments and cannot be removed or deactivated")
            }
            EngineError::HoursNotConfigured(weekday) => {
                write!(f, "business hours not configured for weekday {weekday}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Unavailable(e) => write!(f, "store unavailable, try again later: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::NotFound(..) => "not_found",
            EngineError::UnknownTenant => "unknown_tenant",
            EngineError::SlotTaken { .. } => "slot_taken",
            EngineError::NotCancellable(_) => "not_cancellable",
            EngineError::TooLateToCancel { .. } => "too_late",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::HasAppointments(_) => "has_appointments",
            EngineError::HoursNotConfigured(_) => "hours_not_configured",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Unavailable(_) => "unavailable",
        }
    }
}
