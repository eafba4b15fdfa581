use chrono::{Datelike, Duration, NaiveDate};

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Latest instant (exclusive) at which a client may still cancel.
pub fn cancellation_cutoff(start: WallClock) -> WallClock {
    start - Duration::minutes(CANCELLATION_CUTOFF_MINUTES)
}

/// Dates outside four-digit years are refused before any calendar
/// arithmetic touches them.
pub(crate) fn validate_date(date: NaiveDate) -> Result<(), EngineError> {
    if (MIN_CALENDAR_YEAR..=MAX_CALENDAR_YEAR).contains(&date.year()) {
        Ok(())
    } else {
        Err(EngineError::InvalidInput(format!(
            "date out of range: {date} (years {MIN_CALENDAR_YEAR} to {MAX_CALENDAR_YEAR})"
        )))
    }
}

pub(crate) fn validate_slot_params(
    duration_minutes: u32,
    granularity_minutes: u32,
) -> Result<(), EngineError> {
    if duration_minutes == 0 {
        return Err(EngineError::InvalidInput("service duration must be positive".into()));
    }
    if granularity_minutes == 0 {
        return Err(EngineError::InvalidInput("slot granularity must be positive".into()));
    }
    if duration_minutes > MAX_SERVICE_DURATION_MINUTES {
        return Err(EngineError::LimitExceeded("service duration too long"));
    }
    Ok(())
}

pub(crate) fn validate_name(field: &str, name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidInput(format!("{field} is required")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

pub(crate) fn validate_client(client: &ClientInfo) -> Result<(), EngineError> {
    validate_name("client name", &client.name)?;
    validate_phone(&client.phone)?;
    if let Some(email) = &client.email {
        validate_email(email)?;
    }
    Ok(())
}

pub(crate) fn validate_phone(phone: &str) -> Result<(), EngineError> {
    if phone.trim().is_empty() {
        return Err(EngineError::InvalidInput("client phone is required".into()));
    }
    if phone.len() > MAX_PHONE_LEN {
        return Err(EngineError::LimitExceeded("phone too long"));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), EngineError> {
    if email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("email too long"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(EngineError::InvalidInput(format!("invalid email address: {email}"))),
    }
}

pub(crate) fn validate_text(
    text: Option<&str>,
    max: usize,
    what: &'static str,
) -> Result<(), EngineError> {
    match text {
        Some(t) if t.len() > max => Err(EngineError::LimitExceeded(what)),
        _ => Ok(()),
    }
}

/// The first blocking appointment overlapping `span` is the conflict.
pub(crate) fn check_no_overlap(ps: &ProfessionalState, span: &Span) -> Result<(), EngineError> {
    match ps.blocking_in(span).next() {
        Some(existing) => Err(EngineError::SlotTaken {
            conflicting: Some(existing.id),
        }),
        None => Ok(()),
    }
}
