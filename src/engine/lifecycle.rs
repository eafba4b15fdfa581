use tracing::info;
use ulid::Ulid;

use crate::limits::MAX_REASON_LEN;
use crate::model::*;
use crate::notify::NoticeKind;
use crate::observability::CANCELLATIONS_TOTAL;

use super::conflict::{cancellation_cutoff, validate_text};
use super::{Engine, EngineError, Entity, Outcome};

impl Engine {
    /// Staff-driven status change. Terminal appointments never move, and a
    /// transition to the current status is rejected.
    pub async fn update_status(&self, id: Ulid, status: Status) -> Result<Appointment, EngineError> {
        let mut guard = self.resolve_appointment_write(id).await?;
        let current = guard
            .appointment(id)
            .ok_or(EngineError::NotFound(Entity::Appointment, id))?
            .status;
        if !current.can_transition_to(status) {
            return Err(EngineError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let event = Event::StatusChanged {
            id,
            professional_id: guard.id,
            status,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        info!(tenant = %self.tenant(), appointment = %id, from = %current, to = %status, "status changed");

        guard
            .appointment(id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Appointment, id))
    }

    /// Client self-service cancellation. The phone on file is the only
    /// credential; cancellation closes `CANCELLATION_CUTOFF_MINUTES` before
    /// the start, measured against the caller's `now`.
    pub async fn cancel_by_client(
        &self,
        id: Ulid,
        phone: &str,
        reason: Option<String>,
        now: WallClock,
    ) -> Result<Outcome<Appointment>, EngineError> {
        let result = self.try_cancel(id, phone, reason, now).await;
        let outcome = match &result {
            Ok(_) => "cancelled",
            Err(e) => e.label(),
        };
        metrics::counter!(CANCELLATIONS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn try_cancel(
        &self,
        id: Ulid,
        phone: &str,
        reason: Option<String>,
        now: WallClock,
    ) -> Result<Outcome<Appointment>, EngineError> {
        let reason = reason.filter(|r| !r.trim().is_empty());
        validate_text(reason.as_deref(), MAX_REASON_LEN, "reason too long")?;
        let profile = self.require_tenant().await?;

        let mut guard = self.resolve_appointment_write(id).await?;
        let appointment = guard
            .appointment(id)
            .ok_or(EngineError::NotFound(Entity::Appointment, id))?;

        let phone = phone.trim();
        if phone.is_empty() || phone != appointment.client.phone {
            return Err(EngineError::NotCancellable("phone does not match the booking"));
        }
        if !appointment.status.is_blocking() {
            return Err(EngineError::NotCancellable("appointment is already closed"));
        }
        let cutoff = cancellation_cutoff(appointment.start);
        if now >= cutoff {
            return Err(EngineError::TooLateToCancel { cutoff });
        }

        let event = Event::StatusChanged {
            id,
            professional_id: guard.id,
            status: Status::Cancelled,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        let cancelled = guard
            .appointment(id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
        drop(guard);

        info!(tenant = %self.tenant(), appointment = %id, "appointment cancelled by client");

        let warning = self
            .emit_notice(&profile, NoticeKind::Cancelled { reason }, &cancelled)
            .await;
        Ok(Outcome {
            value: cancelled,
            warning,
        })
    }
}
