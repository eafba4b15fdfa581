use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::NoticeKind;
use crate::observability::BOOKINGS_TOTAL;

use super::availability::is_offered;
use super::conflict::{
    check_no_overlap, validate_client, validate_date, validate_slot_params, validate_text,
};
use super::{Engine, EngineError, Entity, Outcome};

impl Engine {
    /// Book `request.start` for the requested service.
    ///
    /// The slot is re-validated under the professional's write lock, so of any
    /// number of concurrent requests for overlapping intervals exactly one
    /// commits and the rest get `SlotTaken`. The "created" notice goes out
    /// after the lock is released; a delivery failure only sets the warning.
    pub async fn book_appointment(
        &self,
        request: BookingRequest,
        now: WallClock,
    ) -> Result<Outcome<Appointment>, EngineError> {
        let result = self.try_book(request, now).await;
        let outcome = match &result {
            Ok(o) if o.is_degraded() => "booked_degraded",
            Ok(_) => "booked",
            Err(e) => e.label(),
        };
        metrics::counter!(BOOKINGS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn try_book(
        &self,
        request: BookingRequest,
        now: WallClock,
    ) -> Result<Outcome<Appointment>, EngineError> {
        let BookingRequest {
            professional_id,
            service_id,
            client,
            start,
            notes,
        } = request;

        let client = ClientInfo {
            name: client.name.trim().to_string(),
            phone: client.phone.trim().to_string(),
            email: client
                .email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        };
        validate_client(&client)?;
        let notes = notes.filter(|n| !n.trim().is_empty());
        validate_text(notes.as_deref(), MAX_NOTES_LEN, "notes too long")?;
        validate_date(start.date())?;

        let profile = self.require_tenant().await?;
        let service = self
            .services
            .get(&service_id)
            .map(|e| e.value().clone())
            .filter(|s| s.active)
            .ok_or(EngineError::NotFound(Entity::Service, service_id))?;
        validate_slot_params(service.duration_minutes, SLOT_GRANULARITY_MINUTES)?;

        let ps = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(Entity::Professional, professional_id))?;

        let date = start.date();
        let hours = self.hours_for(weekday_index(date)).await?;
        let span = Span::checked_starting_at(start, service.duration_minutes)
            .ok_or_else(|| EngineError::InvalidInput(format!("start out of range: {start}")))?;

        let mut guard = ps.write().await;
        if !guard.active {
            return Err(EngineError::NotFound(Entity::Professional, professional_id));
        }
        if !is_offered(hours, date, &span, SLOT_GRANULARITY_MINUTES) {
            return Err(EngineError::SlotTaken { conflicting: None });
        }
        check_no_overlap(&guard, &span)?;
        if guard.appointments.len() >= MAX_APPOINTMENTS_PER_PROFESSIONAL {
            return Err(EngineError::LimitExceeded("too many appointments for professional"));
        }

        let appointment = Appointment {
            id: Ulid::new(),
            professional_id,
            service_id,
            client,
            start,
            duration_minutes: service.duration_minutes,
            status: Status::Requested,
            notes,
            created_at: now,
        };
        let event = Event::AppointmentBooked {
            appointment: appointment.clone(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        drop(guard);

        info!(
            tenant = %self.tenant(),
            appointment = %appointment.id,
            professional = %professional_id,
            start = %appointment.start,
            "appointment requested"
        );

        let warning = self
            .emit_notice(&profile, NoticeKind::Created, &appointment)
            .await;
        Ok(Outcome {
            value: appointment,
            warning,
        })
    }
}
