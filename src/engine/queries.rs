use chrono::{Duration, NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::day_slots;
use super::conflict::{validate_date, validate_phone, validate_slot_params};
use super::{Engine, EngineError, Entity, SharedProfessional};

impl Engine {
    /// Bookable start times for `professional_id` on `date`, computed from
    /// the current state on every call.
    pub async fn available_slots(
        &self,
        professional_id: Ulid,
        date: NaiveDate,
        duration_minutes: u32,
        granularity_minutes: u32,
    ) -> Result<Vec<NaiveTime>, EngineError> {
        validate_slot_params(duration_minutes, granularity_minutes)?;
        validate_date(date)?;
        let whole_day = Span::day(date).ok_or_else(|| out_of_range(date))?;
        self.require_tenant().await?;
        let ps = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(Entity::Professional, professional_id))?;
        let hours = self.hours_for(weekday_index(date)).await?;

        let guard = ps.read().await;
        if !guard.active {
            return Err(EngineError::NotFound(Entity::Professional, professional_id));
        }
        let busy: Vec<Span> = guard
            .blocking_in(&whole_day)
            .map(|a| a.span())
            .collect();
        Ok(day_slots(hours, date, duration_minutes, granularity_minutes, &busy))
    }

    /// Slots for a catalog service at the default granularity.
    pub async fn slots_for_service(
        &self,
        professional_id: Ulid,
        service_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, EngineError> {
        let service = self
            .service(service_id)
            .filter(|s| s.active)
            .ok_or(EngineError::NotFound(Entity::Service, service_id))?;
        self.available_slots(
            professional_id,
            date,
            service.duration_minutes,
            SLOT_GRANULARITY_MINUTES,
        )
        .await
    }

    /// The professional's day at slot granularity over business hours. Each
    /// row names the blocking appointment in progress at that instant.
    pub async fn professional_agenda(
        &self,
        professional_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<AgendaRow>, EngineError> {
        validate_date(date)?;
        let ps = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(Entity::Professional, professional_id))?;
        let DayHours::Open(open) = self.hours_for(weekday_index(date)).await? else {
            return Ok(Vec::new());
        };
        let window = open.on(date);
        let step = Duration::minutes(i64::from(SLOT_GRANULARITY_MINUTES));

        let guard = ps.read().await;
        let booked: Vec<&Appointment> = guard.blocking_in(&window).collect();
        let mut rows = Vec::new();
        let mut t = window.start;
        while t < window.end {
            rows.push(AgendaRow {
                time: t.time(),
                appointment_id: booked
                    .iter()
                    .find(|a| a.span().contains_instant(t))
                    .map(|a| a.id),
            });
            t += step;
        }
        Ok(rows)
    }

    pub async fn appointment(&self, id: Ulid) -> Result<Appointment, EngineError> {
        let professional_id = self
            .appointment_index
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
        let ps = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(Entity::Appointment, id))?;
        let guard = ps.read().await;
        guard
            .appointment(id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Appointment, id))
    }

    /// Staff list ordered by start. Without a day filter only the window
    /// `[today, today + STAFF_LIST_WINDOW_DAYS]` is returned.
    pub async fn list_appointments(
        &self,
        filter: &AppointmentFilter,
        today: NaiveDate,
    ) -> Result<Vec<Appointment>, EngineError> {
        let from = filter.day.unwrap_or(today);
        validate_date(from)?;
        let to = match filter.day {
            Some(day) => Some(day),
            None => today.checked_add_signed(Duration::days(STAFF_LIST_WINDOW_DAYS)),
        };
        let end = to
            .and_then(|d| d.succ_opt())
            .ok_or_else(|| out_of_range(from))?;
        let window = Span::new(from.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN));

        let shared: Vec<SharedProfessional> = match filter.professional_id {
            Some(pid) => self.get_professional(&pid).into_iter().collect(),
            None => self.professionals.iter().map(|e| e.value().clone()).collect(),
        };

        let mut out = Vec::new();
        for ps in shared {
            let guard = ps.read().await;
            out.extend(
                guard
                    .appointments
                    .iter()
                    .filter(|a| window.contains_instant(a.start))
                    .filter(|a| filter.status.is_none_or(|s| a.status == s))
                    .cloned(),
            );
        }
        out.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    /// A client's own appointments: exact phone match, starting no earlier
    /// than `CLIENT_LOOKUP_WINDOW_DAYS` ago, newest first.
    pub async fn appointments_for_client(
        &self,
        phone: &str,
        now: WallClock,
    ) -> Result<Vec<Appointment>, EngineError> {
        let phone = phone.trim();
        validate_phone(phone)?;
        self.require_tenant().await?;
        validate_date(now.date())?;
        let since = now - Duration::days(CLIENT_LOOKUP_WINDOW_DAYS);

        let shared: Vec<SharedProfessional> =
            self.professionals.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for ps in shared {
            let guard = ps.read().await;
            out.extend(
                guard
                    .appointments
                    .iter()
                    .filter(|a| a.start >= since && a.client.phone == phone)
                    .cloned(),
            );
        }
        out.sort_by(|a, b| b.start.cmp(&a.start).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    pub async fn dashboard(&self, now: WallClock) -> DashboardSummary {
        let today = now.date();
        let shared: Vec<SharedProfessional> =
            self.professionals.iter().map(|e| e.value().clone()).collect();

        let mut summary = DashboardSummary::default();
        for ps in shared {
            let guard = ps.read().await;
            for a in &guard.appointments {
                if a.start.date() == today {
                    summary.today += 1;
                }
                if a.start >= now {
                    if a.status == Status::Requested {
                        summary.pending_upcoming += 1;
                    }
                    if a.is_blocking() {
                        summary.upcoming += 1;
                    }
                }
            }
        }
        summary
    }
}

fn out_of_range(date: NaiveDate) -> EngineError {
    EngineError::InvalidInput(format!("date out of range: {date}"))
}
