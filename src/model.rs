use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Tenant-local wall-clock timestamp. No time-zone conversion happens anywhere.
pub type WallClock = NaiveDateTime;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: WallClock,
    pub end: WallClock,
}

impl Span {
    pub fn new(start: WallClock, end: WallClock) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Interval of `minutes` beginning at `start`. Only for starts already
    /// known to be in range; caller input goes through `checked_starting_at`.
    pub fn starting_at(start: WallClock, minutes: u32) -> Self {
        Self::new(start, start + Duration::minutes(i64::from(minutes)))
    }

    /// `None` when the end would fall past the last representable instant
    /// or `minutes` is zero.
    pub fn checked_starting_at(start: WallClock, minutes: u32) -> Option<Self> {
        let end = start.checked_add_signed(Duration::minutes(i64::from(minutes)))?;
        (start < end).then_some(Self { start, end })
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: WallClock) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The whole calendar day `[00:00, next day 00:00)`. `None` for the
    /// last representable date.
    pub fn day(date: NaiveDate) -> Option<Self> {
        let end = date.succ_opt()?.and_time(NaiveTime::MIN);
        Some(Self::new(date.and_time(NaiveTime::MIN), end))
    }
}

/// Monday = 0 … Sunday = 6.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

// ── Business hours ───────────────────────────────────────────────

/// Opening and closing time of an open day. `opening < closing` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    opening: NaiveTime,
    closing: NaiveTime,
}

impl OpeningHours {
    pub fn new(opening: NaiveTime, closing: NaiveTime) -> Option<Self> {
        (opening < closing).then_some(Self { opening, closing })
    }

    pub fn opening(&self) -> NaiveTime {
        self.opening
    }

    pub fn closing(&self) -> NaiveTime {
        self.closing
    }

    /// The open window on a concrete date.
    pub fn on(&self, date: NaiveDate) -> Span {
        Span::new(date.and_time(self.opening), date.and_time(self.closing))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayHours {
    Closed,
    Open(OpeningHours),
}

impl DayHours {
    pub fn is_closed(&self) -> bool {
        matches!(self, DayHours::Closed)
    }
}

/// One entry per weekday; `None` means the tenant never configured that day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyHours {
    days: [Option<DayHours>; 7],
}

impl WeeklyHours {
    pub fn get(&self, weekday: u8) -> Option<DayHours> {
        self.days.get(usize::from(weekday)).copied().flatten()
    }

    pub fn set(&mut self, weekday: u8, hours: DayHours) {
        if let Some(slot) = self.days.get_mut(usize::from(weekday)) {
            *slot = Some(hours);
        }
    }

    pub fn closed_weekdays(&self) -> Vec<u8> {
        (0u8..7)
            .filter(|&d| self.get(d).is_some_and(|h| h.is_closed()))
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (u8, DayHours)> + '_ {
        (0u8..7).filter_map(|d| self.get(d).map(|h| (d, h)))
    }
}

// ── Appointments ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Requested,
    Confirmed,
    Completed,
    Cancelled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Requested => "requested",
            Status::Confirmed => "confirmed",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "requested" => Some(Status::Requested),
            "confirmed" => Some(Status::Confirmed),
            "completed" => Some(Status::Completed),
            "cancelled" | "canceled" => Some(Status::Cancelled),
            _ => None,
        }
    }

    /// Occupies the professional's calendar.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Status::Requested | Status::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled)
    }

    /// Transition table: terminal states are frozen, everything else may move
    /// to any other state.
    pub fn can_transition_to(&self, next: Status) -> bool {
        !self.is_terminal() && *self != next
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    /// The client's only credential for self-service actions.
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub professional_id: Ulid,
    pub service_id: Ulid,
    pub client: ClientInfo,
    pub start: WallClock,
    /// Snapshot of the service duration at booking time.
    pub duration_minutes: u32,
    pub status: Status,
    pub notes: Option<String>,
    pub created_at: WallClock,
}

impl Appointment {
    pub fn span(&self) -> Span {
        Span::starting_at(self.start, self.duration_minutes)
    }

    pub fn is_blocking(&self) -> bool {
        self.status.is_blocking()
    }
}

/// A booking request as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub professional_id: Ulid,
    pub service_id: Ulid,
    pub client: ClientInfo,
    pub start: WallClock,
    pub notes: Option<String>,
}

// ── Catalog ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantProfile {
    pub name: String,
    pub active: bool,
    pub notification_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub name: String,
    pub duration_minutes: u32,
    pub price_cents: u64,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessionalInfo {
    pub id: Ulid,
    pub name: String,
    pub active: bool,
    /// Appointments on record in any status.
    pub appointment_count: usize,
}

/// A professional and every appointment ever booked with them.
#[derive(Debug, Clone)]
pub struct ProfessionalState {
    pub id: Ulid,
    pub name: String,
    pub active: bool,
    /// All appointments (any status), sorted by `start`.
    pub appointments: Vec<Appointment>,
}

impl ProfessionalState {
    pub fn new(id: Ulid, name: String, active: bool) -> Self {
        Self {
            id,
            name,
            active,
            appointments: Vec::new(),
        }
    }

    /// Insert appointment maintaining sort order by start.
    pub fn insert_appointment(&mut self, appointment: Appointment) {
        let pos = self
            .appointments
            .partition_point(|a| a.start <= appointment.start);
        self.appointments.insert(pos, appointment);
    }

    pub fn appointment(&self, id: Ulid) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    pub fn appointment_mut(&mut self, id: Ulid) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == id)
    }

    /// Appointments (any status) whose span overlaps the query window.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Appointment> {
        let right_bound = self.appointments.partition_point(|a| a.start < query.end);
        let query_start = query.start;
        self.appointments[..right_bound]
            .iter()
            .filter(move |a| a.span().end > query_start)
    }

    /// Appointments that currently block the calendar within `query`.
    pub fn blocking_in(&self, query: &Span) -> impl Iterator<Item = &Appointment> {
        self.overlapping(query).filter(|a| a.is_blocking())
    }

    pub fn info(&self) -> ProfessionalInfo {
        ProfessionalInfo {
            id: self.id,
            name: self.name.clone(),
            active: self.active,
            appointment_count: self.appointments.len(),
        }
    }
}

// ── Events ───────────────────────────────────────────────────────

/// The WAL record format. Flat, one variant per committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ProfileSaved {
        profile: TenantProfile,
    },
    HoursSet {
        weekday: u8,
        hours: DayHours,
    },
    ProfessionalSaved {
        id: Ulid,
        name: String,
        active: bool,
    },
    ProfessionalRemoved {
        id: Ulid,
    },
    ServiceSaved {
        service: Service,
    },
    AppointmentBooked {
        appointment: Appointment,
    },
    StatusChanged {
        id: Ulid,
        professional_id: Ulid,
        status: Status,
    },
}

// ── Query result types ───────────────────────────────────────────

/// One row of a professional's day grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaRow {
    pub time: NaiveTime,
    /// The blocking appointment occupying this instant, if any.
    pub appointment_id: Option<Ulid>,
}

impl AgendaRow {
    pub fn is_free(&self) -> bool {
        self.appointment_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardSummary {
    pub today: usize,
    pub pending_upcoming: usize,
    pub upcoming: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentFilter {
    pub day: Option<NaiveDate>,
    pub status: Option<Status>,
    pub professional_id: Option<Ulid>,
}
