use std::sync::Mutex as StdMutex;

use chrono::{NaiveDate, NaiveTime};

use super::*;
use crate::limits::*;
use crate::notify::NotifyHub;

// ── Fixtures ─────────────────────────────────────────────

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("agenda_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

/// Tuesday.
fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
}

fn sunday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 25).unwrap()
}

fn at(h: u32, m: u32) -> WallClock {
    day().and_hms_opt(h, m, 0).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// The day before `day()`, mid-morning.
fn yesterday() -> WallClock {
    NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

fn client(phone: &str) -> ClientInfo {
    ClientInfo {
        name: "Ana Souza".into(),
        phone: phone.into(),
        email: Some("ana@example.test".into()),
    }
}

#[derive(Default)]
struct Recorder {
    notices: StdMutex<Vec<Notice>>,
}

#[async_trait::async_trait]
impl Dispatcher for Recorder {
    async fn dispatch(&self, notice: &Notice) -> Result<(), DeliveryFailure> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

struct Shop {
    engine: Engine,
    professional: Ulid,
    service: Ulid,
}

impl Shop {
    fn request(&self, start: WallClock, phone: &str) -> BookingRequest {
        BookingRequest {
            professional_id: self.professional,
            service_id: self.service,
            client: client(phone),
            start,
            notes: None,
        }
    }

    async fn book(&self, start: WallClock, phone: &str) -> Result<Appointment, EngineError> {
        self.engine
            .book_appointment(self.request(start, phone), yesterday())
            .await
            .map(|o| o.value)
    }
}

/// Mon–Sat 08:00–18:00, Sunday closed, one professional, a 60-minute service.
async fn configure(engine: &Engine, professional: Ulid, service: Ulid) {
    engine
        .save_profile(TenantProfile {
            name: "Corte Fino".into(),
            active: true,
            notification_email: None,
        })
        .await
        .unwrap();
    let open = DayHours::Open(OpeningHours::new(t(8, 0), t(18, 0)).unwrap());
    for weekday in 0..6 {
        engine.set_hours(weekday, open).await.unwrap();
    }
    engine.set_hours(6, DayHours::Closed).await.unwrap();
    engine
        .save_professional(professional, "Bruno".into(), true)
        .await
        .unwrap();
    engine
        .save_service(Service {
            id: service,
            name: "Haircut".into(),
            duration_minutes: 60,
            price_cents: 4500,
            active: true,
        })
        .await
        .unwrap();
}

async fn shop_with(name: &str, dispatcher: Arc<dyn Dispatcher>) -> Shop {
    let engine = Engine::new("corte-fino", test_wal_path(name), dispatcher).unwrap();
    let professional = Ulid::new();
    let service = Ulid::new();
    configure(&engine, professional, service).await;
    Shop {
        engine,
        professional,
        service,
    }
}

async fn shop(name: &str) -> Shop {
    shop_with(name, Arc::new(NotifyHub::new())).await
}

// ── Availability ─────────────────────────────────────────

#[tokio::test]
async fn open_day_boundary_slots() {
    let s = shop("boundary.wal").await;
    let slots = s.engine.slots_for_service(s.professional, s.service, day()).await.unwrap();
    assert_eq!(slots.first(), Some(&t(8, 0)));
    assert_eq!(slots.last(), Some(&t(17, 0)));
    assert_eq!(slots.len(), 19);
}

#[tokio::test]
async fn closed_day_has_no_slots() {
    let s = shop("closed_day.wal").await;
    let slots = s.engine.slots_for_service(s.professional, s.service, sunday()).await.unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn unconfigured_weekday_is_an_error() {
    let engine = Engine::new("fresh", test_wal_path("unconfigured.wal"), Arc::new(NotifyHub::new())).unwrap();
    let professional = Ulid::new();
    engine
        .save_profile(TenantProfile {
            name: "Fresh".into(),
            active: true,
            notification_email: None,
        })
        .await
        .unwrap();
    engine.save_professional(professional, "Caio".into(), true).await.unwrap();

    let err = engine.available_slots(professional, day(), 30, 30).await.unwrap_err();
    assert!(matches!(err, EngineError::HoursNotConfigured(1)));
}

#[tokio::test]
async fn zero_duration_or_granularity_is_invalid() {
    let s = shop("zero_params.wal").await;
    let err = s.engine.available_slots(s.professional, day(), 0, 30).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    let err = s.engine.available_slots(s.professional, day(), 30, 0).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn dates_past_the_calendar_edge_are_invalid_input() {
    let s = shop("calendar_edge.wal").await;
    let last = NaiveDate::MAX;
    fn invalid<T>(r: Result<T, EngineError>) -> bool {
        matches!(r, Err(EngineError::InvalidInput(_)))
    }

    assert!(invalid(s.engine.slots_for_service(s.professional, s.service, last).await));
    assert!(invalid(s.engine.available_slots(s.professional, last, 30, 30).await));
    assert!(invalid(s.engine.professional_agenda(s.professional, last).await));
    let filter = AppointmentFilter {
        day: Some(last),
        ..Default::default()
    };
    assert!(invalid(s.engine.list_appointments(&filter, day()).await));
    assert!(invalid(
        s.engine
            .list_appointments(&AppointmentFilter::default(), last)
            .await
    ));
    let start = last.and_hms_opt(23, 30, 0).unwrap();
    assert!(invalid(s.book(start, "555-0101").await));
    assert!(invalid(s.engine.appointments_for_client("555-0101", start).await));

    // The last four-digit year still works.
    let edge = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
    tokio_test::assert_ok!(s.engine.slots_for_service(s.professional, s.service, edge).await);
}

#[tokio::test]
async fn unknown_professional_or_service_is_not_found() {
    let s = shop("unknown_ids.wal").await;
    let err = s.engine.slots_for_service(Ulid::new(), s.service, day()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(Entity::Professional, _)));
    let err = s.engine.slots_for_service(s.professional, Ulid::new(), day()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(Entity::Service, _)));
}

#[tokio::test]
async fn booked_interval_leaves_availability() {
    let s = shop("booked_leaves.wal").await;
    s.book(at(10, 0), "555-0101").await.unwrap();

    let slots = s.engine.slots_for_service(s.professional, s.service, day()).await.unwrap();
    assert!(slots.contains(&t(9, 0)));
    assert!(!slots.contains(&t(9, 30)));
    assert!(!slots.contains(&t(10, 0)));
    assert!(!slots.contains(&t(10, 30)));
    assert!(slots.contains(&t(11, 0)));

    // A shorter service still fits right before the booking.
    let short = s.engine.available_slots(s.professional, day(), 30, 30).await.unwrap();
    assert!(short.contains(&t(9, 30)));
}

#[tokio::test]
async fn availability_and_booking_agree() {
    let s = shop("consistency.wal").await;
    s.book(at(9, 0), "555-0101").await.unwrap();
    s.book(at(13, 30), "555-0102").await.unwrap();

    let slots = s.engine.slots_for_service(s.professional, s.service, day()).await.unwrap();
    let mut start = at(8, 0);
    while start < at(18, 0) {
        let offered = slots.contains(&start.time());
        let fresh = s.engine.book_appointment(s.request(start, "555-0199"), yesterday()).await;
        if offered {
            let booked = fresh.unwrap().value;
            s.engine.update_status(booked.id, Status::Cancelled).await.unwrap();
        } else {
            assert!(
                matches!(fresh, Err(EngineError::SlotTaken { .. })),
                "{start} was not offered but booking gave {fresh:?}"
            );
        }
        start += chrono::Duration::minutes(30);
    }
}

// ── Booking ──────────────────────────────────────────────

#[tokio::test]
async fn booking_creates_requested_appointment() {
    let s = shop("book_basic.wal").await;
    let outcome = s
        .engine
        .book_appointment(s.request(at(10, 0), " 555-0101 "), yesterday())
        .await
        .unwrap();
    assert!(!outcome.is_degraded());
    let a = outcome.value;
    assert_eq!(a.status, Status::Requested);
    assert_eq!(a.duration_minutes, 60);
    assert_eq!(a.client.phone, "555-0101");
    assert_eq!(a.created_at, yesterday());
    assert_eq!(s.engine.appointment(a.id).await.unwrap(), a);
}

#[tokio::test]
async fn slots_not_offered_are_rejected() {
    let s = shop("not_offered.wal").await;
    for start in [
        at(9, 10),                                     // off the grid
        at(17, 30),                                    // runs past closing
        at(7, 0),                                      // before opening
        sunday().and_hms_opt(10, 0, 0).unwrap(),       // closed day
    ] {
        let err = s.book(start, "555-0101").await.unwrap_err();
        assert!(
            matches!(err, EngineError::SlotTaken { conflicting: None }),
            "{start}: {err:?}"
        );
    }
}

#[tokio::test]
async fn overlapping_booking_names_the_conflict() {
    let s = shop("overlap.wal").await;
    let first = s.book(at(10, 0), "555-0101").await.unwrap();
    match s.book(at(10, 30), "555-0102").await {
        Err(EngineError::SlotTaken { conflicting }) => assert_eq!(conflicting, Some(first.id)),
        other => panic!("expected SlotTaken, got {other:?}"),
    }
    // Adjacent is fine.
    s.book(at(11, 0), "555-0102").await.unwrap();
}

#[tokio::test]
async fn invalid_client_details_are_rejected() {
    let s = shop("bad_client.wal").await;
    let mut req = s.request(at(10, 0), "   ");
    let err = s.engine.book_appointment(req.clone(), yesterday()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    req.client.phone = "555-0101".into();
    req.client.name = String::new();
    let err = s.engine.book_appointment(req.clone(), yesterday()).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));

    req.client.name = "Ana".into();
    req.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
    let err = s.engine.book_appointment(req, yesterday()).await.unwrap_err();
    assert!(matches!(err, EngineError::LimitExceeded(_)));
}

#[tokio::test]
async fn inactive_service_or_professional_cannot_be_booked() {
    let s = shop("inactive_catalog.wal").await;
    let mut service = s.engine.service(s.service).unwrap();
    service.active = false;
    s.engine.save_service(service).await.unwrap();
    let err = s.book(at(10, 0), "555-0101").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(Entity::Service, _)));

    let s = shop("inactive_professional.wal").await;
    s.engine
        .save_professional(s.professional, "Bruno".into(), false)
        .await
        .unwrap();
    let err = s.book(at(10, 0), "555-0101").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(Entity::Professional, _)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookers_exactly_one_wins() {
    let s = Arc::new(shop("concurrent_same_slot.wal").await);
    let n = 32;
    let mut handles = Vec::new();
    for i in 0..n {
        let s = s.clone();
        handles.push(tokio::spawn(async move {
            s.book(at(14, 0), &format!("555-{i:04}")).await
        }));
    }

    let mut winners = Vec::new();
    let mut taken = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(a) => winners.push(a),
            Err(EngineError::SlotTaken { conflicting: Some(_) }) => taken += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(taken, n - 1);

    let listed = s
        .engine
        .list_appointments(&AppointmentFilter::default(), day())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, winners[0].id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_professionals_book_in_parallel() {
    let s = Arc::new(shop("parallel_professionals.wal").await);
    let mut professionals = Vec::new();
    for i in 0..8 {
        let id = Ulid::new();
        s.engine.save_professional(id, format!("Pro {i}"), true).await.unwrap();
        professionals.push(id);
    }

    let mut handles = Vec::new();
    for &pid in &professionals {
        let s = s.clone();
        handles.push(tokio::spawn(async move {
            let mut req = s.request(at(9, 0), "555-0101");
            req.professional_id = pid;
            s.engine.book_appointment(req, yesterday()).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    let all = s
        .engine
        .list_appointments(&AppointmentFilter::default(), day())
        .await
        .unwrap();
    assert_eq!(all.len(), professionals.len());
}

// ── Lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn cancellation_cutoff_is_two_hours() {
    let s = shop("cutoff.wal").await;
    let a = s.book(at(14, 0), "555-0101").await.unwrap();

    let err = s
        .engine
        .cancel_by_client(a.id, "555-0101", None, at(12, 1))
        .await
        .unwrap_err();
    match err {
        EngineError::TooLateToCancel { cutoff } => assert_eq!(cutoff, at(12, 0)),
        other => panic!("expected TooLateToCancel, got {other:?}"),
    }
    let err = s
        .engine
        .cancel_by_client(a.id, "555-0101", None, at(12, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TooLateToCancel { .. }));

    let outcome = s
        .engine
        .cancel_by_client(a.id, "555-0101", None, at(11, 59))
        .await
        .unwrap();
    assert_eq!(outcome.value.status, Status::Cancelled);
}

#[tokio::test]
async fn cancelling_twice_is_not_cancellable() {
    let s = shop("cancel_twice.wal").await;
    let a = s.book(at(14, 0), "555-0101").await.unwrap();
    s.engine
        .cancel_by_client(a.id, "555-0101", None, yesterday())
        .await
        .unwrap();
    let err = s
        .engine
        .cancel_by_client(a.id, "555-0101", None, yesterday())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotCancellable(_)));
}

#[tokio::test]
async fn wrong_phone_cannot_cancel() {
    let s = shop("wrong_phone.wal").await;
    let a = s.book(at(14, 0), "555-0101").await.unwrap();
    for phone in ["555-0102", "", "  "] {
        let err = s
            .engine
            .cancel_by_client(a.id, phone, None, yesterday())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotCancellable(_)), "{phone:?}");
    }
    assert_eq!(s.engine.appointment(a.id).await.unwrap().status, Status::Requested);
}

#[tokio::test]
async fn completed_appointment_is_not_cancellable() {
    let s = shop("completed_cancel.wal").await;
    let a = s.book(at(14, 0), "555-0101").await.unwrap();
    s.engine.update_status(a.id, Status::Completed).await.unwrap();
    let err = s
        .engine
        .cancel_by_client(a.id, "555-0101", None, yesterday())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotCancellable(_)));
}

#[tokio::test]
async fn cancelled_slot_can_be_rebooked() {
    let s = shop("rebook.wal").await;
    let a = s.book(at(14, 0), "555-0101").await.unwrap();
    s.engine
        .cancel_by_client(a.id, "555-0101", Some("sick".into()), yesterday())
        .await
        .unwrap();
    let slots = s.engine.slots_for_service(s.professional, s.service, day()).await.unwrap();
    assert!(slots.contains(&t(14, 0)));
    s.book(at(14, 0), "555-0102").await.unwrap();
}

#[tokio::test]
async fn staff_transitions_follow_the_table() {
    let s = shop("transitions.wal").await;
    let a = s.book(at(10, 0), "555-0101").await.unwrap();

    let err = s.engine.update_status(a.id, Status::Requested).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: Status::Requested,
            to: Status::Requested
        }
    ));

    assert_eq!(
        s.engine.update_status(a.id, Status::Confirmed).await.unwrap().status,
        Status::Confirmed
    );
    s.engine.update_status(a.id, Status::Completed).await.unwrap();

    for next in [Status::Requested, Status::Confirmed, Status::Cancelled] {
        let err = s.engine.update_status(a.id, next).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { from: Status::Completed, .. }));
    }

    let err = s.engine.update_status(Ulid::new(), Status::Confirmed).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(Entity::Appointment, _)));
}

// ── Notifications ────────────────────────────────────────

#[tokio::test]
async fn notices_follow_commits() {
    let recorder = Arc::new(Recorder::default());
    let s = shop_with("notices.wal", recorder.clone()).await;
    let a = s.book(at(10, 0), "555-0101").await.unwrap();
    s.engine
        .cancel_by_client(a.id, "555-0101", Some("traffic".into()), yesterday())
        .await
        .unwrap();

    let notices = recorder.notices.lock().unwrap().clone();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].kind, NoticeKind::Created);
    assert_eq!(notices[0].tenant, "corte-fino");
    assert_eq!(notices[0].appointment.id, a.id);
    assert_eq!(
        notices[1].kind,
        NoticeKind::Cancelled {
            reason: Some("traffic".into())
        }
    );
    assert_eq!(notices[1].appointment.status, Status::Cancelled);
}

#[tokio::test]
async fn failed_notice_degrades_but_keeps_booking() {
    let s = shop("degraded.wal").await;
    s.engine
        .save_profile(TenantProfile {
            name: "Corte Fino".into(),
            active: true,
            notification_email: Some("owner@cortefino.test".into()),
        })
        .await
        .unwrap();

    // Nobody subscribed to the hub, so delivery fails.
    let outcome = s
        .engine
        .book_appointment(s.request(at(10, 0), "555-0101"), yesterday())
        .await
        .unwrap();
    assert!(outcome.is_degraded());
    assert_eq!(
        s.engine.appointment(outcome.value.id).await.unwrap().status,
        Status::Requested
    );
}

// ── Tenancy ──────────────────────────────────────────────

#[tokio::test]
async fn tenants_are_isolated_even_with_colliding_ids() {
    let professional = Ulid::new();
    let service = Ulid::new();
    let a = Engine::new("alpha", test_wal_path("tenant_a.wal"), Arc::new(NotifyHub::new())).unwrap();
    let b = Engine::new("beta", test_wal_path("tenant_b.wal"), Arc::new(NotifyHub::new())).unwrap();
    configure(&a, professional, service).await;
    configure(&b, professional, service).await;

    let req = BookingRequest {
        professional_id: professional,
        service_id: service,
        client: client("555-0101"),
        start: at(10, 0),
        notes: None,
    };
    let booked = a.book_appointment(req.clone(), yesterday()).await.unwrap().value;

    let slots_b = b.slots_for_service(professional, service, day()).await.unwrap();
    assert!(slots_b.contains(&t(10, 0)));
    b.book_appointment(req, yesterday()).await.unwrap();

    let err = b.appointment(booked.id).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(Entity::Appointment, _)));
    let err = b
        .cancel_by_client(booked.id, "555-0101", None, yesterday())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(Entity::Appointment, _)));
    assert!(b.appointments_for_client("555-0101", yesterday()).await.unwrap().len() == 1);
}

#[tokio::test]
async fn missing_or_inactive_profile_is_unknown_tenant() {
    let engine = Engine::new("ghost", test_wal_path("ghost.wal"), Arc::new(NotifyHub::new())).unwrap();
    let professional = Ulid::new();
    engine.save_professional(professional, "Bruno".into(), true).await.unwrap();
    let err = engine.available_slots(professional, day(), 30, 30).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownTenant));

    let s = shop("inactive_tenant.wal").await;
    s.engine
        .save_profile(TenantProfile {
            name: "Corte Fino".into(),
            active: false,
            notification_email: None,
        })
        .await
        .unwrap();
    let err = s.book(at(10, 0), "555-0101").await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownTenant));
}

// ── Catalog ──────────────────────────────────────────────

#[tokio::test]
async fn professional_with_appointments_is_guarded() {
    let s = shop("guard.wal").await;
    let a = s.book(at(10, 0), "555-0101").await.unwrap();
    s.engine.update_status(a.id, Status::Cancelled).await.unwrap();

    let err = s.engine.remove_professional(s.professional).await.unwrap_err();
    assert!(matches!(err, EngineError::HasAppointments(_)));
    let err = s
        .engine
        .save_professional(s.professional, "Bruno".into(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::HasAppointments(_)));

    // Renaming is still fine.
    s.engine
        .save_professional(s.professional, "Bruno Lima".into(), true)
        .await
        .unwrap();

    let idle = Ulid::new();
    s.engine.save_professional(idle, "Caio".into(), true).await.unwrap();
    s.engine.remove_professional(idle).await.unwrap();
    let err = s.engine.available_slots(idle, day(), 30, 30).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(Entity::Professional, _)));

    let names: Vec<String> = s
        .engine
        .list_professionals()
        .await
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Bruno Lima".to_string()]);
}

#[tokio::test]
async fn hours_registry() {
    let s = shop("hours.wal").await;
    assert_eq!(s.engine.closed_weekdays().await, vec![6]);
    assert!(matches!(
        s.engine.set_hours(7, DayHours::Closed).await,
        Err(EngineError::InvalidInput(_))
    ));
    s.engine.set_hours(0, DayHours::Closed).await.unwrap();
    assert_eq!(s.engine.closed_weekdays().await, vec![0, 6]);
    assert_eq!(s.engine.hours_for(0).await.unwrap(), DayHours::Closed);
}

#[tokio::test]
async fn service_validation() {
    let s = shop("service_validation.wal").await;
    let mut svc = Service {
        id: Ulid::new(),
        name: "Shave".into(),
        duration_minutes: 0,
        price_cents: 2000,
        active: true,
    };
    tokio_test::assert_err!(s.engine.save_service(svc.clone()).await);
    svc.duration_minutes = 20;
    tokio_test::assert_ok!(s.engine.save_service(svc).await);
    let names: Vec<_> = s.engine.list_services().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["Haircut".to_string(), "Shave".to_string()]);
}

// ── Staff and client read side ───────────────────────────

#[tokio::test]
async fn agenda_marks_occupied_rows() {
    let s = shop("agenda.wal").await;
    let a = s.book(at(10, 0), "555-0101").await.unwrap();
    let rows = s.engine.professional_agenda(s.professional, day()).await.unwrap();
    assert_eq!(rows.len(), 20);
    let row = |h, m| rows.iter().find(|r| r.time == t(h, m)).unwrap();
    assert!(row(9, 30).is_free());
    assert_eq!(row(10, 0).appointment_id, Some(a.id));
    assert_eq!(row(10, 30).appointment_id, Some(a.id));
    assert!(row(11, 0).is_free());

    assert!(s.engine.professional_agenda(s.professional, sunday()).await.unwrap().is_empty());
}

#[tokio::test]
async fn staff_list_filters_and_defaults_to_window() {
    let s = shop("staff_list.wal").await;
    let today = day();
    let a = s.book(at(10, 0), "555-0101").await.unwrap();
    let b = s.book(at(15, 0), "555-0102").await.unwrap();
    let far = (today + chrono::Duration::days(45)).and_hms_opt(10, 0, 0).unwrap();
    let far = s.book(far, "555-0103").await.unwrap();
    s.engine.update_status(b.id, Status::Confirmed).await.unwrap();

    let all = s.engine.list_appointments(&AppointmentFilter::default(), today).await.unwrap();
    assert_eq!(all.iter().map(|x| x.id).collect::<Vec<_>>(), vec![a.id, b.id]);

    let confirmed = s
        .engine
        .list_appointments(
            &AppointmentFilter {
                status: Some(Status::Confirmed),
                ..Default::default()
            },
            today,
        )
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, b.id);

    let that_day = s
        .engine
        .list_appointments(
            &AppointmentFilter {
                day: Some(far.start.date()),
                professional_id: Some(s.professional),
                ..Default::default()
            },
            today,
        )
        .await
        .unwrap();
    assert_eq!(that_day.len(), 1);
    assert_eq!(that_day[0].id, far.id);
}

#[tokio::test]
async fn client_lookup_is_exact_and_windowed() {
    let s = shop("client_lookup.wal").await;
    let early = s.book(at(9, 0), "555-0101").await.unwrap();
    let late = s.book(at(16, 0), "555-0101").await.unwrap();
    s.book(at(12, 0), "555-0199").await.unwrap();

    let mine = s.engine.appointments_for_client("555-0101", yesterday()).await.unwrap();
    assert_eq!(mine.iter().map(|a| a.id).collect::<Vec<_>>(), vec![late.id, early.id]);

    assert!(s.engine.appointments_for_client("0101", yesterday()).await.unwrap().is_empty());

    let much_later = at(9, 0) + chrono::Duration::days(31);
    assert!(s.engine.appointments_for_client("555-0101", much_later).await.unwrap().is_empty());
}

#[tokio::test]
async fn dashboard_counts() {
    let s = shop("dashboard.wal").await;
    let a = s.book(at(9, 0), "555-0101").await.unwrap();
    let b = s.book(at(11, 0), "555-0102").await.unwrap();
    let c = s.book(at(15, 0), "555-0103").await.unwrap();
    s.engine.update_status(a.id, Status::Completed).await.unwrap();
    s.engine.update_status(b.id, Status::Confirmed).await.unwrap();
    s.engine.update_status(c.id, Status::Requested).await.unwrap_err();

    let summary = s.engine.dashboard(at(10, 0)).await;
    assert_eq!(
        summary,
        DashboardSummary {
            today: 3,
            pending_upcoming: 1,
            upcoming: 2,
        }
    );
}

// ── Persistence ──────────────────────────────────────────

#[tokio::test]
async fn replay_restores_state() {
    let path = test_wal_path("replay.wal");
    let professional = Ulid::new();
    let service = Ulid::new();
    let (booked, cancelled) = {
        let engine = Engine::new("corte-fino", path.clone(), Arc::new(NotifyHub::new())).unwrap();
        configure(&engine, professional, service).await;
        let s = Shop {
            engine,
            professional,
            service,
        };
        let booked = s.book(at(10, 0), "555-0101").await.unwrap();
        let cancelled = s.book(at(14, 0), "555-0102").await.unwrap();
        s.engine
            .cancel_by_client(cancelled.id, "555-0102", None, yesterday())
            .await
            .unwrap();
        (booked, cancelled)
    };

    let engine = Engine::new("corte-fino", path, Arc::new(NotifyHub::new())).unwrap();
    assert_eq!(engine.appointment(booked.id).await.unwrap(), booked);
    assert_eq!(
        engine.appointment(cancelled.id).await.unwrap().status,
        Status::Cancelled
    );
    let slots = engine.slots_for_service(professional, service, day()).await.unwrap();
    assert!(!slots.contains(&t(10, 0)));
    assert!(slots.contains(&t(14, 0)));
    assert_eq!(engine.closed_weekdays().await, vec![6]);
}

#[tokio::test]
async fn compaction_preserves_state() {
    let path = test_wal_path("compaction.wal");
    let professional = Ulid::new();
    let service = Ulid::new();
    let engine = Engine::new("corte-fino", path.clone(), Arc::new(NotifyHub::new())).unwrap();
    configure(&engine, professional, service).await;
    // Churn the hours so the log has something to shed.
    for _ in 0..10 {
        engine.set_hours(6, DayHours::Closed).await.unwrap();
    }
    let s = Shop {
        engine,
        professional,
        service,
    };
    let a = s.book(at(10, 0), "555-0101").await.unwrap();
    s.engine.update_status(a.id, Status::Confirmed).await.unwrap();

    let before = std::fs::metadata(&path).unwrap().len();
    s.engine.compact_wal().await.unwrap();
    assert_eq!(s.engine.wal_appends_since_compact().await, 0);
    assert!(std::fs::metadata(&path).unwrap().len() < before);

    let after = s.book(at(15, 0), "555-0102").await.unwrap();
    drop(s);

    let engine = Engine::new("corte-fino", path, Arc::new(NotifyHub::new())).unwrap();
    assert_eq!(engine.appointment(a.id).await.unwrap().status, Status::Confirmed);
    assert_eq!(engine.appointment(after.id).await.unwrap(), after);
    assert_eq!(engine.list_professionals().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bookings_during_compaction_survive_restart() {
    let path = test_wal_path("compaction_race.wal");
    let professional = Ulid::new();
    let service = Ulid::new();
    let engine = Engine::new("corte-fino", path.clone(), Arc::new(NotifyHub::new())).unwrap();
    configure(&engine, professional, service).await;
    let s = Arc::new(Shop {
        engine,
        professional,
        service,
    });

    let mut handles = Vec::new();
    for d in 0..12 {
        let s = s.clone();
        handles.push(tokio::spawn(async move {
            let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap() + chrono::Duration::days(d);
            s.book(date.and_hms_opt(9, 0, 0).unwrap(), "555-0101").await
        }));
    }
    let compactor = {
        let s = s.clone();
        tokio::spawn(async move { s.engine.compact_wal().await })
    };

    let mut ids = Vec::new();
    for h in handles {
        // Sundays are closed.
        if let Ok(a) = h.await.unwrap() {
            ids.push(a.id);
        }
    }
    compactor.await.unwrap().unwrap();
    assert!(!ids.is_empty());
    drop(s);

    let engine = Engine::new("corte-fino", path, Arc::new(NotifyHub::new())).unwrap();
    for id in ids {
        assert!(engine.appointment(id).await.is_ok(), "lost {id}");
    }
}

#[tokio::test]
async fn group_commit_batches_concurrent_bookings() {
    let path = test_wal_path("group_commit.wal");
    let professional = Ulid::new();
    let service = Ulid::new();
    let engine = Arc::new(Engine::new("corte-fino", path.clone(), Arc::new(NotifyHub::new())).unwrap());
    configure(&engine, professional, service).await;
    let base = engine.wal_appends_since_compact().await;

    let mut handles = Vec::new();
    for h in 8..18 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let req = BookingRequest {
                professional_id: professional,
                service_id: service,
                client: client("555-0101"),
                start: at(h, 0),
                notes: None,
            };
            engine.book_appointment(req, yesterday()).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(engine.wal_appends_since_compact().await, base + 10);
}
