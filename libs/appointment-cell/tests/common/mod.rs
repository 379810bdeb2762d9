#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError, ConsultationType, CreateAppointmentRequest};
use appointment_cell::services::{
    BookingService, BroadcastNotificationSink, InMemoryAppointmentRepository, NotificationSink, QueryService,
    RescheduleCoordinator, SchedulingContext, SchedulingSettings, SlotQueryService,
};
use availability_cell::models::OpenInterval;
use availability_cell::services::{AvailabilityService, InMemoryAvailabilityStore};
use shared_models::auth::Actor;
use shared_utils::clock::Clock;

/// A clock tests can move forward.
pub struct TestClock(Mutex<NaiveDateTime>);

impl TestClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// 2031-03-03, a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 3, 3).unwrap()
}

pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 3, 4).unwrap()
}

/// The Sunday morning before `monday()`.
pub fn sunday_morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2031, 3, 2).unwrap().and_hms_opt(8, 0, 0).unwrap()
}

pub struct Harness {
    pub ctx: SchedulingContext,
    pub clock: Arc<TestClock>,
    pub events: Arc<BroadcastNotificationSink>,
    pub availability: AvailabilityService,
    pub booking: Arc<BookingService>,
    pub reschedule: RescheduleCoordinator,
    pub queries: QueryService,
    pub slots: SlotQueryService,
    pub doctor: Actor,
}

impl Harness {
    /// A practitioner open Monday and Tuesday 09:00-12:00, with the clock on the Sunday before.
    pub async fn new() -> Self {
        let events = Arc::new(BroadcastNotificationSink::new(256));
        Self::with_notifier(events.clone(), events).await
    }

    pub async fn with_notifier(notifier: Arc<dyn NotificationSink>, events: Arc<BroadcastNotificationSink>) -> Self {
        let clock = Arc::new(TestClock::at(sunday_morning()));
        let store = Arc::new(InMemoryAvailabilityStore::new());
        let availability = AvailabilityService::new(store.clone());

        let doctor = Actor::practitioner(Uuid::new_v4());
        for day in [Weekday::Mon, Weekday::Tue] {
            availability
                .put_weekly_rule(&doctor, day, vec![OpenInterval::new(t(9, 0), t(12, 0))])
                .await
                .unwrap();
        }

        let ctx = SchedulingContext::new(
            Arc::new(InMemoryAppointmentRepository::new()),
            store,
            notifier,
            clock.clone(),
            SchedulingSettings::default(),
        );

        Self {
            booking: Arc::new(BookingService::new(ctx.clone())),
            reschedule: RescheduleCoordinator::new(ctx.clone()),
            queries: QueryService::new(ctx.clone()),
            slots: SlotQueryService::new(ctx.clone()),
            ctx,
            clock,
            events,
            availability,
            doctor,
        }
    }

    pub fn request(&self, patient: &Actor, date: NaiveDate, start: NaiveTime) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            practitioner_id: self.doctor.id,
            subject_id: patient.id,
            date,
            start_time: start,
            reason: "Persistent cough".to_string(),
            consultation_type: ConsultationType::InPerson,
        }
    }

    pub async fn book(&self, patient: &Actor, date: NaiveDate, start: NaiveTime) -> Result<Appointment, AppointmentError> {
        self.booking.create(patient, self.request(patient, date, start)).await
    }

    /// Book and confirm in one step.
    pub async fn confirmed(&self, patient: &Actor, date: NaiveDate, start: NaiveTime) -> Appointment {
        let booked = self.book(patient, date, start).await.unwrap();
        self.booking.confirm(booked.id, &self.doctor).await.unwrap()
    }

    pub async fn is_open(&self, date: NaiveDate, start: NaiveTime) -> bool {
        self.slots
            .available_slots(self.doctor.id, date)
            .await
            .unwrap()
            .iter()
            .any(|slot| slot.start_time == start && slot.available)
    }
}

pub fn patient() -> Actor {
    Actor::patient(Uuid::new_v4())
}
