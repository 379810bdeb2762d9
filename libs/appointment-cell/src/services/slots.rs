// libs/appointment-cell/src/services/slots.rs
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use availability_cell::models::{ReservedSpan, Slot, SlotUnavailableReason};
use availability_cell::services::SlotGenerator;

use crate::models::{Appointment, AppointmentError};
use crate::services::context::SchedulingContext;

pub const DEFAULT_NEXT_SLOTS: usize = 5;
pub const MAX_NEXT_SLOTS: usize = 50;

/// Slot views combining availability rules with current reservations.
#[derive(Clone)]
pub struct SlotQueryService {
    ctx: SchedulingContext,
}

impl SlotQueryService {
    pub fn new(ctx: SchedulingContext) -> Self {
        Self { ctx }
    }

    /// Every candidate slot of the day, available or not.
    pub async fn available_slots(&self, practitioner_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        self.ensure_known(practitioner_id).await?;
        self.day_slots(practitioner_id, date, None, self.ctx.clock.now()).await
    }

    /// The first `limit` open slots from today up to the booking horizon.
    pub async fn next_available_slots(
        &self,
        practitioner_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<Slot>, AppointmentError> {
        self.ensure_known(practitioner_id).await?;

        let limit = limit.unwrap_or(DEFAULT_NEXT_SLOTS).clamp(1, MAX_NEXT_SLOTS);
        let now = self.ctx.clock.now();
        let today = now.date();
        let mut found = Vec::with_capacity(limit);

        for offset in 0..=i64::from(self.ctx.settings.max_advance_booking_days) {
            let date = today + Duration::days(offset);
            let open = self
                .day_slots(practitioner_id, date, None, now)
                .await?
                .into_iter()
                .filter(|slot| slot.available);

            found.extend(open.take(limit - found.len()));
            if found.len() >= limit {
                break;
            }
        }

        debug!("Found {} upcoming slots for practitioner {}", found.len(), practitioner_id);
        Ok(found)
    }

    /// Check that a start time can be reserved right now.
    ///
    /// The caller holds the arbiter lock for the date. `exclude` is the appointment
    /// being moved, whose current reservation must not block its own new slot.
    pub async fn check_bookable(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let now = self.ctx.clock.now();

        if SlotGenerator::is_past(date, start_time, now) {
            return Err(AppointmentError::Validation(format!(
                "{} {} is in the past",
                date, start_time
            )));
        }

        let horizon = now.date() + Duration::days(i64::from(self.ctx.settings.max_advance_booking_days));
        if date > horizon {
            return Err(AppointmentError::Validation(format!(
                "Appointments can be booked at most {} days ahead",
                self.ctx.settings.max_advance_booking_days
            )));
        }

        self.ensure_known(practitioner_id).await?;

        let slots = self.day_slots(practitioner_id, date, exclude, now).await?;
        let slot = slots.iter().find(|slot| slot.start_time == start_time).ok_or_else(|| {
            AppointmentError::Validation(format!(
                "{} {} is not a bookable slot in the practitioner's availability",
                date, start_time
            ))
        })?;

        match slot.reason_if_unavailable {
            None => Ok(()),
            Some(SlotUnavailableReason::Reserved) => {
                warn!("Slot {} {} of practitioner {} is already reserved", date, start_time, practitioner_id);
                Err(AppointmentError::Conflict(format!(
                    "The slot {} {} is no longer available",
                    date, start_time
                )))
            }
            Some(SlotUnavailableReason::Past) => Err(AppointmentError::Validation(format!(
                "{} {} is in the past",
                date, start_time
            ))),
        }
    }

    async fn ensure_known(&self, practitioner_id: Uuid) -> Result<(), AppointmentError> {
        if !self.ctx.availability.has_rules(practitioner_id).await? {
            return Err(AppointmentError::NotFound(format!(
                "Practitioner {} has no availability",
                practitioner_id
            )));
        }
        Ok(())
    }

    async fn day_slots(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
        now: NaiveDateTime,
    ) -> Result<Vec<Slot>, AppointmentError> {
        let intervals = self.ctx.availability.rules_for(practitioner_id, date).await?;
        if intervals.is_empty() {
            return Ok(Vec::new());
        }

        let booked = self.ctx.repository.list_for_practitioner_on(practitioner_id, date).await?;
        let reservations: Vec<ReservedSpan> = booked
            .iter()
            .filter(|appointment| Some(appointment.id) != exclude)
            .filter_map(Appointment::reserved_span)
            .collect();

        Ok(SlotGenerator::generate(
            &intervals,
            date,
            &reservations,
            self.ctx.settings.policy,
            now,
        ))
    }
}
