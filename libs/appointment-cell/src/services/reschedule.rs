// libs/appointment-cell/src/services/reschedule.rs
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_models::auth::Actor;

use crate::models::{AppointmentError, AppointmentEvent, RescheduleRecord, RescheduleRequest, Rescheduled, Transition};
use crate::services::booking::normalize_note;
use crate::services::context::SchedulingContext;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::query::can_view;
use crate::services::repository::RepositoryError;
use crate::services::slots::SlotQueryService;

/// Moves confirmed appointments, freeing the old slot and claiming the new one in one write.
pub struct RescheduleCoordinator {
    ctx: SchedulingContext,
    slots: SlotQueryService,
}

impl RescheduleCoordinator {
    pub fn new(ctx: SchedulingContext) -> Self {
        let slots = SlotQueryService::new(ctx.clone());
        Self { ctx, slots }
    }

    #[instrument(skip(self, actor, request), fields(to_date = %request.date, to_start = %request.start_time))]
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        request: RescheduleRequest,
    ) -> Result<Rescheduled, AppointmentError> {
        let note = normalize_note(request.note)?;
        let max_attempts = self.ctx.settings.max_write_retries.max(1);

        for attempt in 1..=max_attempts {
            let current = self
                .ctx
                .repository
                .get(appointment_id)
                .await?
                .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {} not found", appointment_id)))?;

            AppointmentLifecycleService::authorize(actor, &current, Transition::Reschedule)?;
            AppointmentLifecycleService::apply(current.status, Transition::Reschedule)?;

            if current.date == request.date && current.start_time == request.start_time {
                return Err(AppointmentError::Validation(
                    "The appointment is already at the requested time".to_string(),
                ));
            }

            debug!(
                "Moving appointment {} from {} {} (attempt {}/{})",
                appointment_id, current.date, current.start_time, attempt, max_attempts
            );

            let guards = self
                .ctx
                .arbiter
                .lock_pair(current.practitioner_id, current.date, request.date)
                .await;

            self.slots
                .check_bookable(current.practitioner_id, request.date, request.start_time, Some(current.id))
                .await?;

            let mut moved = current.clone();
            moved.date = request.date;
            moved.start_time = request.start_time;
            moved.updated_at = Utc::now();

            let record = RescheduleRecord::between(&current, &moved, note.clone(), actor.id);

            match self.ctx.repository.reschedule(moved, current.version, record).await {
                Ok(outcome) => {
                    drop(guards);
                    let saved = &outcome.appointment;
                    info!(
                        "Appointment {} rescheduled from {} {} to {} {}",
                        saved.id, current.date, current.start_time, saved.date, saved.start_time
                    );
                    if !outcome.history_recorded {
                        warn!("Reschedule of {} committed without a history record", saved.id);
                    }
                    self.ctx
                        .notifier
                        .notify(
                            saved.id,
                            AppointmentEvent::Rescheduled {
                                from_date: current.date,
                                from_start: current.start_time,
                            },
                        )
                        .await;
                    return Ok(outcome);
                }
                Err(RepositoryError::VersionConflict) if attempt < max_attempts => {
                    drop(guards);
                    warn!("Appointment {} changed while rescheduling, retrying", appointment_id);
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                Err(e) => {
                    warn!("Reschedule of {} rejected: {}", appointment_id, e);
                    return Err(e.into());
                }
            }
        }

        Err(RepositoryError::VersionConflict.into())
    }

    /// Moves of one appointment, oldest first. Visible to its patient, its practitioner and admins.
    pub async fn history(&self, appointment_id: Uuid, actor: &Actor) -> Result<Vec<RescheduleRecord>, AppointmentError> {
        let appointment = self
            .ctx
            .repository
            .get(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {} not found", appointment_id)))?;

        if !can_view(actor, &appointment) {
            return Err(AppointmentError::Forbidden("Not allowed to view this appointment".to_string()));
        }

        let mut records = self.ctx.repository.history(appointment_id).await?;
        records.sort_by_key(|r| r.rescheduled_at);
        Ok(records)
    }
}
