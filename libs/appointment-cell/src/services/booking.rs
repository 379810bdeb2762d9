// libs/appointment-cell/src/services/booking.rs
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_models::auth::{Actor, ActorRole};

use crate::models::{
    Appointment, AppointmentError, AppointmentEvent, CreateAppointmentRequest, Transition, MAX_REASON_LENGTH,
};
use crate::services::context::SchedulingContext;
use crate::services::lifecycle::{AppointmentLifecycleService, TransitionOutcome};
use crate::services::repository::RepositoryError;
use crate::services::slots::SlotQueryService;

/// The appointment state machine: creation and status transitions.
pub struct BookingService {
    ctx: SchedulingContext,
    slots: SlotQueryService,
}

impl BookingService {
    pub fn new(ctx: SchedulingContext) -> Self {
        let slots = SlotQueryService::new(ctx.clone());
        Self { ctx, slots }
    }

    /// Book a pending appointment for the calling patient.
    #[instrument(
        skip(self, actor, request),
        fields(practitioner_id = %request.practitioner_id, date = %request.date, start_time = %request.start_time)
    )]
    pub async fn create(
        &self,
        actor: &Actor,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Booking request from actor {} for subject {}", actor.id, request.subject_id);

        if actor.role != ActorRole::Patient || actor.id != request.subject_id {
            warn!("Actor {} ({}) tried to book for subject {}", actor.id, actor.role, request.subject_id);
            return Err(AppointmentError::Forbidden(
                "Patients can only book appointments for themselves".to_string(),
            ));
        }

        let reason = normalize_reason(&request.reason)?;

        let appointment = {
            let _day = self.ctx.arbiter.lock(request.practitioner_id, request.date).await;

            self.slots
                .check_bookable(request.practitioner_id, request.date, request.start_time, None)
                .await?;

            let candidate = Appointment::new(
                request.practitioner_id,
                request.subject_id,
                request.date,
                request.start_time,
                self.ctx.settings.policy.duration_minutes,
                request.consultation_type,
                reason,
            );

            self.ctx.repository.insert(candidate).await.map_err(|e| {
                warn!("Insert rejected for {} {}: {}", request.date, request.start_time, e);
                AppointmentError::from(e)
            })?
        };

        info!("Appointment {} created with status {}", appointment.id, appointment.status);
        self.ctx.notifier.notify(appointment.id, AppointmentEvent::Created).await;
        Ok(appointment)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn confirm(&self, appointment_id: Uuid, actor: &Actor) -> Result<Appointment, AppointmentError> {
        Ok(self.transition(appointment_id, actor, Transition::Confirm).await?.into_appointment())
    }

    /// Cancelling an already cancelled appointment succeeds without a new event.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn cancel(&self, appointment_id: Uuid, actor: &Actor) -> Result<Appointment, AppointmentError> {
        Ok(self.transition(appointment_id, actor, Transition::Cancel).await?.into_appointment())
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn complete(&self, appointment_id: Uuid, actor: &Actor) -> Result<Appointment, AppointmentError> {
        Ok(self.transition(appointment_id, actor, Transition::Complete).await?.into_appointment())
    }

    /// Apply an automatic transition on behalf of the system.
    ///
    /// Returns the stored appointment only when this call wrote it; `None` means the
    /// transition was no longer due, for example because someone cancelled first.
    pub async fn apply_due(
        &self,
        appointment_id: Uuid,
        transition: Transition,
    ) -> Result<Option<Appointment>, AppointmentError> {
        match self.transition(appointment_id, &Actor::system(), transition).await? {
            Applied::Written(saved) => Ok(Some(saved)),
            Applied::Skipped(_) => Ok(None),
        }
    }

    pub async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.ctx
            .repository
            .get(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {} not found", appointment_id)))
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        transition: Transition,
    ) -> Result<Applied, AppointmentError> {
        let max_attempts = self.ctx.settings.max_write_retries.max(1);

        for attempt in 1..=max_attempts {
            let current = self.load(appointment_id).await?;
            AppointmentLifecycleService::authorize(actor, &current, transition)?;

            if actor.is_system()
                && matches!(transition, Transition::Complete | Transition::Expire)
                && AppointmentLifecycleService::due_transition(&current, self.ctx.clock.now()) != Some(transition)
            {
                debug!("{} is no longer due for appointment {}", transition, appointment_id);
                return Ok(Applied::Skipped(current));
            }

            let status = match AppointmentLifecycleService::apply(current.status, transition)? {
                TransitionOutcome::Unchanged => {
                    debug!("Appointment {} already {}, nothing to do", appointment_id, current.status);
                    return Ok(Applied::Skipped(current));
                }
                TransitionOutcome::Moved(status) => status,
            };

            let mut next = current.clone();
            next.status = status;
            next.updated_at = Utc::now();

            match self.ctx.repository.update(next, current.version).await {
                Ok(saved) => {
                    info!("Appointment {} moved {} -> {} ({})", appointment_id, current.status, saved.status, transition);
                    if let Some(event) = AppointmentEvent::for_transition(transition) {
                        self.ctx.notifier.notify(saved.id, event).await;
                    }
                    return Ok(Applied::Written(saved));
                }
                Err(RepositoryError::VersionConflict) if attempt < max_attempts => {
                    warn!(
                        "Appointment {} changed concurrently, retrying {} ({}/{})",
                        appointment_id, transition, attempt, max_attempts
                    );
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::VersionConflict.into())
    }
}

/// What a transition attempt did to the stored row.
enum Applied {
    Written(Appointment),
    /// Nothing to write; carries the row as read.
    Skipped(Appointment),
}

impl Applied {
    fn into_appointment(self) -> Appointment {
        match self {
            Applied::Written(appointment) | Applied::Skipped(appointment) => appointment,
        }
    }
}

/// Trim and bound the free-text reason for a visit.
pub fn normalize_reason(reason: &str) -> Result<String, AppointmentError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::Validation("A reason for the visit is required".to_string()));
    }
    if trimmed.chars().count() > MAX_REASON_LENGTH {
        return Err(AppointmentError::Validation(format!(
            "Reason must be at most {} characters",
            MAX_REASON_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// Optional notes follow the same bound as reasons; blank means none.
pub fn normalize_note(note: Option<String>) -> Result<Option<String>, AppointmentError> {
    match note.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > MAX_REASON_LENGTH => Err(AppointmentError::Validation(format!(
            "Note must be at most {} characters",
            MAX_REASON_LENGTH
        ))),
        Some(text) => Ok(Some(text.to_string())),
    }
}
