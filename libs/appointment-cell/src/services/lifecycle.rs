// libs/appointment-cell/src/services/lifecycle.rs
use chrono::NaiveDateTime;
use tracing::{debug, warn};

use shared_models::auth::{Actor, ActorRole};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, Transition};

/// Result of looking a transition up in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Store the appointment with this status.
    Moved(AppointmentStatus),
    /// Already where the transition leads. Only cancellation is idempotent.
    Unchanged,
}

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    /// The transition table. Every pair not listed is illegal.
    pub fn apply(current: AppointmentStatus, transition: Transition) -> Result<TransitionOutcome, AppointmentError> {
        use AppointmentStatus::*;

        let outcome = match (current, transition) {
            (Pending, Transition::Confirm) => TransitionOutcome::Moved(Confirmed),
            (Pending | Confirmed, Transition::Cancel) => TransitionOutcome::Moved(Cancelled),
            (Cancelled, Transition::Cancel) => TransitionOutcome::Unchanged,
            (Confirmed, Transition::Complete) => TransitionOutcome::Moved(Completed),
            // Moving keeps the appointment confirmed
            (Confirmed, Transition::Reschedule) => TransitionOutcome::Moved(Confirmed),
            (Pending, Transition::Expire) => TransitionOutcome::Moved(Cancelled),
            (Pending | Confirmed | Completed | Cancelled, _) => {
                warn!("Invalid status transition attempted: {} on {}", transition, current);
                return Err(AppointmentError::InvalidStateTransition { from: current, action: transition });
            }
        };

        debug!("Status transition validated: {} on {} -> {:?}", transition, current, outcome);
        Ok(outcome)
    }

    /// Whether `actor` may attempt `transition` on `appointment` at all, regardless of status.
    pub fn authorize(actor: &Actor, appointment: &Appointment, transition: Transition) -> Result<(), AppointmentError> {
        let owning_practitioner =
            actor.role == ActorRole::Practitioner && actor.id == appointment.practitioner_id;
        let owning_patient = actor.role == ActorRole::Patient && actor.id == appointment.subject_id;

        let allowed = match transition {
            Transition::Confirm | Transition::Reschedule => owning_practitioner,
            Transition::Cancel => owning_practitioner || owning_patient || actor.is_system(),
            Transition::Complete => owning_practitioner || actor.is_system(),
            Transition::Expire => actor.is_system(),
        };

        if !allowed {
            warn!(
                "Actor {} ({}) may not {} appointment {}",
                actor.id, actor.role, transition, appointment.id
            );
            return Err(AppointmentError::Forbidden(format!(
                "Not allowed to {} this appointment",
                transition
            )));
        }
        Ok(())
    }

    /// The automatic transition due for an appointment at `now`, if any.
    ///
    /// Confirmed appointments complete once their end has passed; pending requests
    /// expire once their start has passed without confirmation.
    pub fn due_transition(appointment: &Appointment, now: NaiveDateTime) -> Option<Transition> {
        match appointment.status {
            AppointmentStatus::Confirmed if appointment.ends_at() <= now => Some(Transition::Complete),
            AppointmentStatus::Pending if appointment.starts_at() <= now => Some(Transition::Expire),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use uuid::Uuid;

    use crate::models::ConsultationType;

    const ALL_STATUSES: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    const ALL_TRANSITIONS: [Transition; 5] = [
        Transition::Confirm,
        Transition::Cancel,
        Transition::Complete,
        Transition::Reschedule,
        Transition::Expire,
    ];

    #[test]
    fn test_transition_table_is_exactly_the_legal_set() {
        let mut legal = Vec::new();
        for status in ALL_STATUSES {
            for transition in ALL_TRANSITIONS {
                if let Ok(outcome) = AppointmentLifecycleService::apply(status, transition) {
                    legal.push((status, transition, outcome));
                }
            }
        }

        use AppointmentStatus::*;
        assert_eq!(
            legal,
            vec![
                (Pending, Transition::Confirm, TransitionOutcome::Moved(Confirmed)),
                (Pending, Transition::Cancel, TransitionOutcome::Moved(Cancelled)),
                (Pending, Transition::Expire, TransitionOutcome::Moved(Cancelled)),
                (Confirmed, Transition::Cancel, TransitionOutcome::Moved(Cancelled)),
                (Confirmed, Transition::Complete, TransitionOutcome::Moved(Completed)),
                (Confirmed, Transition::Reschedule, TransitionOutcome::Moved(Confirmed)),
                (Cancelled, Transition::Cancel, TransitionOutcome::Unchanged),
            ]
        );
    }

    #[test]
    fn test_illegal_transition_reports_status_and_action() {
        let err = AppointmentLifecycleService::apply(AppointmentStatus::Confirmed, Transition::Confirm).unwrap_err();
        assert_eq!(
            err,
            AppointmentError::InvalidStateTransition {
                from: AppointmentStatus::Confirmed,
                action: Transition::Confirm,
            }
        );
    }

    fn appointment(status: AppointmentStatus) -> Appointment {
        let mut appointment = Appointment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2031, 3, 3).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            30,
            ConsultationType::Remote,
            "Follow-up".to_string(),
        );
        appointment.status = status;
        appointment
    }

    #[test]
    fn test_authorization_by_role_and_ownership() {
        let appt = appointment(AppointmentStatus::Pending);
        let doctor = Actor::practitioner(appt.practitioner_id);
        let patient = Actor::patient(appt.subject_id);
        let stranger = Actor::practitioner(Uuid::new_v4());
        let admin = Actor::admin(Uuid::new_v4());

        assert!(AppointmentLifecycleService::authorize(&doctor, &appt, Transition::Confirm).is_ok());
        assert!(AppointmentLifecycleService::authorize(&patient, &appt, Transition::Confirm).is_err());
        assert!(AppointmentLifecycleService::authorize(&patient, &appt, Transition::Cancel).is_ok());
        assert!(AppointmentLifecycleService::authorize(&stranger, &appt, Transition::Cancel).is_err());
        assert!(AppointmentLifecycleService::authorize(&admin, &appt, Transition::Cancel).is_err());
        assert!(AppointmentLifecycleService::authorize(&patient, &appt, Transition::Reschedule).is_err());
        assert!(AppointmentLifecycleService::authorize(&doctor, &appt, Transition::Expire).is_err());
        assert!(AppointmentLifecycleService::authorize(&Actor::system(), &appt, Transition::Expire).is_ok());
    }

    #[test]
    fn test_due_transitions() {
        let start = NaiveDate::from_ymd_opt(2031, 3, 3).unwrap().and_hms_opt(10, 0, 0).unwrap();

        let confirmed = appointment(AppointmentStatus::Confirmed);
        assert_eq!(AppointmentLifecycleService::due_transition(&confirmed, start), None);
        assert_eq!(
            AppointmentLifecycleService::due_transition(&confirmed, start + chrono::Duration::minutes(30)),
            Some(Transition::Complete)
        );

        let pending = appointment(AppointmentStatus::Pending);
        assert_eq!(AppointmentLifecycleService::due_transition(&pending, start), Some(Transition::Expire));

        let cancelled = appointment(AppointmentStatus::Cancelled);
        assert_eq!(AppointmentLifecycleService::due_transition(&cancelled, start), None);
    }
}
