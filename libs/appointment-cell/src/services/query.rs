// libs/appointment-cell/src/services/query.rs
use std::cmp::Reverse;

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::auth::{Actor, ActorRole};

use crate::models::{Appointment, AppointmentError, AppointmentPage, AppointmentStatus, ListFilter, PageRequest};
use crate::services::context::SchedulingContext;

/// Read-only role views over appointments. Results may be stale the moment they return.
pub struct QueryService {
    ctx: SchedulingContext,
}

impl QueryService {
    pub fn new(ctx: SchedulingContext) -> Self {
        Self { ctx }
    }

    /// The actor's own appointments matching `filter`, in the filter's contractual order.
    pub async fn list(
        &self,
        actor: &Actor,
        filter: ListFilter,
        page: PageRequest,
    ) -> Result<AppointmentPage, AppointmentError> {
        debug!("Listing {:?} appointments for {} {}", filter, actor.role, actor.id);

        let owned = match actor.role {
            ActorRole::Patient => self.ctx.repository.list_for_subject(actor.id).await?,
            ActorRole::Practitioner => self.ctx.repository.list_for_practitioner(actor.id).await?,
            ActorRole::Admin | ActorRole::System => self.ctx.repository.list_all().await?,
        };

        let selected = select(owned, filter, self.ctx.clock.now());
        let total = selected.len();
        let appointments = selected.into_iter().skip(page.offset).take(page.limit).collect();

        Ok(AppointmentPage {
            appointments,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    pub async fn get(&self, appointment_id: Uuid, actor: &Actor) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .ctx
            .repository
            .get(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {} not found", appointment_id)))?;

        if !can_view(actor, &appointment) {
            warn!("Actor {} tried to read appointment {}", actor.id, appointment_id);
            return Err(AppointmentError::Forbidden("Not allowed to view this appointment".to_string()));
        }
        Ok(appointment)
    }

    /// Every appointment, for reporting, sorted by date, start and id.
    pub async fn export(&self, actor: &Actor) -> Result<Vec<Appointment>, AppointmentError> {
        if actor.role != ActorRole::Admin {
            return Err(AppointmentError::Forbidden("Only administrators can export appointments".to_string()));
        }

        let mut all = self.ctx.repository.list_all().await?;
        all.sort_by_key(|a| (a.date, a.start_time, a.id));
        Ok(all)
    }
}

pub(crate) fn can_view(actor: &Actor, appointment: &Appointment) -> bool {
    match actor.role {
        ActorRole::Admin | ActorRole::System => true,
        ActorRole::Patient => appointment.subject_id == actor.id,
        ActorRole::Practitioner => appointment.practitioner_id == actor.id,
    }
}

/// Filter and order appointments for one view.
///
/// Confirmed appointments are upcoming until they end, then history, so an
/// appointment in progress stays listed. Pending, history and cancelled views are
/// most recent first; upcoming is soonest first. Ties fall back to creation time
/// then id so pagination is stable.
pub fn select(appointments: Vec<Appointment>, filter: ListFilter, now: NaiveDateTime) -> Vec<Appointment> {
    let mut selected: Vec<Appointment> = appointments
        .into_iter()
        .filter(|a| match filter {
            ListFilter::PendingForMe => a.status == AppointmentStatus::Pending,
            ListFilter::UpcomingConfirmed => a.status == AppointmentStatus::Confirmed && a.ends_at() > now,
            ListFilter::History => {
                a.status == AppointmentStatus::Completed
                    || (a.status == AppointmentStatus::Confirmed && a.ends_at() <= now)
            }
            ListFilter::Cancelled => a.status == AppointmentStatus::Cancelled,
        })
        .collect();

    match filter {
        ListFilter::UpcomingConfirmed => selected.sort_by_key(|a| (a.date, a.start_time, a.created_at, a.id)),
        ListFilter::PendingForMe | ListFilter::History | ListFilter::Cancelled => {
            selected.sort_by_key(|a| Reverse((a.date, a.start_time, a.created_at, a.id)))
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    use crate::models::ConsultationType;

    fn appt(day: u32, hour: u32, status: AppointmentStatus) -> Appointment {
        let mut a = Appointment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2031, 3, day).unwrap(),
            NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            30,
            ConsultationType::InPerson,
            "Visit".to_string(),
        );
        a.status = status;
        a
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2031, 3, 10).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn slots_of(list: &[Appointment]) -> Vec<(u32, u32)> {
        use chrono::{Datelike, Timelike};
        list.iter().map(|a| (a.date.day(), a.start_time.hour())).collect()
    }

    #[test]
    fn test_upcoming_is_soonest_first_and_excludes_past() {
        let all = vec![
            appt(12, 9, AppointmentStatus::Confirmed),
            appt(11, 15, AppointmentStatus::Confirmed),
            appt(11, 9, AppointmentStatus::Confirmed),
            appt(9, 9, AppointmentStatus::Confirmed),
            appt(11, 10, AppointmentStatus::Pending),
        ];

        let upcoming = select(all, ListFilter::UpcomingConfirmed, now());
        assert_eq!(slots_of(&upcoming), vec![(11, 9), (11, 15), (12, 9)]);
    }

    #[test]
    fn test_history_holds_completed_and_elapsed_confirmed_most_recent_first() {
        let all = vec![
            appt(5, 9, AppointmentStatus::Completed),
            appt(9, 9, AppointmentStatus::Confirmed),
            appt(7, 14, AppointmentStatus::Completed),
            appt(10, 11, AppointmentStatus::Confirmed),
            appt(10, 12, AppointmentStatus::Confirmed),
            appt(8, 9, AppointmentStatus::Cancelled),
        ];

        let history = select(all, ListFilter::History, now());
        assert_eq!(slots_of(&history), vec![(10, 11), (9, 9), (7, 14), (5, 9)]);
    }

    #[test]
    fn test_appointment_in_progress_is_still_upcoming() {
        // Starts at 11:45 on the 10th and ends at 12:15, with now at 12:00
        let mut running = appt(10, 11, AppointmentStatus::Confirmed);
        running.start_time = NaiveTime::from_hms_opt(11, 45, 0).unwrap();
        let all = vec![running.clone(), appt(10, 11, AppointmentStatus::Confirmed)];

        let upcoming = select(all.clone(), ListFilter::UpcomingConfirmed, now());
        let history = select(all, ListFilter::History, now());

        assert_eq!(upcoming.iter().map(|a| a.id).collect::<Vec<_>>(), vec![running.id]);
        assert!(history.iter().all(|a| a.id != running.id));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_pending_and_cancelled_are_most_recent_first() {
        let all = vec![
            appt(11, 9, AppointmentStatus::Pending),
            appt(20, 9, AppointmentStatus::Pending),
            appt(2, 9, AppointmentStatus::Cancelled),
            appt(15, 9, AppointmentStatus::Cancelled),
        ];

        assert_eq!(slots_of(&select(all.clone(), ListFilter::PendingForMe, now())), vec![(20, 9), (11, 9)]);
        assert_eq!(slots_of(&select(all, ListFilter::Cancelled, now())), vec![(15, 9), (2, 9)]);
    }
}
