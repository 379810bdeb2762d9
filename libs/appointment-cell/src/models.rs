// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use availability_cell::models::{AvailabilityError, ReservedSpan};
use shared_models::error::AppError;

pub const MAX_REASON_LENGTH: usize = 1000;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    /// The patient the appointment is booked for.
    pub subject_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub consultation_type: ConsultationType,
    pub reason: String,
    /// Optimistic concurrency counter, bumped on every stored update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(
        practitioner_id: Uuid,
        subject_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: u32,
        consultation_type: ConsultationType,
        reason: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            practitioner_id,
            subject_id,
            date,
            start_time,
            duration_minutes,
            status: AppointmentStatus::Pending,
            consultation_type,
            reason,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// The span this appointment blocks on its date, if it still holds the slot.
    pub fn reserved_span(&self) -> Option<ReservedSpan> {
        self.status.is_active().then_some(ReservedSpan {
            start: self.start_time,
            duration_minutes: self.duration_minutes,
        })
    }

    /// Two active appointments of one practitioner whose `[start, end)` intervals intersect.
    pub fn conflicts_with(&self, other: &Appointment) -> bool {
        self.id != other.id
            && self.practitioner_id == other.practitioner_id
            && self.status.is_active()
            && other.status.is_active()
            && self.starts_at() < other.ends_at()
            && other.starts_at() < self.ends_at()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "confirmed")]
    Confirmed,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "cancelled")]
    Cancelled,
}

impl AppointmentStatus {
    /// Pending and confirmed appointments hold their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "PENDING"),
            AppointmentStatus::Confirmed => write!(f, "CONFIRMED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationType {
    #[serde(alias = "in_person", alias = "cabinet", alias = "presentiel")]
    InPerson,
    #[serde(alias = "remote", alias = "video", alias = "teleconsultation")]
    Remote,
}

/// A requested change of status. Applied through the lifecycle transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Confirm,
    Cancel,
    Complete,
    Reschedule,
    /// A pending request whose start passed without confirmation.
    Expire,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Confirm => write!(f, "confirm"),
            Transition::Cancel => write!(f, "cancel"),
            Transition::Complete => write!(f, "complete"),
            Transition::Reschedule => write!(f, "reschedule"),
            Transition::Expire => write!(f, "expire"),
        }
    }
}

/// One move of an appointment, kept so a reschedule never loses where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleRecord {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub from_date: NaiveDate,
    pub from_start: NaiveTime,
    pub to_date: NaiveDate,
    pub to_start: NaiveTime,
    pub note: Option<String>,
    pub rescheduled_by: Uuid,
    pub rescheduled_at: DateTime<Utc>,
}

impl RescheduleRecord {
    pub fn between(before: &Appointment, after: &Appointment, note: Option<String>, by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id: before.id,
            from_date: before.date,
            from_start: before.start_time,
            to_date: after.date,
            to_start: after.start_time,
            note,
            rescheduled_by: by,
            rescheduled_at: Utc::now(),
        }
    }
}

/// A committed move. `history_recorded` is false when the row moved but its
/// reschedule record could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rescheduled {
    pub appointment: Appointment,
    pub history_recorded: bool,
}

// ==============================================================================
// EVENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppointmentEvent {
    Created,
    Confirmed,
    Cancelled,
    Rescheduled { from_date: NaiveDate, from_start: NaiveTime },
    Completed,
    Expired,
}

impl AppointmentEvent {
    pub fn for_transition(transition: Transition) -> Option<Self> {
        match transition {
            Transition::Confirm => Some(AppointmentEvent::Confirmed),
            Transition::Cancel => Some(AppointmentEvent::Cancelled),
            Transition::Complete => Some(AppointmentEvent::Completed),
            Transition::Expire => Some(AppointmentEvent::Expired),
            // Carries the previous slot, built by the reschedule coordinator
            Transition::Reschedule => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentNotification {
    pub appointment_id: Uuid,
    pub event: AppointmentEvent,
    pub at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub practitioner_id: Uuid,
    pub subject_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub reason: String,
    pub consultation_type: ConsultationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedAppointment {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListFilter {
    #[serde(alias = "pending_for_me", alias = "pending")]
    PendingForMe,
    #[serde(alias = "upcoming_confirmed", alias = "upcoming")]
    UpcomingConfirmed,
    #[serde(alias = "history")]
    History,
    #[serde(alias = "cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    pub filter: ListFilter,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 200;

    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentPage {
    pub appointments: Vec<Appointment>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextSlotsQuery {
    pub limit: Option<usize>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidStateTransition {
        from: AppointmentStatus,
        action: Transition,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<AvailabilityError> for AppointmentError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::Validation(msg) => AppointmentError::Validation(msg),
            AvailabilityError::NotFound(msg) => AppointmentError::NotFound(msg),
            AvailabilityError::Forbidden(msg) => AppointmentError::Forbidden(msg),
            AvailabilityError::Storage(msg) => AppointmentError::Storage(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::NotFound(msg) => AppError::NotFound(msg),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            e @ AppointmentError::InvalidStateTransition { .. } => AppError::InvalidStateTransition(e.to_string()),
            AppointmentError::Storage(msg) => AppError::Database(msg),
        }
    }
}
