// libs/availability-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// AVAILABILITY RULES
// ==============================================================================

/// A half-open `[start, end)` window during which a practitioner accepts bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpenInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl OpenInterval {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &OpenInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuleScope {
    Weekly(Weekday),
    Date(NaiveDate),
}

impl RuleScope {
    pub fn kind(&self) -> RuleKind {
        match self {
            RuleScope::Weekly(_) => RuleKind::Recurring,
            RuleScope::Date(_) => RuleKind::Override,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    Recurring,
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub scope: RuleScope,
    pub kind: RuleKind,
    /// Sorted, non-overlapping. Empty only for a "closed" override.
    pub intervals: Vec<OpenInterval>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityRule {
    pub fn new(practitioner_id: Uuid, scope: RuleScope, intervals: Vec<OpenInterval>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            practitioner_id,
            scope,
            kind: scope.kind(),
            intervals,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sort key used by rule listings: weekly rules Monday-first, then overrides by date.
    pub fn listing_key(&self) -> (u8, u32, Option<NaiveDate>) {
        match self.scope {
            RuleScope::Weekly(day) => (0, day.num_days_from_monday(), None),
            RuleScope::Date(date) => (1, 0, Some(date)),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutRuleRequest {
    pub intervals: Vec<OpenInterval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalsQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotUnavailableReason {
    /// The start time has already passed.
    Past,
    /// Overlaps a pending or confirmed appointment.
    Reserved,
}

/// A candidate start time. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub available: bool,
    pub reason_if_unavailable: Option<SlotUnavailableReason>,
}

/// Time already claimed on the slot's date by a non-terminal appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedSpan {
    pub start: NaiveTime,
    pub duration_minutes: u32,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<shared_database::DatabaseError> for AvailabilityError {
    fn from(err: shared_database::DatabaseError) -> Self {
        AvailabilityError::Storage(err.to_string())
    }
}

impl From<AvailabilityError> for shared_models::error::AppError {
    fn from(err: AvailabilityError) -> Self {
        use shared_models::error::AppError;
        match err {
            AvailabilityError::Validation(msg) => AppError::ValidationError(msg),
            AvailabilityError::NotFound(msg) => AppError::NotFound(msg),
            AvailabilityError::Forbidden(msg) => AppError::Forbidden(msg),
            AvailabilityError::Storage(msg) => AppError::Database(msg),
        }
    }
}
