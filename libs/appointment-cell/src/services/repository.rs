// libs/appointment-cell/src/services/repository.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, warn};
use uuid::Uuid;

use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, RescheduleRecord, Rescheduled};

const HISTORY_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Another active appointment already overlaps the requested time.
    #[error("Slot already taken")]
    SlotTaken,

    /// The stored row changed since it was read.
    #[error("Appointment was modified concurrently")]
    VersionConflict,

    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for RepositoryError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(_) => RepositoryError::SlotTaken,
            other => RepositoryError::Backend(other.to_string()),
        }
    }
}

impl From<RepositoryError> for AppointmentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SlotTaken => {
                AppointmentError::Conflict("The requested slot is no longer available".to_string())
            }
            RepositoryError::VersionConflict => {
                AppointmentError::Conflict("The appointment was modified concurrently, please retry".to_string())
            }
            RepositoryError::NotFound(id) => AppointmentError::NotFound(format!("Appointment {} not found", id)),
            RepositoryError::Backend(msg) => AppointmentError::Storage(msg),
        }
    }
}

/// Durable appointment storage.
///
/// Implementations must reject any write that would leave two overlapping active
/// appointments for one practitioner on one date. Rows are never deleted.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError>;

    /// Store `appointment` if the row still carries `expected_version`. The stored copy
    /// gets `expected_version + 1`.
    async fn update(&self, appointment: Appointment, expected_version: u64) -> Result<Appointment, RepositoryError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError>;

    async fn list_for_practitioner_on(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, RepositoryError>;

    async fn list_for_practitioner(&self, practitioner_id: Uuid) -> Result<Vec<Appointment>, RepositoryError>;

    async fn list_for_subject(&self, subject_id: Uuid) -> Result<Vec<Appointment>, RepositoryError>;

    async fn list_with_status(&self, statuses: &[AppointmentStatus]) -> Result<Vec<Appointment>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Appointment>, RepositoryError>;

    async fn append_history(&self, record: RescheduleRecord) -> Result<(), RepositoryError>;

    /// Reschedule records of one appointment, oldest first.
    async fn history(&self, appointment_id: Uuid) -> Result<Vec<RescheduleRecord>, RepositoryError>;

    /// Move an appointment and record the move.
    ///
    /// Backends without a transaction write the row first. A history write that still
    /// fails after retrying is reported through `history_recorded`, not as an error,
    /// since the move itself has committed.
    async fn reschedule(
        &self,
        appointment: Appointment,
        expected_version: u64,
        record: RescheduleRecord,
    ) -> Result<Rescheduled, RepositoryError> {
        let saved = self.update(appointment, expected_version).await?;

        for attempt in 1..=HISTORY_WRITE_ATTEMPTS {
            match self.append_history(record.clone()).await {
                Ok(()) => {
                    return Ok(Rescheduled { appointment: saved, history_recorded: true });
                }
                Err(e) => warn!(
                    "Failed to record reschedule history for {} (attempt {}/{}): {}",
                    saved.id, attempt, HISTORY_WRITE_ATTEMPTS, e
                ),
            }
        }

        error!("Appointment {} moved without a reschedule record", saved.id);
        Ok(Rescheduled { appointment: saved, history_recorded: false })
    }
}

// ==============================================================================
// IN-MEMORY REPOSITORY
// ==============================================================================

#[derive(Default)]
struct Tables {
    appointments: HashMap<Uuid, Appointment>,
    history: HashMap<Uuid, Vec<RescheduleRecord>>,
}

impl Tables {
    fn ensure_free(&self, candidate: &Appointment) -> Result<(), RepositoryError> {
        if self.appointments.values().any(|existing| existing.conflicts_with(candidate)) {
            return Err(RepositoryError::SlotTaken);
        }
        Ok(())
    }

    fn replace(&mut self, mut appointment: Appointment, expected_version: u64) -> Result<Appointment, RepositoryError> {
        let stored = self
            .appointments
            .get(&appointment.id)
            .ok_or(RepositoryError::NotFound(appointment.id))?;

        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict);
        }

        self.ensure_free(&appointment)?;

        appointment.version = expected_version + 1;
        self.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }
}

/// Process-local repository. Each write checks overlap and version under one lock.
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    tables: RwLock<Tables>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select<F>(&self, predicate: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool + Send,
    {
        let tables = self.tables.read().await;
        let mut rows: Vec<Appointment> = tables.appointments.values().filter(|a| predicate(a)).cloned().collect();
        rows.sort_by_key(|a| (a.date, a.start_time, a.created_at, a.id));
        rows
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.ensure_free(&appointment)?;
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update(&self, appointment: Appointment, expected_version: u64) -> Result<Appointment, RepositoryError> {
        self.tables.write().await.replace(appointment, expected_version)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn list_for_practitioner_on(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        Ok(self
            .select(|a| a.practitioner_id == practitioner_id && a.date == date)
            .await)
    }

    async fn list_for_practitioner(&self, practitioner_id: Uuid) -> Result<Vec<Appointment>, RepositoryError> {
        Ok(self.select(|a| a.practitioner_id == practitioner_id).await)
    }

    async fn list_for_subject(&self, subject_id: Uuid) -> Result<Vec<Appointment>, RepositoryError> {
        Ok(self.select(|a| a.subject_id == subject_id).await)
    }

    async fn list_with_status(&self, statuses: &[AppointmentStatus]) -> Result<Vec<Appointment>, RepositoryError> {
        Ok(self.select(|a| statuses.contains(&a.status)).await)
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, RepositoryError> {
        Ok(self.select(|_| true).await)
    }

    async fn append_history(&self, record: RescheduleRecord) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.history.entry(record.appointment_id).or_default().push(record);
        Ok(())
    }

    async fn history(&self, appointment_id: Uuid) -> Result<Vec<RescheduleRecord>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .history
            .get(&appointment_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn reschedule(
        &self,
        appointment: Appointment,
        expected_version: u64,
        record: RescheduleRecord,
    ) -> Result<Rescheduled, RepositoryError> {
        let mut tables = self.tables.write().await;
        let saved = tables.replace(appointment, expected_version)?;
        tables.history.entry(record.appointment_id).or_default().push(record);
        Ok(Rescheduled { appointment: saved, history_recorded: true })
    }
}
