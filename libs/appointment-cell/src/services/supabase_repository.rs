// libs/appointment-cell/src/services/supabase_repository.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Appointment, AppointmentStatus, RescheduleRecord};
use crate::services::conflict::find_conflicts;
use crate::services::repository::{AppointmentRepository, RepositoryError};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";
const RESCHEDULES_PATH: &str = "/rest/v1/appointment_reschedules";
const ORDERING: &str = "order=date.asc,start_time.asc,created_at.asc";

/// PostgREST-backed repository.
///
/// The `appointments` table is expected to carry an exclusion constraint over
/// `(practitioner_id, date, [start, end))` for rows in PENDING or CONFIRMED, which
/// PostgREST reports as HTTP 409. The in-process overlap check below narrows the
/// window but the constraint is what holds across server instances.
pub struct SupabaseAppointmentRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Appointment>, RepositoryError> {
        let path = format!("{}?{}", APPOINTMENTS_PATH, query);
        Ok(self.supabase.request(Method::GET, &path, None, None).await?)
    }

    async fn ensure_free(&self, candidate: &Appointment) -> Result<(), RepositoryError> {
        let same_day = self.list_for_practitioner_on(candidate.practitioner_id, candidate.date).await?;
        if !find_conflicts(candidate, &same_day).is_empty() {
            warn!("Appointment {} would overlap an active booking", candidate.id);
            return Err(RepositoryError::SlotTaken);
        }
        Ok(())
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RepositoryError> {
        serde_json::to_value(value).map_err(|e| RepositoryError::Backend(e.to_string()))
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, RepositoryError> {
        self.ensure_free(&appointment).await?;

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                APPOINTMENTS_PATH,
                None,
                Some(Self::encode(&appointment)?),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| RepositoryError::Backend("Insert returned no row".to_string()))
    }

    async fn update(&self, mut appointment: Appointment, expected_version: u64) -> Result<Appointment, RepositoryError> {
        if appointment.status.is_active() {
            self.ensure_free(&appointment).await?;
        }

        appointment.version = expected_version + 1;
        let path = format!("{}?id=eq.{}&version=eq.{}", APPOINTMENTS_PATH, appointment.id, expected_version);

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(Self::encode(&appointment)?),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        match rows.into_iter().next() {
            Some(saved) => Ok(saved),
            None => {
                // Zero rows matched: either gone or the version moved on
                if self.get(appointment.id).await?.is_none() {
                    return Err(RepositoryError::NotFound(appointment.id));
                }
                debug!("Version {} of appointment {} is stale", expected_version, appointment.id);
                Err(RepositoryError::VersionConflict)
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, RepositoryError> {
        Ok(self.fetch(&format!("id=eq.{}&limit=1", id)).await?.into_iter().next())
    }

    async fn list_for_practitioner_on(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        self.fetch(&format!("practitioner_id=eq.{}&date=eq.{}&{}", practitioner_id, date, ORDERING))
            .await
    }

    async fn list_for_practitioner(&self, practitioner_id: Uuid) -> Result<Vec<Appointment>, RepositoryError> {
        self.fetch(&format!("practitioner_id=eq.{}&{}", practitioner_id, ORDERING)).await
    }

    async fn list_for_subject(&self, subject_id: Uuid) -> Result<Vec<Appointment>, RepositoryError> {
        self.fetch(&format!("subject_id=eq.{}&{}", subject_id, ORDERING)).await
    }

    async fn list_with_status(&self, statuses: &[AppointmentStatus]) -> Result<Vec<Appointment>, RepositoryError> {
        let wanted: Vec<String> = statuses.iter().map(ToString::to_string).collect();
        self.fetch(&format!("status=in.({})&{}", wanted.join(","), ORDERING)).await
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, RepositoryError> {
        self.fetch(ORDERING).await
    }

    async fn append_history(&self, record: RescheduleRecord) -> Result<(), RepositoryError> {
        let _: Vec<RescheduleRecord> = self
            .supabase
            .request_with_headers(
                Method::POST,
                RESCHEDULES_PATH,
                None,
                Some(Self::encode(&record)?),
                Some(SupabaseClient::return_representation()),
            )
            .await?;
        Ok(())
    }

    async fn history(&self, appointment_id: Uuid) -> Result<Vec<RescheduleRecord>, RepositoryError> {
        let path = format!(
            "{}?appointment_id=eq.{}&order=rescheduled_at.asc",
            RESCHEDULES_PATH, appointment_id
        );
        Ok(self.supabase.request(Method::GET, &path, None, None).await?)
    }
}
