use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{Appointment, AppointmentStatus, ConsultationType, RescheduleRecord};
use appointment_cell::services::{AppointmentRepository, RepositoryError, SupabaseAppointmentRepository};
use shared_database::SupabaseClient;
use shared_utils::test_utils::TestConfig;

const APPOINTMENTS: &str = "/rest/v1/appointments";

fn repository_for(server: &MockServer) -> SupabaseAppointmentRepository {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    SupabaseAppointmentRepository::new(Arc::new(SupabaseClient::new(&config)))
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 3, 3).unwrap()
}

fn appointment(practitioner_id: Uuid, hour: u32, minute: u32) -> Appointment {
    Appointment::new(
        practitioner_id,
        Uuid::new_v4(),
        monday(),
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        30,
        ConsultationType::InPerson,
        "Follow-up".to_string(),
    )
}

async fn mount_same_day(server: &MockServer, practitioner_id: Uuid, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(APPOINTMENTS))
        .and(query_param("practitioner_id", format!("eq.{}", practitioner_id)))
        .and(query_param("date", "eq.2031-03-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_insert_posts_the_row_and_returns_stored_copy() {
    let server = MockServer::start().await;
    let candidate = appointment(Uuid::new_v4(), 10, 0);

    mount_same_day(&server, candidate.practitioner_id, json!([])).await;
    Mock::given(method("POST"))
        .and(path(APPOINTMENTS))
        .and(body_partial_json(json!({ "id": candidate.id, "status": "PENDING", "version": 1 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([candidate])))
        .expect(1)
        .mount(&server)
        .await;

    let stored = repository_for(&server).insert(candidate.clone()).await.unwrap();
    assert_eq!(stored, candidate);
}

#[tokio::test]
async fn test_insert_refuses_overlap_without_writing() {
    let server = MockServer::start().await;
    let practitioner_id = Uuid::new_v4();
    let existing = appointment(practitioner_id, 10, 0);
    let candidate = appointment(practitioner_id, 10, 15);

    mount_same_day(&server, practitioner_id, json!([existing])).await;
    Mock::given(method("POST"))
        .and(path(APPOINTMENTS))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    assert_matches!(repository_for(&server).insert(candidate).await, Err(RepositoryError::SlotTaken));
}

#[tokio::test]
async fn test_insert_maps_exclusion_violation_to_slot_taken() {
    let server = MockServer::start().await;
    let candidate = appointment(Uuid::new_v4(), 9, 0);

    mount_same_day(&server, candidate.practitioner_id, json!([])).await;
    Mock::given(method("POST"))
        .and(path(APPOINTMENTS))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23P01",
            "message": "conflicting key value violates exclusion constraint"
        })))
        .mount(&server)
        .await;

    assert_matches!(repository_for(&server).insert(candidate).await, Err(RepositoryError::SlotTaken));
}

#[tokio::test]
async fn test_update_with_stale_version_is_a_version_conflict() {
    let server = MockServer::start().await;
    let mut stored = appointment(Uuid::new_v4(), 9, 0);
    stored.version = 3;

    mount_same_day(&server, stored.practitioner_id, json!([stored])).await;
    Mock::given(method("PATCH"))
        .and(path(APPOINTMENTS))
        .and(query_param("id", format!("eq.{}", stored.id)))
        .and(query_param("version", "eq.2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(APPOINTMENTS))
        .and(query_param("id", format!("eq.{}", stored.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([stored])))
        .mount(&server)
        .await;

    let mut change = stored.clone();
    change.status = AppointmentStatus::Confirmed;

    assert_matches!(
        repository_for(&server).update(change, 2).await,
        Err(RepositoryError::VersionConflict)
    );
}

#[tokio::test]
async fn test_update_of_missing_row_is_not_found() {
    let server = MockServer::start().await;
    let mut gone = appointment(Uuid::new_v4(), 9, 0);
    gone.status = AppointmentStatus::Cancelled;

    Mock::given(method("PATCH"))
        .and(path(APPOINTMENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(APPOINTMENTS))
        .and(query_param("id", format!("eq.{}", gone.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let id = gone.id;
    assert_matches!(
        repository_for(&server).update(gone, 1).await,
        Err(RepositoryError::NotFound(missing)) if missing == id
    );
}

#[tokio::test]
async fn test_update_bumps_the_version() {
    let server = MockServer::start().await;
    let stored = appointment(Uuid::new_v4(), 11, 0);
    let mut confirmed = stored.clone();
    confirmed.status = AppointmentStatus::Confirmed;
    let mut echoed = confirmed.clone();
    echoed.version = 2;

    mount_same_day(&server, stored.practitioner_id, json!([stored])).await;
    Mock::given(method("PATCH"))
        .and(path(APPOINTMENTS))
        .and(query_param("version", "eq.1"))
        .and(body_partial_json(json!({ "status": "CONFIRMED", "version": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([echoed])))
        .expect(1)
        .mount(&server)
        .await;

    let saved = repository_for(&server).update(confirmed, 1).await.unwrap();
    assert_eq!(saved.version, 2);
    assert_eq!(saved.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn test_list_with_status_filters_server_side() {
    let server = MockServer::start().await;
    let row = appointment(Uuid::new_v4(), 9, 0);

    Mock::given(method("GET"))
        .and(path(APPOINTMENTS))
        .and(query_param("status", "in.(PENDING,CONFIRMED)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = repository_for(&server)
        .list_with_status(&[AppointmentStatus::Pending, AppointmentStatus::Confirmed])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, row.id);
}

#[tokio::test]
async fn test_history_reads_reschedule_records() {
    let server = MockServer::start().await;
    let before = appointment(Uuid::new_v4(), 9, 0);
    let mut after = before.clone();
    after.start_time = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
    let record = RescheduleRecord::between(&before, &after, Some("Clinic closed early".to_string()), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointment_reschedules"))
        .and(query_param("appointment_id", format!("eq.{}", before.id)))
        .and(query_param("order", "rescheduled_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record])))
        .expect(1)
        .mount(&server)
        .await;

    let history = repository_for(&server).history(before.id).await.unwrap();
    assert_eq!(history, vec![record]);
}

#[tokio::test]
async fn test_backend_failure_surfaces_as_backend_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(APPOINTMENTS))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    assert_matches!(repository_for(&server).get(Uuid::new_v4()).await, Err(RepositoryError::Backend(_)));
}

#[tokio::test]
async fn test_reschedule_reports_history_that_could_not_be_written() {
    let server = MockServer::start().await;
    let mut stored = appointment(Uuid::new_v4(), 9, 0);
    stored.status = AppointmentStatus::Confirmed;
    let mut moved = stored.clone();
    moved.start_time = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
    let mut echoed = moved.clone();
    echoed.version = 2;

    mount_same_day(&server, stored.practitioner_id, json!([stored])).await;
    Mock::given(method("PATCH"))
        .and(path(APPOINTMENTS))
        .and(query_param("version", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([echoed])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_reschedules"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let record = RescheduleRecord::between(&stored, &moved, None, stored.practitioner_id);
    let outcome = repository_for(&server).reschedule(moved, 1, record).await.unwrap();

    assert!(!outcome.history_recorded);
    assert_eq!(outcome.appointment.version, 2);
    assert_eq!(outcome.appointment.start_time, NaiveTime::from_hms_opt(11, 0, 0).unwrap());
}
