// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, User};
use shared_models::error::AppError;

use crate::models::{
    CreateAppointmentRequest, CreatedAppointment, ListQuery, NextSlotsQuery, PageRequest, RescheduleRequest,
    SlotsQuery,
};
use crate::router::AppointmentState;

// ==============================================================================
// SLOT QUERIES
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<Arc<AppointmentState>>,
    Path(practitioner_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state.slots.available_slots(practitioner_id, query.date).await?;

    Ok(Json(json!({
        "practitioner_id": practitioner_id,
        "date": query.date,
        "slots": slots,
    })))
}

pub async fn get_next_available_slots(
    State(state): State<Arc<AppointmentState>>,
    Path(practitioner_id): Path<Uuid>,
    Query(query): Query<NextSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state.slots.next_available_slots(practitioner_id, query.limit).await?;

    Ok(Json(json!({
        "practitioner_id": practitioner_id,
        "slots": slots,
        "total": slots.len(),
    })))
}

// ==============================================================================
// BOOKING AND TRANSITIONS
// ==============================================================================

pub async fn create_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<CreatedAppointment>), AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = state.booking.create(&actor, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedAppointment {
            appointment_id: appointment.id,
            status: appointment.status,
        }),
    ))
}

pub async fn confirm_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = state.booking.confirm(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = state.booking.cancel(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = state.booking.complete(appointment_id, &actor).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let outcome = state.reschedule.reschedule(appointment_id, &actor, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "history_recorded": outcome.history_recorded,
    })))
}

// ==============================================================================
// READS
// ==============================================================================

pub async fn list_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let page = state
        .queries
        .list(&actor, query.filter, PageRequest::new(query.limit, query.offset))
        .await?;

    Ok(Json(json!({
        "filter": query.filter,
        "appointments": page.appointments,
        "total": page.total,
        "limit": page.limit,
        "offset": page.offset,
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointment = state.queries.get(appointment_id, &actor).await?;
    Ok(Json(json!(appointment)))
}

pub async fn get_reschedule_history(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let history = state.reschedule.history(appointment_id, &actor).await?;

    Ok(Json(json!({
        "appointment_id": appointment_id,
        "history": history,
    })))
}

/// Read-only feed for the reporting collaborator.
pub async fn export_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let appointments = state.queries.export(&actor).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}
