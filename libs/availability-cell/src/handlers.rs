// libs/availability-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Weekday};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, User};
use shared_models::error::AppError;

use crate::models::{IntervalsQuery, PutRuleRequest};
use crate::router::AvailabilityState;

/// The calling practitioner's own rules.
pub async fn list_my_rules(
    State(state): State<Arc<AvailabilityState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let rules = state.service.list_rules(actor.id).await?;

    Ok(Json(json!({
        "rules": rules,
        "total": rules.len(),
    })))
}

pub async fn list_practitioner_rules(
    State(state): State<Arc<AvailabilityState>>,
    Path(practitioner_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let rules = state.service.list_rules(practitioner_id).await?;

    Ok(Json(json!({
        "practitioner_id": practitioner_id,
        "rules": rules,
    })))
}

pub async fn put_weekly_rule(
    State(state): State<Arc<AvailabilityState>>,
    Extension(user): Extension<User>,
    Path(weekday): Path<String>,
    Json(request): Json<PutRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let weekday: Weekday = weekday
        .parse()
        .map_err(|_| AppError::ValidationError(format!("'{}' is not a weekday", weekday)))?;

    let rule = state.service.put_weekly_rule(&actor, weekday, request.intervals).await?;

    Ok(Json(json!({
        "success": true,
        "rule": rule,
    })))
}

pub async fn put_date_override(
    State(state): State<Arc<AvailabilityState>>,
    Extension(user): Extension<User>,
    Path(date): Path<NaiveDate>,
    Json(request): Json<PutRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = Actor::from_user(&user)?;
    let rule = state.service.put_date_override(&actor, date, request.intervals).await?;

    Ok(Json(json!({
        "success": true,
        "rule": rule,
        "closed": rule.intervals.is_empty(),
    })))
}

pub async fn delete_rule(
    State(state): State<Arc<AvailabilityState>>,
    Extension(user): Extension<User>,
    Path(rule_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let actor = Actor::from_user(&user)?;
    state.service.remove_rule(&actor, rule_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_open_intervals(
    State(state): State<Arc<AvailabilityState>>,
    Path(practitioner_id): Path<Uuid>,
    Query(query): Query<IntervalsQuery>,
) -> Result<Json<Value>, AppError> {
    let intervals = state.service.open_intervals(practitioner_id, query.date).await?;

    Ok(Json(json!({
        "practitioner_id": practitioner_id,
        "date": query.date,
        "intervals": intervals,
    })))
}
