// libs/availability-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::AvailabilityService;

pub struct AvailabilityState {
    pub config: Arc<AppConfig>,
    pub service: Arc<AvailabilityService>,
}

pub fn availability_routes(state: Arc<AvailabilityState>) -> Router {
    Router::new()
        .route("/rules", get(handlers::list_my_rules))
        .route("/rules/weekly/{weekday}", put(handlers::put_weekly_rule))
        .route("/rules/dates/{date}", put(handlers::put_date_override))
        .route("/rules/{rule_id}", delete(handlers::delete_rule))
        .route("/practitioners/{practitioner_id}/rules", get(handlers::list_practitioner_rules))
        .route("/practitioners/{practitioner_id}/intervals", get(handlers::get_open_intervals))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
