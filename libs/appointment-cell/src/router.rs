// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{BookingService, QueryService, RescheduleCoordinator, SchedulingContext, SlotQueryService};

pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<BookingService>,
    pub reschedule: Arc<RescheduleCoordinator>,
    pub queries: Arc<QueryService>,
    pub slots: Arc<SlotQueryService>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, ctx: SchedulingContext) -> Self {
        Self::with_booking(config, ctx.clone(), Arc::new(BookingService::new(ctx)))
    }

    /// Share one booking service with other consumers such as the lifecycle sweeper.
    pub fn with_booking(config: Arc<AppConfig>, ctx: SchedulingContext, booking: Arc<BookingService>) -> Self {
        Self {
            config,
            booking,
            reschedule: Arc::new(RescheduleCoordinator::new(ctx.clone())),
            queries: Arc::new(QueryService::new(ctx.clone())),
            slots: Arc::new(SlotQueryService::new(ctx)),
        }
    }
}

pub fn appointment_routes(state: Arc<AppointmentState>) -> Router {
    // All appointment operations require authentication
    Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::create_appointment))
        .route("/export", get(handlers::export_appointments))
        .route("/slots/{practitioner_id}", get(handlers::get_available_slots))
        .route("/slots/{practitioner_id}/next", get(handlers::get_next_available_slots))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/history", get(handlers::get_reschedule_history))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/reschedule", post(handlers::reschedule_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
