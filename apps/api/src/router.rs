use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use serde_json::{json, Value};

use appointment_cell::router::{appointment_routes, AppointmentState};
use availability_cell::router::{availability_routes, AvailabilityState};

pub fn create_router(availability: Arc<AvailabilityState>, appointments: Arc<AppointmentState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .route("/status", get(status))
        .nest("/availability", availability_routes(availability))
        .nest("/appointments", appointment_routes(appointments))
}

async fn status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use appointment_cell::services::{
        InMemoryAppointmentRepository, SchedulingContext, SchedulingSettings, TracingNotificationSink,
    };
    use availability_cell::services::{AvailabilityService, InMemoryAvailabilityStore};
    use shared_config::AppConfig;
    use shared_utils::clock::system_clock;

    fn app() -> Router {
        let config = Arc::new(AppConfig::default());
        let store = Arc::new(InMemoryAvailabilityStore::new());
        let ctx = SchedulingContext::new(
            Arc::new(InMemoryAppointmentRepository::new()),
            store.clone(),
            Arc::new(TracingNotificationSink),
            system_clock(),
            SchedulingSettings::default(),
        );

        create_router(
            Arc::new(AvailabilityState {
                config: config.clone(),
                service: Arc::new(AvailabilityService::new(store)),
            }),
            Arc::new(AppointmentState::new(config, ctx)),
        )
    }

    #[tokio::test]
    async fn test_status_is_public() {
        let response = app()
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_cells_are_mounted_behind_auth() {
        for uri in ["/appointments/export", "/availability/rules"] {
            let response = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}
