use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::time::Duration;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::router::AppointmentState;
use appointment_cell::services::{
    AppointmentRepository, BookingService, InMemoryAppointmentRepository, LifecycleSweeper, SchedulingContext, SchedulingSettings,
    SupabaseAppointmentRepository, TracingNotificationSink,
};
use availability_cell::router::AvailabilityState;
use availability_cell::services::{
    AvailabilityService, AvailabilityStore, InMemoryAvailabilityStore, SupabaseAvailabilityStore,
};
use shared_config::{AppConfig, StorageBackend};
use shared_database::SupabaseClient;
use shared_utils::clock::system_clock;

fn storage(config: &AppConfig) -> (Arc<dyn AppointmentRepository>, Arc<dyn AvailabilityStore>) {
    match config.storage_backend {
        StorageBackend::Memory => {
            warn!("Using in-memory storage, data is lost on restart");
            (
                Arc::new(InMemoryAppointmentRepository::new()),
                Arc::new(InMemoryAvailabilityStore::new()),
            )
        }
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(config));
            (
                Arc::new(SupabaseAppointmentRepository::new(supabase.clone())),
                Arc::new(SupabaseAvailabilityStore::new(supabase)),
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());
    if !config.is_configured() {
        warn!("Supabase settings are incomplete; token validation will reject every request");
    }

    let (repository, availability_store) = storage(&config);

    let ctx = SchedulingContext::new(
        repository,
        availability_store.clone(),
        Arc::new(TracingNotificationSink),
        system_clock(),
        SchedulingSettings::from_config(&config),
    );
    let booking = Arc::new(BookingService::new(ctx.clone()));

    let sweeper = if config.lifecycle_sweep_enabled {
        let sweeper = Arc::new(LifecycleSweeper::new(
            ctx.clone(),
            booking.clone(),
            Duration::from_secs(config.lifecycle_sweep_interval_seconds),
            config.pending_expiry_enabled,
        ));
        sweeper.clone().spawn();
        Some(sweeper)
    } else {
        info!("Lifecycle sweeper disabled");
        None
    };

    let availability = Arc::new(AvailabilityState {
        config: config.clone(),
        service: Arc::new(AvailabilityService::new(availability_store)),
    });
    let appointments = Arc::new(AppointmentState::with_booking(config.clone(), ctx, booking));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(availability, appointments)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    info!("Server stopped");
    Ok(())
}
