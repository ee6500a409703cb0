use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::{
    AppointmentNotifier, AppointmentStore, BroadcastNotifier, CompositeNotifier, InMemoryAppointmentStore,
    SupabaseAppointmentStore, WebhookNotifier,
};
use appointment_cell::AppointmentState;
use doctor_cell::{InMemoryScheduleStore, ScheduleStore, SupabaseScheduleStore};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

fn stores(config: &AppConfig) -> (Arc<dyn ScheduleStore>, Arc<dyn AppointmentStore>) {
    if config.is_supabase_configured() {
        info!("Using Supabase at {} for schedules and appointments", config.supabase_url);
        let supabase = Arc::new(SupabaseClient::new(config));
        (
            Arc::new(SupabaseScheduleStore::new(Arc::clone(&supabase))),
            Arc::new(SupabaseAppointmentStore::new(supabase)),
        )
    } else {
        warn!("Supabase not configured, schedules and appointments live in memory only");
        (Arc::new(InMemoryScheduleStore::new()), Arc::new(InMemoryAppointmentStore::new()))
    }
}

fn notifier(config: &AppConfig) -> Arc<dyn AppointmentNotifier> {
    let mut notifier = CompositeNotifier::new()
        .with(Arc::new(BroadcastNotifier::new(config.notification_channel_capacity)));

    if let Some(url) = &config.notification_webhook_url {
        info!("Appointment events will be posted to {}", url);
        notifier = notifier.with(Arc::new(WebhookNotifier::new(url.clone())));
    }

    Arc::new(notifier)
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
        warn!("Configuration incomplete, check the SUPABASE_* variables");
    }

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create shared state
    let (schedules, appointments) = stores(&config);
    let state = AppointmentState::new(Arc::clone(&config), schedules, appointments, notifier(&config));

    // Build the application router
    let app = router::create_router(state)
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

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
