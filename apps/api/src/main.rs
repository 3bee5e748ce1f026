use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use billing_cell::services::sweep::BillingSweep;
use scheduling_cell::services::reminders::ReminderService;
use shared_config::AppConfig;
use webhook_cell::WebhookState;

/// Billing sweep cadence carried over from the original automation.
const BILLING_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
const REMINDER_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting scheduling & billing orchestrator API");

    // Load configuration
    let config = AppConfig::from_env();

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create shared state
    let state = Arc::new(config);
    let webhook_state = WebhookState::new(state.clone());

    spawn_billing_sweep(state.clone());
    spawn_reminder_sweep(state.clone());

    // Build the application router
    let app = router::create_router(state, webhook_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn spawn_billing_sweep(config: Arc<AppConfig>) {
    if !config.is_billing_configured() {
        warn!("Billing not configured, sweep disabled");
        return;
    }

    tokio::spawn(async move {
        let sweep = BillingSweep::new(&config);
        let mut ticker = tokio::time::interval(BILLING_SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep.run().await {
                warn!("Billing sweep failed: {}", e);
            }
        }
    });
}

fn spawn_reminder_sweep(config: Arc<AppConfig>) {
    if !config.is_messaging_configured() {
        warn!("Messaging not configured, reminder sweep disabled");
        return;
    }

    tokio::spawn(async move {
        let reminders = ReminderService::new(&config);
        let mut ticker = tokio::time::interval(REMINDER_SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = reminders.sweep().await {
                warn!("Reminder sweep failed: {}", e);
            }
        }
    });
}
