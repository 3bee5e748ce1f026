use std::sync::Arc;

use axum::{routing::get, Router};

use billing_cell::router::billing_router;
use conversation_cell::router::conversation_router;
use customer_cell::router::customer_router;
use scheduling_cell::router::{appointment_router, availability_router};
use shared_config::AppConfig;
use webhook_cell::router::webhook_router;
use webhook_cell::WebhookState;

pub fn create_router(state: Arc<AppConfig>, webhook_state: WebhookState) -> Router {
    Router::new()
        .route("/", get(|| async { "Agenda API is running!" }))
        .nest("/webhooks", webhook_router(webhook_state))
        .nest("/customers", customer_router(state.clone()))
        .nest("/availability", availability_router(state.clone()))
        .nest("/appointments", appointment_router(state.clone()))
        .nest("/conversations", conversation_router(state.clone()))
        .nest("/billing", billing_router(state.clone()))
}
