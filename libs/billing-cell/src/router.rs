use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn billing_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/invoices",
            get(handlers::list_invoices).post(handlers::generate_invoice),
        )
        .route("/sweep", post(handlers::trigger_sweep))
        .route("/audit", get(handlers::list_audit_log))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_middleware,
        ))
        .with_state(config)
}
