use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/rules",
            get(handlers::list_rules).post(handlers::create_rule),
        )
        .route("/rules/{rule_id}", put(handlers::update_rule))
        .route("/slots", get(handlers::available_slots))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_middleware,
        ))
        .with_state(config)
}

pub fn appointment_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::list_upcoming).post(handlers::book_appointment),
        )
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/{appointment_id}/reschedule",
            post(handlers::reschedule_appointment),
        )
        .route(
            "/{appointment_id}/cancel",
            post(handlers::cancel_appointment),
        )
        .route(
            "/{appointment_id}/complete",
            post(handlers::complete_appointment),
        )
        .route("/{appointment_id}/no-show", post(handlers::mark_no_show))
        .route(
            "/reminders/sweep",
            post(handlers::trigger_reminder_sweep),
        )
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_middleware,
        ))
        .with_state(config)
}
