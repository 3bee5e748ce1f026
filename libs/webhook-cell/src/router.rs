use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, WebhookState};

pub fn webhook_router(state: WebhookState) -> Router {
    let admin = Router::new()
        .route("/events/{event_id}/replay", post(handlers::replay_event))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .route(
            "/whatsapp",
            get(handlers::verify_whatsapp).post(handlers::receive_whatsapp),
        )
        .route("/asaas", post(handlers::receive_asaas))
        .merge(admin)
        .with_state(state)
}
