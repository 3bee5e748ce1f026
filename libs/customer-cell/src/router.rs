use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn customer_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::search_customers))
        .route(
            "/{customer_id}",
            get(handlers::get_customer)
                .put(handlers::update_customer)
                .delete(handlers::deactivate_customer),
        )
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_middleware,
        ))
        .with_state(config)
}
