use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::ConversationError;
use crate::services::Orchestrator;

impl From<ConversationError> for AppError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::Customer(inner) => inner.into(),
            ConversationError::Scheduling(inner) => inner.into(),
            ConversationError::Messaging(inner) => AppError::ExternalService(inner.to_string()),
            ConversationError::StateLost(msg) => AppError::Internal(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn finish_handoff(
    State(config): State<Arc<AppConfig>>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let orchestrator = Orchestrator::new(config);

    let ended = orchestrator.finish_handoff(customer_id).await?;
    if !ended {
        return Err(AppError::BadRequest(
            "customer is not in a human handoff".to_string(),
        ));
    }

    Ok(Json(json!({ "customer_id": customer_id, "handoff": "finished" })))
}
