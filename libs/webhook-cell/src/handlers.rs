use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    AsaasWebhookPayload, EventSource, IngestOutcome, MessageKind, WebhookError, WhatsAppEnvelope,
};
use crate::services::ledger::EventLedger;
use crate::services::webhook::{extract_messages, process_message, process_payment_event};

/// Shared webhook state. The ledger lives for the process so its in-memory
/// dedup cache survives across requests.
#[derive(Clone)]
pub struct WebhookState {
    pub config: Arc<AppConfig>,
    pub ledger: Arc<EventLedger>,
}

impl WebhookState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let ledger = Arc::new(EventLedger::new(&config));
        Self { config, ledger }
    }
}

/// Cloud API subscription handshake: echo the challenge when the verify
/// token matches.
#[axum::debug_handler]
pub async fn verify_whatsapp(
    State(state): State<WebhookState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, AppError> {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge");

    if mode == Some("subscribe") && token == Some(state.config.whatsapp_verify_token.as_str()) {
        if let Some(challenge) = challenge {
            return Ok(challenge.clone());
        }
    }

    warn!("WhatsApp webhook verification rejected");
    Err(AppError::Auth("verification failed".to_string()))
}

/// Inbound WhatsApp traffic. Every message is written to the ledger before
/// anything else happens; dispatch runs out-of-band so the gateway gets its
/// 200 immediately.
#[axum::debug_handler]
pub async fn receive_whatsapp(
    State(state): State<WebhookState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let envelope: WhatsAppEnvelope = match serde_json::from_value(body.clone()) {
        Ok(e) => e,
        Err(e) => {
            warn!("Unparseable WhatsApp envelope: {}", e);
            return Ok(Json(json!({ "rejected": e.to_string() })));
        }
    };

    let (messages, status_updates) = extract_messages(&envelope);
    if status_updates > 0 {
        debug!("Envelope carried {} status updates", status_updates);
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for message in messages {
        let outcome = state
            .ledger
            .begin(
                EventSource::Whatsapp,
                &message.message_id,
                &message.kind.to_string(),
                &body,
            )
            .await
            .map_err(AppError::from)?;

        match outcome {
            IngestOutcome::Accepted => {
                accepted += 1;
                if message.kind == MessageKind::Unsupported {
                    info!(
                        "Unsupported message type from {}, acknowledged without dispatch",
                        message.from_normalized
                    );
                    if let Err(e) = state
                        .ledger
                        .mark_processed(EventSource::Whatsapp, &message.message_id)
                        .await
                    {
                        warn!("Ledger update failed for unsupported message: {}", e);
                    }
                    continue;
                }

                tokio::spawn(process_message(
                    state.config.clone(),
                    state.ledger.clone(),
                    message,
                ));
            }
            IngestOutcome::Duplicate => {
                duplicates += 1;
                debug!("Duplicate message {}", message.message_id);
            }
            IngestOutcome::Rejected(reason) => {
                warn!("Rejected message {}: {}", message.message_id, reason);
            }
        }
    }

    Ok(Json(json!({
        "accepted": accepted,
        "duplicates": duplicates,
        "status_updates": status_updates,
    })))
}

/// Inbound payment events. Authenticated by the provider's webhook token
/// header; dispatched to reconciliation out-of-band.
#[axum::debug_handler]
pub async fn receive_asaas(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let token = headers
        .get("asaas-access-token")
        .and_then(|v| v.to_str().ok());
    if token != Some(state.config.asaas_webhook_token.as_str()) {
        warn!("Asaas webhook with missing or wrong access token");
        return Err(AppError::Auth("invalid webhook token".to_string()));
    }

    let payload: AsaasWebhookPayload = match serde_json::from_value(body.clone()) {
        Ok(p) => p,
        Err(e) => {
            warn!("Unparseable Asaas webhook: {}", e);
            return Ok(Json(json!({ "rejected": e.to_string() })));
        }
    };

    let event_id = format!("{}_{}", payload.event, payload.payment.id);
    let outcome = state
        .ledger
        .begin(EventSource::Asaas, &event_id, &payload.event, &body)
        .await
        .map_err(AppError::from)?;

    match outcome {
        IngestOutcome::Accepted => {
            tokio::spawn(process_payment_event(
                state.config.clone(),
                state.ledger.clone(),
                event_id,
                payload.event,
                payload.payment.id,
                body,
            ));
            Ok(Json(json!({ "accepted": true })))
        }
        IngestOutcome::Duplicate => {
            debug!("Duplicate payment event {}", event_id);
            Ok(Json(json!({ "duplicate": true })))
        }
        IngestOutcome::Rejected(reason) => Ok(Json(json!({ "rejected": reason }))),
    }
}

/// Re-run the dispatch for an unprocessed ledger row, synchronously.
#[axum::debug_handler]
pub async fn replay_event(
    State(state): State<WebhookState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let event = state.ledger.find(event_id).await.map_err(AppError::from)?;
    if event.processed {
        return Err(WebhookError::AlreadyProcessed.into());
    }

    info!(
        "Replaying event {} ({} {})",
        event.id, event.source, event.event_type
    );
    match event.source {
        EventSource::Whatsapp => {
            let envelope: WhatsAppEnvelope = serde_json::from_value(event.payload.clone())
                .map_err(|e| AppError::Internal(format!("stored payload unparseable: {}", e)))?;
            let (messages, _) = extract_messages(&envelope);
            let message = messages
                .into_iter()
                .find(|m| m.message_id == event.event_id)
                .ok_or_else(|| {
                    AppError::Internal("event message missing from stored payload".to_string())
                })?;

            process_message(state.config.clone(), state.ledger.clone(), message).await;
        }
        EventSource::Asaas => {
            let payload: AsaasWebhookPayload = serde_json::from_value(event.payload.clone())
                .map_err(|e| AppError::Internal(format!("stored payload unparseable: {}", e)))?;

            process_payment_event(
                state.config.clone(),
                state.ledger.clone(),
                event.event_id.clone(),
                payload.event,
                payload.payment.id,
                event.payload.clone(),
            )
            .await;
        }
    }

    let after = state.ledger.find(event_id).await.map_err(AppError::from)?;
    Ok(Json(json!({
        "event_id": event_id,
        "processed": after.processed,
        "error_message": after.error_message,
    })))
}
