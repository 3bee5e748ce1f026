use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use billing_cell::services::reconcile::ReconcileService;
use conversation_cell::services::Orchestrator;
use messaging_cell::client::MessagingClient;
use shared_config::AppConfig;
use shared_utils::helpers::normalize_phone;

use crate::models::{
    EventSource, InboundMessage, MessageKind, WhatsAppEnvelope,
};
use crate::services::ledger::EventLedger;

/// Messages and the status-update count extracted from one Cloud API
/// envelope. Contact display names are joined in from the contacts block.
pub fn extract_messages(envelope: &WhatsAppEnvelope) -> (Vec<InboundMessage>, usize) {
    let mut messages = Vec::new();
    let mut status_updates = 0;

    for entry in &envelope.entry {
        for change in &entry.changes {
            status_updates += change.value.statuses.len();

            for raw in &change.value.messages {
                let contact_name = change
                    .value
                    .contacts
                    .iter()
                    .find(|c| c.wa_id.as_deref() == Some(raw.from.as_str()))
                    .or(change.value.contacts.first())
                    .and_then(|c| c.profile.as_ref())
                    .and_then(|p| p.name.clone());

                let (kind, text, interactive_id) = match raw.kind.as_deref() {
                    Some("text") => (
                        MessageKind::Text,
                        raw.text.as_ref().map(|t| t.body.clone()),
                        None,
                    ),
                    Some("interactive") => {
                        let reply = raw.interactive.as_ref().and_then(|i| {
                            i.button_reply.as_ref().or(i.list_reply.as_ref())
                        });
                        (
                            MessageKind::Interactive,
                            reply.and_then(|r| r.title.clone()),
                            reply.map(|r| r.id.clone()),
                        )
                    }
                    _ => (MessageKind::Unsupported, None, None),
                };

                messages.push(InboundMessage {
                    message_id: raw.id.clone(),
                    from: raw.from.clone(),
                    from_normalized: normalize_phone(&raw.from),
                    contact_name,
                    kind,
                    text,
                    interactive_id,
                    timestamp: raw.timestamp.clone(),
                });
            }
        }
    }

    (messages, status_updates)
}

/// Out-of-band processing of one accepted WhatsApp message. The ledger row is
/// flipped to processed only when the orchestrator fully succeeded.
pub async fn process_message(
    config: Arc<AppConfig>,
    ledger: Arc<EventLedger>,
    message: InboundMessage,
) {
    let messaging = MessagingClient::new(&config);
    if let Err(e) = messaging.mark_read(&message.message_id).await {
        debug!("mark_read failed for {}: {}", message.message_id, e);
    }

    let orchestrator = Orchestrator::new(config);
    match orchestrator
        .handle_inbound(
            &message.from_normalized,
            message.contact_name.as_deref(),
            message.input(),
        )
        .await
    {
        Ok(()) => {
            if let Err(e) = ledger
                .mark_processed(EventSource::Whatsapp, &message.message_id)
                .await
            {
                warn!(
                    "Message {} handled but ledger update failed: {}",
                    message.message_id, e
                );
            }
        }
        Err(e) => {
            warn!("Message {} failed: {}", message.message_id, e);
            ledger
                .mark_failed(EventSource::Whatsapp, &message.message_id, &e.to_string())
                .await;
        }
    }
}

/// Out-of-band processing of one accepted payment event.
pub async fn process_payment_event(
    config: Arc<AppConfig>,
    ledger: Arc<EventLedger>,
    event_id: String,
    event_type: String,
    payment_id: String,
    payload: Value,
) {
    let reconcile = ReconcileService::new(&config);
    match reconcile
        .handle_payment_event(&event_type, &payment_id, &payload)
        .await
    {
        Ok(()) => {
            if let Err(e) = ledger.mark_processed(EventSource::Asaas, &event_id).await {
                warn!(
                    "Payment event {} handled but ledger update failed: {}",
                    event_id, e
                );
            }
        }
        Err(e) => {
            warn!("Payment event {} failed: {}", event_id, e);
            ledger
                .mark_failed(EventSource::Asaas, &event_id, &e.to_string())
                .await;
        }
    }
    info!("Payment event {} processed", event_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> WhatsAppEnvelope {
        serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [{ "id": "entry-1", "changes": [{ "field": "messages", "value": value }] }]
        }))
        .unwrap()
    }

    #[test]
    fn extracts_text_message_with_contact_name() {
        let envelope = envelope(json!({
            "contacts": [{ "profile": { "name": "Maria" }, "wa_id": "5511999999999" }],
            "messages": [{
                "id": "wamid.1",
                "from": "5511999999999",
                "timestamp": "1737285600",
                "type": "text",
                "text": { "body": "MENU" }
            }]
        }));

        let (messages, statuses) = extract_messages(&envelope);
        assert_eq!(statuses, 0);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, MessageKind::Text);
        assert_eq!(messages[0].input(), "MENU");
        assert_eq!(messages[0].contact_name.as_deref(), Some("Maria"));
    }

    #[test]
    fn interactive_reply_prefers_its_id_as_input() {
        let envelope = envelope(json!({
            "messages": [{
                "id": "wamid.2",
                "from": "5511999999999",
                "type": "interactive",
                "interactive": {
                    "type": "button_reply",
                    "button_reply": { "id": "1", "title": "Agendar sessão" }
                }
            }]
        }));

        let (messages, _) = extract_messages(&envelope);
        assert_eq!(messages[0].kind, MessageKind::Interactive);
        assert_eq!(messages[0].input(), "1");
    }

    #[test]
    fn status_only_envelope_yields_no_messages() {
        let envelope = envelope(json!({
            "statuses": [{ "id": "wamid.3", "status": "delivered" }]
        }));

        let (messages, statuses) = extract_messages(&envelope);
        assert!(messages.is_empty());
        assert_eq!(statuses, 1);
    }

    #[test]
    fn unsupported_message_types_are_flagged() {
        let envelope = envelope(json!({
            "messages": [{
                "id": "wamid.4",
                "from": "5511999999999",
                "type": "audio"
            }]
        }));

        let (messages, _) = extract_messages(&envelope);
        assert_eq!(messages[0].kind, MessageKind::Unsupported);
        assert_eq!(messages[0].input(), "");
    }
}
