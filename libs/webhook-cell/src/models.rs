use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Whatsapp,
    Asaas,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Whatsapp => write!(f, "whatsapp"),
            EventSource::Asaas => write!(f, "asaas"),
        }
    }
}

/// Ledger row for one gateway event. Persisted before any side effect runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: Uuid,
    pub source: EventSource,
    pub event_id: String,
    pub event_type: String,
    pub payload: Value,
    pub processed: bool,
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: i32,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    Duplicate,
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Interactive,
    Unsupported,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Text => write!(f, "text"),
            MessageKind::Interactive => write!(f, "interactive"),
            MessageKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// One inbound customer message, normalized out of the Cloud API envelope.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message_id: String,
    pub from: String,
    pub from_normalized: String,
    pub contact_name: Option<String>,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub interactive_id: Option<String>,
    pub timestamp: Option<String>,
}

impl InboundMessage {
    /// What the orchestrator should treat as the customer's input: the tapped
    /// option when interactive, the text body otherwise.
    pub fn input(&self) -> &str {
        self.interactive_id
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or_default()
    }
}

// WhatsApp Cloud API envelope (entry/changes/value)

#[derive(Debug, Deserialize)]
pub struct WhatsAppEnvelope {
    #[serde(default)]
    pub entry: Vec<EnvelopeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeEntry {
    #[serde(default)]
    pub changes: Vec<EnvelopeChange>,
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeChange {
    pub value: ChangeValue,
}

#[derive(Debug, Deserialize, Default)]
pub struct ChangeValue {
    #[serde(default)]
    pub contacts: Vec<EnvelopeContact>,
    #[serde(default)]
    pub messages: Vec<EnvelopeMessage>,
    #[serde(default)]
    pub statuses: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeContact {
    #[serde(default)]
    pub profile: Option<ContactProfile>,
    pub wa_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContactProfile {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeMessage {
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<MessageText>,
    #[serde(default)]
    pub interactive: Option<MessageInteractive>,
}

#[derive(Debug, Deserialize)]
pub struct MessageText {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageInteractive {
    #[serde(default)]
    pub button_reply: Option<InteractiveReply>,
    #[serde(default)]
    pub list_reply: Option<InteractiveReply>,
}

#[derive(Debug, Deserialize)]
pub struct InteractiveReply {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Asaas webhook body; everything beyond the event name and payment id rides
/// along as opaque payload.
#[derive(Debug, Deserialize)]
pub struct AsaasWebhookPayload {
    pub event: String,
    pub payment: AsaasPaymentRef,
}

#[derive(Debug, Deserialize)]
pub struct AsaasPaymentRef {
    pub id: String,
}

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Event not found")]
    NotFound,

    #[error("Event already processed")]
    AlreadyProcessed,
}

impl From<shared_database::DbError> for WebhookError {
    fn from(e: shared_database::DbError) -> Self {
        match e {
            shared_database::DbError::NotFound(_) => WebhookError::NotFound,
            other => WebhookError::Database(other.to_string()),
        }
    }
}

impl From<WebhookError> for shared_models::error::AppError {
    fn from(e: WebhookError) -> Self {
        use shared_models::error::AppError;
        match e {
            WebhookError::NotFound => AppError::NotFound(e.to_string()),
            WebhookError::AlreadyProcessed => AppError::BadRequest(e.to_string()),
            WebhookError::Database(msg) => AppError::Database(msg),
        }
    }
}
