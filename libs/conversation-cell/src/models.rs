use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Flow scratch-pad persisted in `customers.flow_context`. Only the fields a
/// flow needs are populated; the whole thing is cleared when a flow completes
/// or aborts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Slot starts as `HH:MM`, in the order they were listed to the customer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<String>>,
    /// Appointment ids in the order they were listed to the customer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointments: Option<Vec<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_appointment: Option<Uuid>,
}

impl FlowContext {
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        value
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("Customer error: {0}")]
    Customer(#[from] customer_cell::models::CustomerError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] scheduling_cell::models::SchedulingError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] messaging_cell::models::MessagingError),

    #[error("Conversation state lost: {0}")]
    StateLost(String),
}
