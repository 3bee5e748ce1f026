use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Per-customer conversation position. `main_menu` is the steady state every
/// flow returns to; there is no terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    New,
    CollectingName,
    CollectingTaxId,
    CollectingEmail,
    MainMenu,
    BookingAwaitingDate,
    BookingAwaitingSlotChoice,
    RescheduleChoosingAppointment,
    RescheduleAwaitingDate,
    RescheduleAwaitingSlotChoice,
    CancelChoosingAppointment,
    CancelAwaitingConfirmation,
    InHumanHandoff,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationState::New => "new",
            ConversationState::CollectingName => "collecting_name",
            ConversationState::CollectingTaxId => "collecting_tax_id",
            ConversationState::CollectingEmail => "collecting_email",
            ConversationState::MainMenu => "main_menu",
            ConversationState::BookingAwaitingDate => "booking_awaiting_date",
            ConversationState::BookingAwaitingSlotChoice => "booking_awaiting_slot_choice",
            ConversationState::RescheduleChoosingAppointment => "reschedule_choosing_appointment",
            ConversationState::RescheduleAwaitingDate => "reschedule_awaiting_date",
            ConversationState::RescheduleAwaitingSlotChoice => "reschedule_awaiting_slot_choice",
            ConversationState::CancelChoosingAppointment => "cancel_choosing_appointment",
            ConversationState::CancelAwaitingConfirmation => "cancel_awaiting_confirmation",
            ConversationState::InHumanHandoff => "in_human_handoff",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMethod {
    Pix,
    Boleto,
    CreditCard,
}

impl fmt::Display for BillingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingMethod::Pix => write!(f, "PIX"),
            BillingMethod::Boleto => write!(f, "BOLETO"),
            BillingMethod::CreditCard => write!(f, "CREDIT_CARD"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    /// Normalized phone (5511999999999); the customer's identity.
    pub phone: String,
    pub full_name: String,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub asaas_customer_id: Option<String>,
    pub conversation_state: ConversationState,
    /// Flow scratch-pad; cleared whenever a flow completes or aborts.
    #[serde(default)]
    pub flow_context: Option<Value>,
    pub billing_method: BillingMethod,
    pub session_price: Option<f64>,
    pub registration_complete: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub full_name: Option<String>,
    pub cpf: Option<String>,
    pub email: Option<String>,
    pub billing_method: Option<BillingMethod>,
    pub session_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerSearchQuery {
    pub phone: Option<String>,
    pub active: Option<bool>,
}

#[derive(Error, Debug)]
pub enum CustomerError {
    #[error("Customer not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<shared_database::DbError> for CustomerError {
    fn from(e: shared_database::DbError) -> Self {
        match e {
            shared_database::DbError::NotFound(_) => CustomerError::NotFound,
            other => CustomerError::Database(other.to_string()),
        }
    }
}
