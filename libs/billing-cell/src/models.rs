use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use customer_cell::models::BillingMethod;

/// Invoice status mirroring the payment provider's lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Received,
    Confirmed,
    Overdue,
    Refunded,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Received => "received",
            InvoiceStatus::Confirmed => "confirmed",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    /// One invoice per appointment, enforced by a unique column.
    pub appointment_id: Uuid,
    pub asaas_payment_id: String,
    pub amount: f64,
    pub billing_method: BillingMethod,
    pub status: InvoiceStatus,
    pub invoice_url: Option<String>,
    pub pix_payload: Option<String>,
    pub boleto_line: Option<String>,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateInvoiceRequest {
    pub appointment_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceQuery {
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsaasCustomer {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "cpfCnpj", default)]
    pub cpf_cnpj: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AsaasCustomerList {
    #[serde(default)]
    pub data: Vec<AsaasCustomer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AsaasPayment {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "invoiceUrl", default)]
    pub invoice_url: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AsaasPixQrCode {
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AsaasIdentificationField {
    #[serde(rename = "identificationField", default)]
    pub identification_field: Option<String>,
}

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Appointment is not completed")]
    NotCompleted,

    #[error("Customer has no tax id on file")]
    MissingTaxId,

    #[error("Invoice not found")]
    NotFound,

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<shared_database::DbError> for BillingError {
    fn from(e: shared_database::DbError) -> Self {
        match e {
            shared_database::DbError::NotFound(_) => BillingError::NotFound,
            other => BillingError::Database(other.to_string()),
        }
    }
}

impl From<BillingError> for shared_models::error::AppError {
    fn from(e: BillingError) -> Self {
        use shared_models::error::AppError;
        match e {
            BillingError::NotCompleted | BillingError::MissingTaxId => {
                AppError::BadRequest(e.to_string())
            }
            BillingError::NotFound => AppError::NotFound(e.to_string()),
            BillingError::Provider(msg) | BillingError::Messaging(msg) => {
                AppError::ExternalService(msg)
            }
            BillingError::Database(msg) => AppError::Database(msg),
        }
    }
}
