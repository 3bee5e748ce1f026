use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    /// Terminal states are frozen; no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::NoShow
                | AppointmentStatus::Rescheduled
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Rescheduled => "rescheduled",
        };
        write!(f, "{}", s)
    }
}

/// Billing position of an appointment. Leaves `unbilled` only once the
/// appointment itself is completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unbilled,
    InvoiceGenerated,
    Paid,
    Overdue,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Unbilled => "unbilled",
            PaymentStatus::InvoiceGenerated => "invoice_generated",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    /// Unique in storage; doubles as the booking backstop against
    /// two inserts for the same calendar event.
    pub calendar_event_id: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub reminder_24h_sent: bool,
    #[serde(default)]
    pub reminder_2h_sent: bool,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: Uuid,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: i64,
    pub gap_minutes: i64,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: i64,
    pub gap_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRuleRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub slot_minutes: Option<i64>,
    pub gap_minutes: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub customer_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// A half-open busy window `[start, end)` taken from the calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct BusyWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("Slot is no longer available")]
    SlotTaken,

    #[error("Completed appointments cannot be cancelled")]
    CannotCancelCompleted,

    #[error("Appointment is in a terminal state")]
    Terminal,

    #[error("Rule overlaps an existing active rule on the same weekday")]
    RuleOverlap,

    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid time range: {0}")]
    InvalidTime(String),

    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<shared_database::DbError> for SchedulingError {
    fn from(e: shared_database::DbError) -> Self {
        match e {
            shared_database::DbError::NotFound(_) => SchedulingError::NotFound,
            shared_database::DbError::Conflict(_) => SchedulingError::SlotTaken,
            other => SchedulingError::Database(other.to_string()),
        }
    }
}

impl From<SchedulingError> for shared_models::error::AppError {
    fn from(e: SchedulingError) -> Self {
        use shared_models::error::AppError;
        match e {
            SchedulingError::SlotTaken => AppError::Conflict(e.to_string()),
            SchedulingError::RuleOverlap => AppError::Conflict(e.to_string()),
            SchedulingError::CannotCancelCompleted | SchedulingError::Terminal => {
                AppError::BadRequest(e.to_string())
            }
            SchedulingError::NotFound => AppError::NotFound(e.to_string()),
            SchedulingError::InvalidTime(msg) => AppError::ValidationError(msg),
            SchedulingError::Calendar(msg) | SchedulingError::Messaging(msg) => {
                AppError::ExternalService(msg)
            }
            SchedulingError::Database(msg) => AppError::Database(msg),
        }
    }
}
