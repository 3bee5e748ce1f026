use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use customer_cell::services::CustomerService;
use shared_config::AppConfig;
use shared_models::auth::Operator;
use shared_models::error::AppError;

use crate::models::{
    BookRequest, CancelRequest, CreateRuleRequest, RescheduleRequest, SlotQuery, UpdateRuleRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::booking::BookingService;
use crate::services::calendar::CalendarClient;
use crate::services::reminders::ReminderService;

#[axum::debug_handler]
pub async fn list_rules(State(config): State<Arc<AppConfig>>) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&config);

    let rules = service.list_rules().await?;
    Ok(Json(json!({ "rules": rules, "total": rules.len() })))
}

#[axum::debug_handler]
pub async fn create_rule(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&config);

    let rule = service.create_rule(request).await?;
    Ok(Json(json!(rule)))
}

#[axum::debug_handler]
pub async fn update_rule(
    State(config): State<Arc<AppConfig>>,
    Path(rule_id): Path<Uuid>,
    Json(request): Json<UpdateRuleRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&config);

    let rule = service.update_rule(rule_id, request).await?;
    Ok(Json(json!(rule)))
}

#[axum::debug_handler]
pub async fn available_slots(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&config);
    let calendar = CalendarClient::new(&config);

    let slots = service.available_slots(&calendar, query.date).await?;
    let formatted: Vec<String> = slots.iter().map(|s| s.format("%H:%M").to_string()).collect();
    Ok(Json(json!({ "date": query.date, "slots": formatted })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<BookRequest>,
) -> Result<Json<Value>, AppError> {
    let customers = CustomerService::new(&config);
    let service = BookingService::new(&config);

    let customer = customers.find_by_id(request.customer_id).await?;
    let appointment = service
        .book(
            &customer,
            request.date,
            request.time,
            config.default_session_price,
        )
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config);

    let appointment = service.find_by_id(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[derive(Debug, serde::Deserialize)]
pub struct AppointmentQuery {
    pub customer_id: Uuid,
}

#[axum::debug_handler]
pub async fn list_upcoming(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config);

    let appointments = service.upcoming_for_customer(query.customer_id).await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let customers = CustomerService::new(&config);
    let service = BookingService::new(&config);

    let current = service.find_by_id(appointment_id).await?;
    let customer = customers.find_by_id(current.customer_id).await?;
    let appointment = service
        .reschedule(appointment_id, &customer, request.date, request.time)
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config);

    let appointment = service.cancel(appointment_id, request.reason).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config);

    let appointment = service.complete(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(config): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&config);

    let appointment = service.mark_no_show(appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn trigger_reminder_sweep(
    State(config): State<Arc<AppConfig>>,
    Extension(operator): Extension<Operator>,
) -> Result<Json<Value>, AppError> {
    info!("Reminder sweep triggered by {}", operator.id);
    let service = ReminderService::new(&config);

    let summary = service.sweep().await?;
    Ok(Json(json!(summary)))
}
