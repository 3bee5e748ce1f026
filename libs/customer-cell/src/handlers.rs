use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{CustomerError, CustomerSearchQuery, UpdateCustomerRequest};
use crate::services::CustomerService;

impl From<CustomerError> for AppError {
    fn from(e: CustomerError) -> Self {
        match e {
            CustomerError::NotFound => AppError::NotFound("customer not found".to_string()),
            CustomerError::Validation(msg) => AppError::ValidationError(msg),
            CustomerError::Database(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn get_customer(
    State(config): State<Arc<AppConfig>>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = CustomerService::new(&config);

    let customer = service.find_by_id(customer_id).await?;
    Ok(Json(json!(customer)))
}

#[axum::debug_handler]
pub async fn search_customers(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<CustomerSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let service = CustomerService::new(&config);

    if let Some(phone) = query.phone {
        let customer = service.find_by_phone(&phone).await?;
        let customers: Vec<_> = customer.into_iter().collect();
        return Ok(Json(json!({
            "customers": customers,
            "total": customers.len()
        })));
    }

    let customers = service.list(query.active.unwrap_or(true)).await?;
    Ok(Json(json!({
        "customers": customers,
        "total": customers.len()
    })))
}

#[axum::debug_handler]
pub async fn update_customer(
    State(config): State<Arc<AppConfig>>,
    Path(customer_id): Path<Uuid>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<Json<Value>, AppError> {
    let service = CustomerService::new(&config);

    let customer = service.update_customer(customer_id, request).await?;
    Ok(Json(json!(customer)))
}

#[axum::debug_handler]
pub async fn deactivate_customer(
    State(config): State<Arc<AppConfig>>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = CustomerService::new(&config);

    let customer = service.deactivate(customer_id).await?;
    Ok(Json(json!(customer)))
}
