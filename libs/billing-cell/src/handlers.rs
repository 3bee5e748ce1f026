use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::info;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::Operator;
use shared_models::error::AppError;

use crate::models::{GenerateInvoiceRequest, InvoiceQuery};
use crate::services::invoicing::InvoicingService;
use crate::services::sweep::BillingSweep;

#[axum::debug_handler]
pub async fn generate_invoice(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<GenerateInvoiceRequest>,
) -> Result<Json<Value>, AppError> {
    let service = InvoicingService::new(&config);

    let invoice = service.generate_invoice(request.appointment_id).await?;
    Ok(Json(json!(invoice)))
}

#[axum::debug_handler]
pub async fn trigger_sweep(
    State(config): State<Arc<AppConfig>>,
    Extension(operator): Extension<Operator>,
) -> Result<Json<Value>, AppError> {
    info!("Billing sweep triggered by {}", operator.id);
    let sweep = BillingSweep::new(&config);

    let summary = sweep.run().await?;
    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn list_invoices(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Value>, AppError> {
    let service = InvoicingService::new(&config);

    let invoices = service.list_by_status(query.status).await?;
    Ok(Json(json!({ "invoices": invoices, "total": invoices.len() })))
}

#[axum::debug_handler]
pub async fn list_audit_log(
    State(config): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let supabase = SupabaseClient::new(&config);

    let entries: Vec<Value> = supabase
        .select("/rest/v1/audit_log?order=created_at.desc&limit=100")
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(Json(json!({ "entries": entries, "total": entries.len() })))
}
