use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use customer_cell::services::CustomerService;
use messaging_cell::client::MessagingClient;
use scheduling_cell::models::Appointment;
use shared_config::AppConfig;
use shared_database::audit::{AuditEntry, AuditLog};
use shared_database::supabase::SupabaseClient;
use shared_utils::helpers::format_currency;

use crate::models::{BillingError, Invoice, InvoiceStatus};
use crate::services::invoicing::InvoicingService;

/// Target state for a payment event, or None when the event is unknown.
fn event_target(event_type: &str) -> Option<InvoiceStatus> {
    match event_type {
        "PAYMENT_RECEIVED" => Some(InvoiceStatus::Received),
        "PAYMENT_CONFIRMED" => Some(InvoiceStatus::Confirmed),
        "PAYMENT_OVERDUE" => Some(InvoiceStatus::Overdue),
        "PAYMENT_DELETED" | "PAYMENT_REFUNDED" => Some(InvoiceStatus::Refunded),
        _ => None,
    }
}

/// Status lattice for webhook-driven transitions. Events arrive out of order
/// and may be replayed; a transition that would walk back a settled invoice
/// is dropped.
pub fn next_invoice_status(current: InvoiceStatus, target: InvoiceStatus) -> Option<InvoiceStatus> {
    use InvoiceStatus::*;

    if current == target {
        return None;
    }

    match (current, target) {
        // Refunds are final
        (Refunded, _) => None,
        // A confirmed payment only moves on to a refund
        (Confirmed, Refunded) => Some(Refunded),
        (Confirmed, _) => None,
        // Received money does not become overdue
        (Received, Overdue) => None,
        (Received, next) => Some(next),
        (Pending | Overdue, next) => Some(next),
    }
}

fn payment_status_for(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Received | InvoiceStatus::Confirmed => "paid",
        InvoiceStatus::Overdue => "overdue",
        InvoiceStatus::Refunded => "refunded",
        InvoiceStatus::Pending => "invoice_generated",
    }
}

/// Applies provider payment events to invoices and appointments.
///
/// Never creates domain records: an event for an unknown payment id is
/// accepted and ignored.
pub struct ReconcileService {
    supabase: Arc<SupabaseClient>,
    invoicing: InvoicingService,
    customers: CustomerService,
    messaging: MessagingClient,
    audit: AuditLog,
}

impl ReconcileService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            invoicing: InvoicingService::new(config),
            customers: CustomerService::with_client(supabase.clone()),
            messaging: MessagingClient::new(config),
            audit: AuditLog::new(supabase.clone()),
            supabase,
        }
    }

    pub async fn handle_payment_event(
        &self,
        event_type: &str,
        payment_id: &str,
        payload: &Value,
    ) -> Result<(), BillingError> {
        let Some(target) = event_target(event_type) else {
            info!("Ignoring unhandled payment event {}", event_type);
            return Ok(());
        };

        let Some(invoice) = self.invoicing.find_by_asaas_payment_id(payment_id).await? else {
            info!(
                "Payment event {} references unknown payment {}, ignoring",
                event_type, payment_id
            );
            return Ok(());
        };

        let Some(next) = next_invoice_status(invoice.status, target) else {
            info!(
                "Dropping payment event {} for invoice {}: {} does not follow {}",
                event_type, invoice.id, target, invoice.status
            );
            return Ok(());
        };

        let now = Utc::now().to_rfc3339();
        let mut body = json!({ "status": next });
        match next {
            InvoiceStatus::Received => body["paid_at"] = json!(now),
            InvoiceStatus::Confirmed => {
                body["confirmed_at"] = json!(now);
                if invoice.paid_at.is_none() {
                    body["paid_at"] = json!(now);
                }
            }
            _ => {}
        }

        // Trail first: no transition without its audit row
        self.audit
            .record(
                AuditEntry::new("payment_event_applied")
                    .appointment(invoice.appointment_id)
                    .invoice(invoice.id)
                    .idempotency_key(&format!("{}_{}", event_type, payment_id))
                    .previous(json!({ "status": invoice.status }))
                    .current(json!({ "status": next, "event": event_type, "payload": payload })),
            )
            .await?;

        // Conditional on the status we read, so two reconcilers replaying the
        // same event settle on one transition
        let path = format!(
            "/rest/v1/invoices?id=eq.{}&status=eq.{}",
            invoice.id, invoice.status
        );
        let updated: Vec<Invoice> = self.supabase.update(&path, body).await?;
        let Some(updated) = updated.into_iter().next() else {
            info!(
                "Invoice {} moved concurrently, dropping event {}",
                invoice.id, event_type
            );
            return Ok(());
        };

        let appointment_path = format!(
            "/rest/v1/appointments?id=eq.{}",
            updated.appointment_id
        );
        let _: Vec<Appointment> = self
            .supabase
            .update(
                &appointment_path,
                json!({
                    "payment_status": payment_status_for(next),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        info!(
            "Invoice {} moved {} -> {} on {}",
            updated.id, invoice.status, next, event_type
        );

        if matches!(next, InvoiceStatus::Received | InvoiceStatus::Confirmed)
            && invoice.paid_at.is_none()
        {
            self.notify_payment(&updated).await;
        }

        Ok(())
    }

    async fn notify_payment(&self, invoice: &Invoice) {
        let appointment: Option<Appointment> = self
            .supabase
            .select(&format!(
                "/rest/v1/appointments?id=eq.{}&select=*",
                invoice.appointment_id
            ))
            .await
            .ok()
            .and_then(|rows: Vec<Appointment>| rows.into_iter().next());

        let Some(appointment) = appointment else {
            return;
        };
        let Ok(customer) = self.customers.find_by_id(appointment.customer_id).await else {
            return;
        };

        let body = format!(
            "✅ *Pagamento Confirmado!*\n\nRecebemos seu pagamento de {}.\n\nObrigado! 🙏",
            format_currency(invoice.amount)
        );
        if let Err(e) = self.messaging.send_text(&customer.phone, &body).await {
            warn!(
                "Failed to send payment confirmation for invoice {}: {}",
                invoice.id, e
            );
        }
    }
}
