use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use customer_cell::models::Customer;
use customer_cell::services::CustomerService;
use messaging_cell::client::MessagingClient;
use scheduling_cell::models::{Appointment, AppointmentStatus};
use shared_config::AppConfig;
use shared_database::audit::{AuditEntry, AuditLog};
use shared_database::supabase::{DbError, SupabaseClient};
use shared_utils::helpers::{format_br_date, format_currency, generate_idempotency_key};

use crate::models::{BillingError, Invoice, InvoiceStatus};
use crate::services::asaas::AsaasClient;

/// Payment due 3 days after the invoice is issued.
const DUE_IN_DAYS: i64 = 3;

pub struct InvoicingService {
    supabase: Arc<SupabaseClient>,
    asaas: AsaasClient,
    customers: CustomerService,
    messaging: MessagingClient,
    audit: AuditLog,
}

impl InvoicingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            asaas: AsaasClient::new(config),
            customers: CustomerService::with_client(supabase.clone()),
            messaging: MessagingClient::new(config),
            audit: AuditLog::new(supabase.clone()),
            supabase,
        }
    }

    pub async fn find_by_asaas_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<Invoice>, BillingError> {
        let path = format!(
            "/rest/v1/invoices?asaas_payment_id=eq.{}&select=*",
            urlencoding::encode(payment_id)
        );
        let rows: Vec<Invoice> = self.supabase.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn find_by_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Invoice>, BillingError> {
        let path = format!(
            "/rest/v1/invoices?appointment_id=eq.{}&select=*",
            appointment_id
        );
        let rows: Vec<Invoice> = self.supabase.select(&path).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn list_by_status(
        &self,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<Invoice>, BillingError> {
        let path = match status {
            Some(s) => format!("/rest/v1/invoices?status=eq.{}&order=created_at.desc", s),
            None => "/rest/v1/invoices?order=created_at.desc".to_string(),
        };
        Ok(self.supabase.select(&path).await?)
    }

    /// Generate the invoice for a completed appointment.
    ///
    /// Idempotent: an existing invoice for the appointment is returned
    /// unchanged, and the insert is backstopped by the unique appointment_id
    /// column when two generators race.
    pub async fn generate_invoice(&self, appointment_id: Uuid) -> Result<Invoice, BillingError> {
        let appointment = self.fetch_appointment(appointment_id).await?;
        if appointment.status != AppointmentStatus::Completed {
            return Err(BillingError::NotCompleted);
        }

        if let Some(existing) = self.find_by_appointment(appointment_id).await? {
            info!(
                "Invoice {} already exists for appointment {}",
                existing.id, appointment_id
            );
            return Ok(existing);
        }

        let customer = self
            .customers
            .find_by_id(appointment.customer_id)
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;
        let asaas_customer_id = self.ensure_provider_customer(&customer).await?;

        let due_date = Utc::now().date_naive() + Duration::days(DUE_IN_DAYS);
        let idempotency_key = generate_idempotency_key("inv");
        let description = format!("Sessão {}", format_br_date(appointment.appointment_date));

        let payment = self
            .asaas
            .create_payment(
                &asaas_customer_id,
                &customer.billing_method.to_string(),
                appointment.price,
                due_date,
                &description,
                &idempotency_key,
            )
            .await?;

        let pix_payload = match customer.billing_method {
            customer_cell::models::BillingMethod::Pix => {
                self.asaas.get_pix_payload(&payment.id).await?
            }
            _ => None,
        };
        let boleto_line = match customer.billing_method {
            customer_cell::models::BillingMethod::Boleto => {
                self.asaas.get_boleto_line(&payment.id).await?
            }
            _ => None,
        };

        let row = json!({
            "appointment_id": appointment.id,
            "asaas_payment_id": payment.id,
            "amount": appointment.price,
            "billing_method": customer.billing_method,
            "status": InvoiceStatus::Pending,
            "invoice_url": payment.invoice_url,
            "pix_payload": pix_payload,
            "boleto_line": boleto_line,
            "due_date": due_date,
            "created_at": Utc::now().to_rfc3339(),
        });

        let invoice: Invoice = match self.supabase.insert("invoices", row).await {
            Ok(i) => i,
            Err(DbError::Conflict(msg)) => {
                // A concurrent generator won; its invoice is the invoice
                warn!(
                    "Invoice insert conflict for appointment {}: {}",
                    appointment_id, msg
                );
                return self
                    .find_by_appointment(appointment_id)
                    .await?
                    .ok_or(BillingError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        // Trail first: the payment_status transition never runs without its
        // audit row
        self.audit
            .record(
                AuditEntry::new("invoice_generated")
                    .customer(customer.id)
                    .appointment(appointment.id)
                    .invoice(invoice.id)
                    .previous(json!({ "payment_status": "unbilled" }))
                    .current(json!(invoice))
                    .idempotency_key(&idempotency_key),
            )
            .await?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&payment_status=eq.unbilled",
            appointment.id
        );
        let updated: Vec<Appointment> = self
            .supabase
            .update(
                &path,
                json!({
                    "payment_status": "invoice_generated",
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;
        if updated.is_empty() {
            warn!(
                "Appointment {} payment_status already moved past unbilled",
                appointment.id
            );
        }

        info!(
            "Generated invoice {} ({}) for appointment {}",
            invoice.id, invoice.asaas_payment_id, appointment.id
        );
        self.notify_invoice(&customer, &invoice).await;
        Ok(invoice)
    }

    async fn fetch_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BillingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&select=*", appointment_id);
        self.supabase
            .select(&path)
            .await?
            .into_iter()
            .next()
            .ok_or(BillingError::NotFound)
    }

    /// Resolve the provider-side customer id, creating the customer only when
    /// a CPF lookup finds nothing.
    async fn ensure_provider_customer(&self, customer: &Customer) -> Result<String, BillingError> {
        if let Some(id) = &customer.asaas_customer_id {
            return Ok(id.clone());
        }

        let cpf = customer.cpf.as_deref().ok_or(BillingError::MissingTaxId)?;

        let provider_customer = match self.asaas.find_customer_by_cpf(cpf).await? {
            Some(existing) => existing,
            None => {
                self.asaas
                    .create_customer(
                        &customer.full_name,
                        cpf,
                        &customer.phone,
                        customer.email.as_deref(),
                    )
                    .await?
            }
        };

        self.customers
            .set_asaas_customer_id(customer.id, &provider_customer.id)
            .await
            .map_err(|e| BillingError::Database(e.to_string()))?;

        Ok(provider_customer.id)
    }

    /// Payment-link notification; the invoice stands even when the message
    /// cannot be delivered.
    async fn notify_invoice(&self, customer: &Customer, invoice: &Invoice) {
        let link = invoice
            .pix_payload
            .as_deref()
            .or(invoice.invoice_url.as_deref())
            .unwrap_or_default();
        let body = format!(
            "💳 *Cobrança Gerada*\n\nValor: {}\n\n🔗 Link para pagamento:\n{}\n\nO pagamento pode ser realizado via PIX, boleto ou cartão de crédito.",
            format_currency(invoice.amount),
            link
        );

        if let Err(e) = self.messaging.send_text(&customer.phone, &body).await {
            warn!(
                "Failed to send invoice notification for {}: {}",
                invoice.id, e
            );
        }
    }
}
