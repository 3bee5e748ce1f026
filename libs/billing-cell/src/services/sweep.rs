use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use scheduling_cell::models::Appointment;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::BillingError;
use crate::services::invoicing::InvoicingService;

#[derive(Debug, Default, Serialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub generated: usize,
    pub failed: usize,
}

/// Periodic billing sweep: every completed, still-unbilled appointment gets
/// an invoice. One bad appointment never stops the rest.
pub struct BillingSweep {
    supabase: Arc<SupabaseClient>,
    invoicing: InvoicingService,
}

impl BillingSweep {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            invoicing: InvoicingService::new(config),
        }
    }

    pub async fn run(&self) -> Result<SweepSummary, BillingError> {
        let due: Vec<Appointment> = self
            .supabase
            .select("/rest/v1/appointments?status=eq.completed&payment_status=eq.unbilled&select=*")
            .await?;

        let mut summary = SweepSummary {
            examined: due.len(),
            ..Default::default()
        };

        for appointment in due {
            match self.invoicing.generate_invoice(appointment.id).await {
                Ok(invoice) => {
                    summary.generated += 1;
                    info!(
                        "Sweep generated invoice {} for appointment {}",
                        invoice.id, appointment.id
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        "Sweep failed to bill appointment {}: {}",
                        appointment.id, e
                    );
                }
            }
        }

        if summary.examined > 0 {
            info!(
                "Billing sweep: {} examined, {} generated, {} failed",
                summary.examined, summary.generated, summary.failed
            );
        }

        Ok(summary)
    }
}
