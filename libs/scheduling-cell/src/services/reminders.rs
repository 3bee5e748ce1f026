use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use customer_cell::services::CustomerService;
use messaging_cell::client::MessagingClient;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::helpers::format_br_date;

use crate::models::{Appointment, SchedulingError};

#[derive(Debug, Default, Serialize)]
pub struct ReminderSweepSummary {
    pub sent_24h: usize,
    pub sent_2h: usize,
}

/// Periodic reminder sweep. Each appointment gets at most one 24h and one 2h
/// reminder; the flag is flipped with a conditional update before sending, so
/// overlapping sweeps cannot both send.
pub struct ReminderService {
    supabase: Arc<SupabaseClient>,
    customers: CustomerService,
    messaging: MessagingClient,
}

impl ReminderService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            customers: CustomerService::with_client(supabase.clone()),
            messaging: MessagingClient::new(config),
            supabase,
        }
    }

    pub async fn sweep(&self) -> Result<ReminderSweepSummary, SchedulingError> {
        let mut summary = ReminderSweepSummary::default();

        summary.sent_24h = self
            .sweep_window("reminder_24h_sent", Duration::hours(24))
            .await?;
        summary.sent_2h = self
            .sweep_window("reminder_2h_sent", Duration::hours(2))
            .await?;

        if summary.sent_24h + summary.sent_2h > 0 {
            info!(
                "Reminder sweep sent {} 24h and {} 2h reminders",
                summary.sent_24h, summary.sent_2h
            );
        }

        Ok(summary)
    }

    async fn sweep_window(
        &self,
        flag_column: &str,
        horizon: Duration,
    ) -> Result<usize, SchedulingError> {
        let now = Utc::now();
        let until = now + horizon;

        let path = format!(
            "/rest/v1/appointments?status=in.(scheduled,confirmed)&{}=eq.false&scheduled_start=gte.{}&scheduled_start=lte.{}&select=*",
            flag_column,
            urlencoding::encode(&now.to_rfc3339()),
            urlencoding::encode(&until.to_rfc3339()),
        );
        let due: Vec<Appointment> = self.supabase.select(&path).await?;

        let mut sent = 0;
        for appointment in due {
            match self.remind(&appointment, flag_column).await {
                Ok(true) => sent += 1,
                Ok(false) => {
                    debug!(
                        "Reminder {} for appointment {} already claimed",
                        flag_column, appointment.id
                    );
                }
                Err(e) => {
                    warn!(
                        "Reminder {} for appointment {} failed: {}",
                        flag_column, appointment.id, e
                    );
                }
            }
        }

        Ok(sent)
    }

    /// Claim the flag first; only the sweep that wins the conditional update
    /// sends the message.
    async fn remind(
        &self,
        appointment: &Appointment,
        flag_column: &str,
    ) -> Result<bool, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&{}=eq.false",
            appointment.id, flag_column
        );
        let claimed: Vec<Appointment> = self
            .supabase
            .update(
                &path,
                json!({
                    flag_column: true,
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        if claimed.is_empty() {
            return Ok(false);
        }

        let customer = self
            .customers
            .find_by_id(appointment.customer_id)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let when = format!(
            "{} às {}",
            format_br_date(appointment.appointment_date),
            appointment.start_time.format("%H:%M"),
        );
        let body = if flag_column == "reminder_2h_sent" {
            format!(
                "⏰ Lembrete: sua sessão é hoje, {}. Até já!",
                when
            )
        } else {
            format!(
                "📅 Lembrete: você tem uma sessão agendada para {}. Se precisar remarcar, envie MENU.",
                when
            )
        };

        self.messaging
            .send_text(&customer.phone, &body)
            .await
            .map_err(|e| SchedulingError::Messaging(e.to_string()))?;

        Ok(true)
    }
}
