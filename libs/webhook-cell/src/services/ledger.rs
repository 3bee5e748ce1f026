use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};

use crate::models::{EventSource, InboundEvent, IngestOutcome, WebhookError};

/// Idempotency ledger over the `inbound_events` table.
///
/// A process-local set of *processed* `(source, event_id)` keys fronts the
/// table as a fast path for redeliveries hitting the same instance; the
/// table's unique index is the authority. Unprocessed keys never enter the
/// cache, so a redelivery after a failed dispatch flows through again.
pub struct EventLedger {
    supabase: Arc<SupabaseClient>,
    seen: Mutex<HashSet<String>>,
}

/// Redeliveries of an unprocessed event stop being accepted once this many
/// dispatch attempts have failed; recovery past that point is the admin
/// replay endpoint.
const MAX_DELIVERY_ATTEMPTS: i32 = 5;

fn cache_key(source: EventSource, event_id: &str) -> String {
    format!("{}:{}", source, event_id)
}

impl EventLedger {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Record an event before its side effects run.
    ///
    /// The row lands with `processed=false`. A unique violation on
    /// `(source, event_id)` means the event was already delivered, but only
    /// a row with `processed=true` short-circuits as a duplicate; an
    /// unprocessed row is a failed earlier attempt and the redelivery is
    /// accepted again with its `retry_count` bumped.
    pub async fn begin(
        &self,
        source: EventSource,
        event_id: &str,
        event_type: &str,
        payload: &Value,
    ) -> Result<IngestOutcome, WebhookError> {
        if event_id.is_empty() {
            return Ok(IngestOutcome::Rejected("empty event id".to_string()));
        }

        let key = cache_key(source, event_id);
        {
            let seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            if seen.contains(&key) {
                debug!("Event {} already seen in this process", key);
                return Ok(IngestOutcome::Duplicate);
            }
        }

        let row = json!({
            "source": source,
            "event_id": event_id,
            "event_type": event_type,
            "payload": payload,
            "processed": false,
            "retry_count": 0,
            "received_at": Utc::now().to_rfc3339(),
        });

        match self.supabase.insert::<InboundEvent>("inbound_events", row).await {
            Ok(_) => Ok(IngestOutcome::Accepted),
            Err(DbError::Conflict(_)) => self.begin_redelivery(source, event_id).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn begin_redelivery(
        &self,
        source: EventSource,
        event_id: &str,
    ) -> Result<IngestOutcome, WebhookError> {
        let path = format!(
            "/rest/v1/inbound_events?source=eq.{}&event_id=eq.{}&select=*",
            source,
            urlencoding::encode(event_id)
        );
        let existing: Option<InboundEvent> =
            self.supabase.select(&path).await?.into_iter().next();

        let Some(existing) = existing else {
            // Row gone between the conflicting insert and this read; treat
            // the delivery as fresh.
            return Ok(IngestOutcome::Accepted);
        };

        if existing.processed {
            debug!("Event {}:{} already processed", source, event_id);
            let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            seen.insert(cache_key(source, event_id));
            return Ok(IngestOutcome::Duplicate);
        }

        if existing.retry_count >= MAX_DELIVERY_ATTEMPTS {
            warn!(
                "Event {}:{} exhausted its {} delivery attempts",
                source, event_id, MAX_DELIVERY_ATTEMPTS
            );
            return Ok(IngestOutcome::Duplicate);
        }

        info!(
            "Accepting redelivery of unprocessed event {}:{} (attempt {})",
            source,
            event_id,
            existing.retry_count + 1
        );
        let update_path = format!(
            "/rest/v1/inbound_events?source=eq.{}&event_id=eq.{}",
            source,
            urlencoding::encode(event_id)
        );
        let _: Vec<InboundEvent> = self
            .supabase
            .update(
                &update_path,
                json!({ "retry_count": existing.retry_count + 1 }),
            )
            .await?;
        Ok(IngestOutcome::Accepted)
    }

    /// Flip the row to processed. Called only after the dispatched command
    /// fully succeeded; this is also the only point that feeds the dedup
    /// cache.
    pub async fn mark_processed(
        &self,
        source: EventSource,
        event_id: &str,
    ) -> Result<(), WebhookError> {
        let path = format!(
            "/rest/v1/inbound_events?source=eq.{}&event_id=eq.{}",
            source,
            urlencoding::encode(event_id)
        );
        let _: Vec<InboundEvent> = self
            .supabase
            .update(
                &path,
                json!({
                    "processed": true,
                    "error_message": null,
                    "processed_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(cache_key(source, event_id));
        Ok(())
    }

    /// Record a failure so the event can be retried on the next delivery.
    pub async fn mark_failed(&self, source: EventSource, event_id: &str, error: &str) {
        let path = format!(
            "/rest/v1/inbound_events?source=eq.{}&event_id=eq.{}&select=retry_count",
            source,
            urlencoding::encode(event_id)
        );
        let retry_count = match self.supabase.select::<Value>(&path).await {
            Ok(rows) => rows
                .first()
                .and_then(|r| r.get("retry_count"))
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            Err(e) => {
                warn!("Could not read retry_count for {}: {}", event_id, e);
                0
            }
        };

        let update_path = format!(
            "/rest/v1/inbound_events?source=eq.{}&event_id=eq.{}",
            source,
            urlencoding::encode(event_id)
        );
        let result: Result<Vec<InboundEvent>, _> = self
            .supabase
            .update(
                &update_path,
                json!({
                    "error_message": error,
                    "retry_count": retry_count + 1,
                }),
            )
            .await;
        if let Err(e) = result {
            warn!("Failed to record ledger failure for {}: {}", event_id, e);
        }
    }

    pub async fn find(&self, id: Uuid) -> Result<InboundEvent, WebhookError> {
        let path = format!("/rest/v1/inbound_events?id=eq.{}&select=*", id);
        self.supabase
            .select(&path)
            .await?
            .into_iter()
            .next()
            .ok_or(WebhookError::NotFound)
    }
}
