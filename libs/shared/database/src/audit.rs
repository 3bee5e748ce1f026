use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::supabase::{DbError, SupabaseClient};

/// Append-only audit trail; one row per state-changing operation.
pub struct AuditLog {
    supabase: Arc<SupabaseClient>,
}

#[derive(Debug, Default, Clone)]
pub struct AuditEntry {
    pub event_kind: String,
    pub customer_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub previous: Option<Value>,
    pub current: Option<Value>,
    pub idempotency_key: Option<String>,
}

impl AuditEntry {
    pub fn new(event_kind: &str) -> Self {
        Self {
            event_kind: event_kind.to_string(),
            ..Default::default()
        }
    }

    pub fn customer(mut self, id: Uuid) -> Self {
        self.customer_id = Some(id);
        self
    }

    pub fn appointment(mut self, id: Uuid) -> Self {
        self.appointment_id = Some(id);
        self
    }

    pub fn invoice(mut self, id: Uuid) -> Self {
        self.invoice_id = Some(id);
        self
    }

    pub fn previous(mut self, snapshot: Value) -> Self {
        self.previous = Some(snapshot);
        self
    }

    pub fn current(mut self, snapshot: Value) -> Self {
        self.current = Some(snapshot);
        self
    }

    pub fn idempotency_key(mut self, key: &str) -> Self {
        self.idempotency_key = Some(key.to_string());
        self
    }
}

impl AuditLog {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Persist an audit record. Propagates the error so financially critical
    /// paths can refuse to continue without a trail.
    pub async fn record(&self, entry: AuditEntry) -> Result<(), DbError> {
        let row = json!({
            "event_kind": entry.event_kind,
            "customer_id": entry.customer_id,
            "appointment_id": entry.appointment_id,
            "invoice_id": entry.invoice_id,
            "previous": entry.previous,
            "current": entry.current,
            "idempotency_key": entry.idempotency_key,
            "created_at": Utc::now().to_rfc3339(),
        });

        let _: Value = self.supabase.insert("audit_log", row).await?;
        Ok(())
    }

    /// Best-effort variant for paths where a lost audit row must not abort
    /// the operation itself.
    pub async fn record_best_effort(&self, entry: AuditEntry) {
        let kind = entry.event_kind.clone();
        if let Err(e) = self.record(entry).await {
            warn!("Failed to write audit record {}: {}", kind, e);
        }
    }
}
