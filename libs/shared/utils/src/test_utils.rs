use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::JwtClaims;

use crate::jwt::issue_token;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub whatsapp_api_url: String,
    pub calendar_api_url: String,
    pub asaas_api_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-admin-token-validation".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            whatsapp_api_url: "http://localhost:54322".to_string(),
            calendar_api_url: "http://localhost:54323".to_string(),
            asaas_api_url: "http://localhost:54324".to_string(),
        }
    }
}

impl TestConfig {
    /// Point every external surface at the given mock server.
    pub fn all_on(mock_url: &str) -> Self {
        Self {
            supabase_url: mock_url.to_string(),
            whatsapp_api_url: mock_url.to_string(),
            calendar_api_url: mock_url.to_string(),
            asaas_api_url: mock_url.to_string(),
            ..Default::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: "test-service-key".to_string(),
            admin_jwt_secret: self.jwt_secret.clone(),
            whatsapp_api_url: self.whatsapp_api_url.clone(),
            whatsapp_phone_number_id: "123456".to_string(),
            whatsapp_access_token: "test-wa-token".to_string(),
            whatsapp_verify_token: "test-verify-token".to_string(),
            calendar_api_url: self.calendar_api_url.clone(),
            calendar_id: "primary".to_string(),
            calendar_access_token: "test-cal-token".to_string(),
            asaas_api_url: self.asaas_api_url.clone(),
            asaas_api_key: "test-asaas-key".to_string(),
            asaas_webhook_token: "test-asaas-webhook-token".to_string(),
            default_session_price: 200.0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    pub fn admin_token(&self) -> String {
        let claims = JwtClaims {
            sub: "test-operator".to_string(),
            exp: Some(Utc::now().timestamp() as u64 + 3600),
            iat: Some(Utc::now().timestamp() as u64),
            name: Some("Test Operator".to_string()),
            role: Some("admin".to_string()),
        };
        issue_token(&claims, &self.jwt_secret).expect("token issuance")
    }
}

/// Canned Supabase row payloads for wiremock responders.
pub struct MockRows;

impl MockRows {
    pub fn customer(id: &str, phone: &str, name: &str, state: &str) -> Value {
        json!({
            "id": id,
            "phone": phone,
            "full_name": name,
            "cpf": "52998224725",
            "email": "customer@example.com",
            "asaas_customer_id": null,
            "conversation_state": state,
            "flow_context": {},
            "billing_method": "PIX",
            "session_price": null,
            "registration_complete": true,
            "active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        })
    }

    pub fn availability_rule(
        id: &str,
        day_of_week: i32,
        start: &str,
        end: &str,
        slot_minutes: i32,
        gap_minutes: i32,
    ) -> Value {
        json!({
            "id": id,
            "day_of_week": day_of_week,
            "start_time": start,
            "end_time": end,
            "slot_minutes": slot_minutes,
            "gap_minutes": gap_minutes,
            "active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        })
    }

    pub fn appointment(
        id: &str,
        customer_id: &str,
        date: &str,
        time: &str,
        status: &str,
        payment_status: &str,
    ) -> Value {
        json!({
            "id": id,
            "customer_id": customer_id,
            "appointment_date": date,
            "start_time": format!("{}:00", time),
            "scheduled_start": format!("{}T{}:00Z", date, time),
            "scheduled_end": format!("{}T{}:00Z", date, time),
            "status": status,
            "payment_status": payment_status,
            "calendar_event_id": "cal-evt-1",
            "price": 200.0,
            "reminder_24h_sent": false,
            "reminder_2h_sent": false,
            "cancellation_reason": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339(),
        })
    }

    pub fn invoice(id: &str, appointment_id: &str, asaas_payment_id: &str, status: &str) -> Value {
        json!({
            "id": id,
            "appointment_id": appointment_id,
            "asaas_payment_id": asaas_payment_id,
            "amount": 200.0,
            "billing_method": "PIX",
            "status": status,
            "invoice_url": "https://pay.example/inv",
            "pix_payload": null,
            "boleto_line": null,
            "due_date": "2026-01-18",
            "paid_at": null,
            "confirmed_at": null,
            "created_at": Utc::now().to_rfc3339(),
        })
    }
}
