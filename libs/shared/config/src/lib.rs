use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub admin_jwt_secret: String,

    pub whatsapp_api_url: String,
    pub whatsapp_phone_number_id: String,
    pub whatsapp_access_token: String,
    pub whatsapp_verify_token: String,

    pub calendar_api_url: String,
    pub calendar_id: String,
    pub calendar_access_token: String,

    pub asaas_api_url: String,
    pub asaas_api_key: String,
    pub asaas_webhook_token: String,

    pub default_session_price: f64,
}

fn var_or_warn(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", name);
        String::new()
    })
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: var_or_warn("SUPABASE_URL"),
            supabase_service_key: var_or_warn("SUPABASE_SERVICE_KEY"),
            admin_jwt_secret: var_or_warn("ADMIN_JWT_SECRET"),
            whatsapp_api_url: env::var("WHATSAPP_API_URL")
                .unwrap_or_else(|_| "https://graph.facebook.com/v21.0".to_string()),
            whatsapp_phone_number_id: var_or_warn("WHATSAPP_PHONE_NUMBER_ID"),
            whatsapp_access_token: var_or_warn("WHATSAPP_ACCESS_TOKEN"),
            whatsapp_verify_token: var_or_warn("WHATSAPP_VERIFY_TOKEN"),
            calendar_api_url: env::var("CALENDAR_API_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/calendar/v3".to_string()),
            calendar_id: env::var("CALENDAR_ID").unwrap_or_else(|_| "primary".to_string()),
            calendar_access_token: var_or_warn("CALENDAR_ACCESS_TOKEN"),
            asaas_api_url: env::var("ASAAS_API_URL")
                .unwrap_or_else(|_| "https://api.asaas.com/v3".to_string()),
            asaas_api_key: var_or_warn("ASAAS_API_KEY"),
            asaas_webhook_token: var_or_warn("ASAAS_WEBHOOK_TOKEN"),
            default_session_price: env::var("DEFAULT_SESSION_PRICE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200.0),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_messaging_configured(&self) -> bool {
        !self.whatsapp_phone_number_id.is_empty() && !self.whatsapp_access_token.is_empty()
    }

    pub fn is_billing_configured(&self) -> bool {
        !self.asaas_api_key.is_empty()
    }
}
