use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{MessagingError, ReplyButton};

/// Outbound WhatsApp Cloud API client.
pub struct MessagingClient {
    client: Client,
    base_url: String,
    phone_number_id: String,
    access_token: String,
}

impl MessagingClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build http client");

        Self {
            client,
            base_url: config.whatsapp_api_url.clone(),
            phone_number_id: config.whatsapp_phone_number_id.clone(),
            access_token: config.whatsapp_access_token.clone(),
        }
    }

    async fn post_message(&self, body: Value) -> Result<(), MessagingError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        debug!("Sending message via {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Messaging API error ({}): {}", status, error_text);
            return Err(MessagingError::Api {
                status: status.as_u16(),
                body: error_text,
            });
        }

        Ok(())
    }

    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), MessagingError> {
        self.post_message(json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": { "body": body }
        }))
        .await
    }

    pub async fn send_buttons(
        &self,
        to: &str,
        body: &str,
        buttons: &[ReplyButton],
    ) -> Result<(), MessagingError> {
        let button_objects: Vec<Value> = buttons
            .iter()
            .map(|b| {
                json!({
                    "type": "reply",
                    "reply": { "id": b.id, "title": b.title }
                })
            })
            .collect();

        self.post_message(json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": body },
                "action": { "buttons": button_objects }
            }
        }))
        .await
    }

    /// Mark an inbound message as read. Callers treat failures as
    /// non-fatal; a missing read receipt never blocks processing.
    pub async fn mark_read(&self, message_id: &str) -> Result<(), MessagingError> {
        self.post_message(json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id
        }))
        .await
    }
}
