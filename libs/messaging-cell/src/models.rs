use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Messaging API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A reply button for interactive messages (max 3 per message on the
/// WhatsApp Cloud API).
#[derive(Debug, Clone, Serialize)]
pub struct ReplyButton {
    pub id: String,
    pub title: String,
}

impl ReplyButton {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
        }
    }
}

