pub mod client;
pub mod models;

pub use client::MessagingClient;
pub use models::*;
