pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::WebhookState;
pub use models::*;
pub use router::*;
