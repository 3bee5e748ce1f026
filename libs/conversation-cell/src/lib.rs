pub mod handlers;
pub mod messages;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::*;
