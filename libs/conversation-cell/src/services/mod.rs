pub mod booking_flow;
pub mod cancel_flow;
pub mod orchestrator;
pub mod reschedule_flow;

pub use orchestrator::Orchestrator;
