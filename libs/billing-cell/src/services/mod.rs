pub mod asaas;
pub mod invoicing;
pub mod reconcile;
pub mod sweep;
