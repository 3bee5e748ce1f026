pub mod ledger;
pub mod webhook;
