pub mod deletion;
pub mod error;
pub mod reconciliation;
