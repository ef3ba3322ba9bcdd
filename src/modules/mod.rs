pub mod audit;
pub mod billing;
pub mod events;
pub mod exchange;
pub mod health;
pub mod idempotency;
pub mod invoices;
pub mod organizations;
pub mod payments;
pub mod reconciliation;
