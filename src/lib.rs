//! Meterbill usage-based billing engine
//!
//! Core pipeline: idempotent event ingestion into a hot store, batched
//! migration into the durable store, monthly aggregation and invoice
//! generation, gateway-driven payments with retry and refunds, and
//! reconciliation loops auditing every data movement.

pub mod config;
pub mod core;
pub mod jobs;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use modules::billing;
pub use modules::events;
pub use modules::invoices;
pub use modules::payments;
