pub mod usage_aggregate;
pub mod usage_event;

pub use usage_aggregate::{validate_billing_month, UsageAggregate};
pub use usage_event::UsageEvent;
