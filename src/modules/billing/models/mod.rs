pub mod billing_config;
pub mod calculated_invoice;
pub mod minimum_charge_rule;
pub mod pricing_rule;

pub use billing_config::{BillingConfig, BillingCycle};
pub use calculated_invoice::{CalculatedInvoice, CalculatedLineItem, UnpricedAggregate};
pub use minimum_charge_rule::MinimumChargeRule;
pub use pricing_rule::PricingRule;
