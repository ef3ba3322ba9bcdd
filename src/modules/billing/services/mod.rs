pub mod billing_calculator;
pub mod rule_resolver;

pub use billing_calculator::{calculate_invoice, MINIMUM_CHARGE_DESCRIPTION};
pub use rule_resolver::{resolve_effective, resolve_minimum_rule, resolve_pricing_rule};
