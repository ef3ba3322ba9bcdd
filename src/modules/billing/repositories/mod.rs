pub mod billing_config_repository;
pub mod minimum_charge_rule_repository;
pub mod pricing_rule_repository;

pub use billing_config_repository::BillingConfigRepository;
pub use minimum_charge_rule_repository::MinimumChargeRuleRepository;
pub use pricing_rule_repository::PricingRuleRepository;
