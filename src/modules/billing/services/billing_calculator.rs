//! The billing calculation core.
//!
//! A pure transformation with no I/O: monthly aggregates, the pricing and
//! minimum-charge rules in force, and the organisation's billing config go
//! in; a fully priced invoice comes out. All the interesting invariants
//! (line totals, minimum top-up, tax base, due date) live here, which is
//! what makes them unit-testable without a database.

use chrono::Duration;
use rust_decimal::Decimal;

use crate::core::money::{mul_to_money, round_money};
use crate::core::{AppError, BillingPeriod, Result};
use crate::modules::billing::models::{
    BillingConfig, CalculatedInvoice, CalculatedLineItem, MinimumChargeRule, PricingRule,
    UnpricedAggregate,
};
use crate::modules::billing::services::rule_resolver::{
    resolve_minimum_rule, resolve_pricing_rule,
};
use crate::modules::events::models::UsageAggregate;

/// Description used for the synthetic minimum-charge top-up line
pub const MINIMUM_CHARGE_DESCRIPTION: &str = "Minimum Monthly Charge";

/// Price a billing month.
///
/// Aggregates without an applicable rule are dropped from the invoice and
/// surfaced in `CalculatedInvoice::unpriced`; the caller decides how loudly
/// to report them. All rules must already be denominated in the config
/// currency; conversion happens upstream, at the historical rate of the
/// billing-period start.
pub fn calculate_invoice(
    aggregates: &[UsageAggregate],
    pricing_rules: &[PricingRule],
    minimum_rules: &[MinimumChargeRule],
    config: &BillingConfig,
    month: u32,
    year: i32,
) -> Result<CalculatedInvoice> {
    config.validate()?;
    let period = BillingPeriod::of_month(month, year)?;

    for rule in pricing_rules {
        if rule.currency != config.currency {
            return Err(AppError::integrity(format!(
                "pricing rule {} is denominated in {} but the billing currency is {}; \
                 convert before calculation",
                rule.id, rule.currency, config.currency
            )));
        }
    }

    let mut line_items: Vec<CalculatedLineItem> = Vec::new();
    let mut unpriced: Vec<UnpricedAggregate> = Vec::new();

    for aggregate in aggregates {
        aggregate.validate()?;

        match resolve_pricing_rule(pricing_rules, &aggregate.metric, &aggregate.unit, period.start)
        {
            Some(rule) => {
                let total = mul_to_money(aggregate.total_value, rule.price_per_unit);
                line_items.push(CalculatedLineItem {
                    project_id: Some(aggregate.project_id),
                    description: format!("{} ({})", aggregate.metric, aggregate.unit),
                    metric: aggregate.metric.clone(),
                    quantity: aggregate.total_value,
                    unit: aggregate.unit.clone(),
                    unit_price: rule.price_per_unit,
                    total,
                    currency: config.currency,
                });
            }
            None => {
                unpriced.push(UnpricedAggregate {
                    project_id: aggregate.project_id,
                    metric: aggregate.metric.clone(),
                    unit: aggregate.unit.clone(),
                    total_value: aggregate.total_value,
                });
            }
        }
    }

    let subtotal = round_money(line_items.iter().map(|item| item.total).sum());

    // Minimum charge: an org-specific or global rule takes precedence, the
    // config amount is the fallback. Equal-to-minimum subtotals get no
    // synthetic line.
    let mut subtotal_effective = subtotal;
    if config.min_charge_enabled {
        let minimum = resolve_minimum_rule(minimum_rules, period.start)
            .map(|rule| rule.amount)
            .or(config.min_charge_amount);

        if let Some(minimum) = minimum {
            let minimum = round_money(minimum);
            if subtotal < minimum {
                let deficit = minimum - subtotal;
                line_items.push(CalculatedLineItem {
                    project_id: None,
                    description: MINIMUM_CHARGE_DESCRIPTION.to_string(),
                    metric: "minimum_charge".to_string(),
                    quantity: Decimal::ONE,
                    unit: "charge".to_string(),
                    unit_price: deficit,
                    total: deficit,
                    currency: config.currency,
                });
                subtotal_effective = minimum;
            }
        }
    }

    let tax = round_money(subtotal_effective * config.tax_rate);
    // Reserved; nothing populates a discount today
    let discount = Decimal::ZERO;
    let total = round_money(subtotal_effective + tax - discount);

    let period_end = period.end_inclusive();
    let due_date = period_end + Duration::days(config.payment_terms_days as i64);

    Ok(CalculatedInvoice {
        subtotal,
        subtotal_effective,
        tax,
        discount,
        total,
        currency: config.currency,
        month,
        year,
        period_start: period.start,
        period_end,
        due_date,
        line_items,
        unpriced,
    })
}
