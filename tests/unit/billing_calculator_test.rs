// End-to-end tests of the pure billing calculation: pricing-rule selection,
// minimum-charge top-up, tax, and the monetary identities every persisted
// invoice must satisfy.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use meterbill::core::money::within_tolerance;
use meterbill::core::Currency;
use meterbill::modules::billing::models::{BillingConfig, BillingCycle, MinimumChargeRule, PricingRule};
use meterbill::modules::billing::services::{calculate_invoice, MINIMUM_CHARGE_DESCRIPTION};
use meterbill::modules::events::models::UsageAggregate;

fn aggregate(metric: &str, unit: &str, total: Decimal, month: i32, year: i32) -> UsageAggregate {
    UsageAggregate {
        id: Uuid::new_v4(),
        org_id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        metric: metric.to_string(),
        unit: unit.to_string(),
        month,
        year,
        total_value: total,
        event_count: 1,
        updated_at: Utc::now(),
    }
}

fn global_rule(metric: &str, unit: &str, price: Decimal, currency: Currency) -> PricingRule {
    PricingRule {
        id: Uuid::new_v4(),
        org_id: None,
        metric: metric.to_string(),
        unit: unit.to_string(),
        price_per_unit: price,
        currency,
        effective_from: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        effective_to: None,
        active: true,
        metadata: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn config(currency: Currency, tax_rate: Decimal) -> BillingConfig {
    BillingConfig {
        org_id: Uuid::new_v4(),
        tax_rate,
        currency,
        cycle: BillingCycle::Monthly,
        payment_terms_days: 15,
        min_charge_enabled: false,
        min_charge_amount: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn test_single_metric_invoice_inr() {
    // 1000 api calls at 0.001 INR with 18% tax
    let aggregates = vec![aggregate("api_calls", "count", dec!(1000), 1, 2024)];
    let rules = vec![global_rule("api_calls", "count", dec!(0.00100000), Currency::INR)];
    let cfg = config(Currency::INR, dec!(0.18));

    let calc = calculate_invoice(&aggregates, &rules, &[], &cfg, 1, 2024).unwrap();

    assert_eq!(calc.subtotal, dec!(1.00));
    assert_eq!(calc.subtotal_effective, dec!(1.00));
    assert_eq!(calc.tax, dec!(0.18));
    assert_eq!(calc.total, dec!(1.18));
    assert_eq!(calc.line_items.len(), 1);
    assert!(calc.unpriced.is_empty());

    let line = &calc.line_items[0];
    assert_eq!(line.quantity, dec!(1000));
    assert_eq!(line.unit_price, dec!(0.00100000));
    assert_eq!(line.total, dec!(1.00));
}

#[test]
fn test_minimum_charge_tops_up() {
    // Subtotal 3.00 against a 10.00 floor, no tax: expect a synthetic 7.00
    // line and an effective subtotal of exactly the minimum
    let aggregates = vec![aggregate("api_calls", "count", dec!(3000), 1, 2024)];
    let rules = vec![global_rule("api_calls", "count", dec!(0.00100000), Currency::INR)];
    let mut cfg = config(Currency::INR, dec!(0.0));
    cfg.min_charge_enabled = true;
    cfg.min_charge_amount = Some(dec!(10.00));

    let calc = calculate_invoice(&aggregates, &rules, &[], &cfg, 1, 2024).unwrap();

    assert_eq!(calc.subtotal, dec!(3.00));
    assert_eq!(calc.subtotal_effective, dec!(10.00));
    assert_eq!(calc.tax, dec!(0.00));
    assert_eq!(calc.total, dec!(10.00));
    assert_eq!(calc.line_items.len(), 2);

    let synthetic = &calc.line_items[1];
    assert_eq!(synthetic.description, MINIMUM_CHARGE_DESCRIPTION);
    assert_eq!(synthetic.total, dec!(7.00));
}

#[test]
fn test_minimum_charge_equal_subtotal_adds_no_line() {
    let aggregates = vec![aggregate("api_calls", "count", dec!(10000), 1, 2024)];
    let rules = vec![global_rule("api_calls", "count", dec!(0.00100000), Currency::INR)];
    let mut cfg = config(Currency::INR, dec!(0.0));
    cfg.min_charge_enabled = true;
    cfg.min_charge_amount = Some(dec!(10.00));

    let calc = calculate_invoice(&aggregates, &rules, &[], &cfg, 1, 2024).unwrap();

    assert_eq!(calc.subtotal, dec!(10.00));
    assert_eq!(calc.subtotal_effective, dec!(10.00));
    assert_eq!(calc.line_items.len(), 1);
}

#[test]
fn test_minimum_rule_shadows_config_amount() {
    let aggregates = vec![aggregate("api_calls", "count", dec!(1000), 1, 2024)];
    let rules = vec![global_rule("api_calls", "count", dec!(0.00100000), Currency::INR)];
    let mut cfg = config(Currency::INR, dec!(0.0));
    cfg.min_charge_enabled = true;
    cfg.min_charge_amount = Some(dec!(50.00));

    let minimum = MinimumChargeRule {
        id: Uuid::new_v4(),
        org_id: Some(cfg.org_id),
        amount: dec!(5.00),
        currency: Currency::INR,
        effective_from: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        effective_to: None,
        active: true,
        description: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let calc = calculate_invoice(&aggregates, &rules, &[minimum], &cfg, 1, 2024).unwrap();

    // The rule's 5.00 wins over the config's 50.00 fallback
    assert_eq!(calc.subtotal_effective, dec!(5.00));
}

#[test]
fn test_pre_converted_usd_pricing() {
    // A 100 INR/unit rule converted upstream at 0.012 becomes 1.20 USD/unit
    let aggregates = vec![aggregate("compute_hours", "hour", dec!(3), 1, 2024)];
    let rules = vec![global_rule("compute_hours", "hour", dec!(1.20000000), Currency::USD)];
    let cfg = config(Currency::USD, dec!(0.0));

    let calc = calculate_invoice(&aggregates, &rules, &[], &cfg, 1, 2024).unwrap();

    assert_eq!(calc.currency, Currency::USD);
    assert_eq!(calc.line_items[0].total, dec!(3.60));
    assert_eq!(calc.total, dec!(3.60));
}

#[test]
fn test_unconverted_rule_currency_is_refused() {
    let aggregates = vec![aggregate("api_calls", "count", dec!(1000), 1, 2024)];
    let rules = vec![global_rule("api_calls", "count", dec!(100.0), Currency::INR)];
    let cfg = config(Currency::USD, dec!(0.0));

    assert!(calculate_invoice(&aggregates, &rules, &[], &cfg, 1, 2024).is_err());
}

#[test]
fn test_aggregate_without_rule_is_reported_not_priced() {
    let aggregates = vec![
        aggregate("api_calls", "count", dec!(1000), 1, 2024),
        aggregate("storage_gb", "gigabyte", dec!(50), 1, 2024),
    ];
    let rules = vec![global_rule("api_calls", "count", dec!(0.00100000), Currency::INR)];
    let cfg = config(Currency::INR, dec!(0.0));

    let calc = calculate_invoice(&aggregates, &rules, &[], &cfg, 1, 2024).unwrap();

    assert_eq!(calc.line_items.len(), 1);
    assert_eq!(calc.unpriced.len(), 1);
    assert_eq!(calc.unpriced[0].metric, "storage_gb");
}

#[test]
fn test_rule_effective_to_at_period_start_excludes() {
    let period_start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut expiring = global_rule("api_calls", "count", dec!(0.00100000), Currency::INR);
    expiring.effective_to = Some(period_start);

    let aggregates = vec![aggregate("api_calls", "count", dec!(1000), 1, 2024)];
    let cfg = config(Currency::INR, dec!(0.0));

    let calc = calculate_invoice(&aggregates, &[expiring], &[], &cfg, 1, 2024).unwrap();
    assert!(calc.line_items.is_empty());
    assert_eq!(calc.unpriced.len(), 1);
}

#[test]
fn test_rule_effective_from_at_period_start_includes() {
    let period_start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let mut starting = global_rule("api_calls", "count", dec!(0.00100000), Currency::INR);
    starting.effective_from = period_start;

    let aggregates = vec![aggregate("api_calls", "count", dec!(1000), 1, 2024)];
    let cfg = config(Currency::INR, dec!(0.0));

    let calc = calculate_invoice(&aggregates, &[starting], &[], &cfg, 1, 2024).unwrap();
    assert_eq!(calc.line_items.len(), 1);
}

#[test]
fn test_due_date_is_period_end_plus_terms() {
    let aggregates = vec![aggregate("api_calls", "count", dec!(1000), 1, 2024)];
    let rules = vec![global_rule("api_calls", "count", dec!(0.00100000), Currency::INR)];
    let cfg = config(Currency::INR, dec!(0.0));

    let calc = calculate_invoice(&aggregates, &rules, &[], &cfg, 1, 2024).unwrap();

    assert_eq!(calc.due_date, calc.period_end + chrono::Duration::days(15));
    assert_eq!(
        calc.period_start,
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    );
    // Period end is the last representable instant of January
    assert!(calc.period_end < Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
}

proptest! {
    #[test]
    fn prop_invoice_identities_hold(
        volumes in proptest::collection::vec(0u64..10_000_000u64, 1..6),
        price_nanos in 1i64..50_000_000i64,
        tax_bps in 0u32..=10_000u32,
        min_cents in 0i64..100_000i64,
        min_enabled: bool
    ) {
        let price = Decimal::new(price_nanos, 8);
        let tax_rate = Decimal::new(tax_bps as i64, 4);

        let aggregates: Vec<UsageAggregate> = volumes
            .iter()
            .map(|v| aggregate("api_calls", "count", Decimal::from(*v), 1, 2024))
            .collect();
        let rules = vec![global_rule("api_calls", "count", price, Currency::INR)];

        let mut cfg = config(Currency::INR, tax_rate);
        cfg.min_charge_enabled = min_enabled;
        cfg.min_charge_amount = Some(Decimal::new(min_cents, 2));

        let calc = calculate_invoice(&aggregates, &rules, &[], &cfg, 1, 2024).unwrap();

        // Per line: |total - quantity * unit_price| <= 0.01
        for line in &calc.line_items {
            let expected = line.quantity * line.unit_price;
            prop_assert!(within_tolerance(line.total, expected.round_dp(2)));
        }

        // Line totals sum to the effective subtotal within per-line tolerance
        let line_sum: Decimal = calc.line_items.iter().map(|l| l.total).sum();
        prop_assert_eq!(line_sum, calc.subtotal_effective);

        // Total identity
        prop_assert_eq!(
            calc.total,
            calc.subtotal_effective + calc.tax - calc.discount
        );

        // Effective subtotal never drops below the raw subtotal
        prop_assert!(calc.subtotal_effective >= calc.subtotal);

        // No negative monetary field ever leaves the calculator
        prop_assert!(calc.subtotal >= Decimal::ZERO);
        prop_assert!(calc.tax >= Decimal::ZERO);
        prop_assert!(calc.total >= Decimal::ZERO);
    }
}
