// Rule-resolution precedence: org-specific shadows global, ties break on
// the most recent effective_from, and the effectiveness window is half-open.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use meterbill::core::Currency;
use meterbill::modules::billing::models::PricingRule;
use meterbill::modules::billing::services::resolve_pricing_rule;

fn rule(
    org_id: Option<Uuid>,
    effective_from: DateTime<Utc>,
    effective_to: Option<DateTime<Utc>>,
) -> PricingRule {
    PricingRule {
        id: Uuid::new_v4(),
        org_id,
        metric: "api_calls".to_string(),
        unit: "count".to_string(),
        price_per_unit: dec!(0.00100000),
        currency: Currency::INR,
        effective_from,
        effective_to,
        active: true,
        metadata: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

#[test]
fn test_org_rule_shadows_global() {
    let org = Uuid::new_v4();
    // The global rule is newer, the org rule still wins
    let global = rule(None, at(2023, 6, 1), None);
    let org_rule = rule(Some(org), at(2022, 1, 1), None);
    let rules = vec![global, org_rule.clone()];

    let chosen = resolve_pricing_rule(&rules, "api_calls", "count", at(2024, 1, 1)).unwrap();
    assert_eq!(chosen.id, org_rule.id);
}

#[test]
fn test_latest_effective_from_breaks_ties() {
    let older = rule(None, at(2022, 1, 1), None);
    let newer = rule(None, at(2023, 1, 1), None);
    let rules = vec![older, newer.clone()];

    let chosen = resolve_pricing_rule(&rules, "api_calls", "count", at(2024, 1, 1)).unwrap();
    assert_eq!(chosen.id, newer.id);
}

#[test]
fn test_row_order_does_not_matter() {
    let org = Uuid::new_v4();
    let org_rule = rule(Some(org), at(2022, 1, 1), None);
    let global = rule(None, at(2023, 6, 1), None);

    let forwards = vec![org_rule.clone(), global.clone()];
    let backwards = vec![global, org_rule.clone()];

    let a = resolve_pricing_rule(&forwards, "api_calls", "count", at(2024, 1, 1)).unwrap();
    let b = resolve_pricing_rule(&backwards, "api_calls", "count", at(2024, 1, 1)).unwrap();
    assert_eq!(a.id, org_rule.id);
    assert_eq!(b.id, org_rule.id);
}

#[test]
fn test_half_open_window_edges() {
    let start = at(2024, 1, 1);
    let expired = rule(None, at(2023, 1, 1), Some(start));
    assert!(resolve_pricing_rule(&[expired], "api_calls", "count", start).is_none());

    let starting = rule(None, start, None);
    let rules = [starting];
    assert!(resolve_pricing_rule(&rules, "api_calls", "count", start).is_some());
}

#[test]
fn test_metric_and_unit_must_match() {
    let rules = [rule(None, at(2022, 1, 1), None)];
    assert!(resolve_pricing_rule(&rules, "api_calls", "count", at(2024, 1, 1)).is_some());
    assert!(resolve_pricing_rule(&rules, "api_calls", "gigabyte", at(2024, 1, 1)).is_none());
    assert!(resolve_pricing_rule(&rules, "storage_gb", "count", at(2024, 1, 1)).is_none());
}

#[test]
fn test_inactive_rules_are_invisible() {
    let mut inactive = rule(None, at(2022, 1, 1), None);
    inactive.active = false;
    let rules = [inactive];
    assert!(resolve_pricing_rule(&rules, "api_calls", "count", at(2024, 1, 1)).is_none());
}

#[test]
fn test_future_rule_does_not_apply() {
    let rules = [rule(None, at(2025, 1, 1), None)];
    assert!(resolve_pricing_rule(&rules, "api_calls", "count", at(2024, 1, 1)).is_none());
}
