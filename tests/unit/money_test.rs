// Property-based tests for the money primitives: half-even narrowing,
// canonical parse/format, and the settlement tolerance used by every
// cross-field invariant check.

use meterbill::core::money::{
    abs_diff, format_money, money_tolerance, mul_to_money, parse_money, round_money, round_rate,
    within_tolerance,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[test]
fn test_half_even_ties() {
    // Ties round to the even neighbour, not away from zero
    assert_eq!(round_money(dec!(0.125)), dec!(0.12));
    assert_eq!(round_money(dec!(0.135)), dec!(0.14));
    assert_eq!(round_money(dec!(2.675)), dec!(2.68));
    assert_eq!(round_money(dec!(-0.125)), dec!(-0.12));
}

#[test]
fn test_rate_scale_is_eight() {
    assert_eq!(round_rate(dec!(0.123456789)), dec!(0.12345679));
    assert_eq!(round_rate(dec!(0.1)), dec!(0.1));
}

#[test]
fn test_mul_narrows_with_half_even() {
    // 1000 count at 0.001/count is exactly 1.00
    assert_eq!(mul_to_money(dec!(1000), dec!(0.00100000)), dec!(1.00));
    // 3 at 0.335 = 1.005, half-even narrows to 1.00
    assert_eq!(mul_to_money(dec!(3), dec!(0.335)), dec!(1.00));
    // 1 at 0.345 = 0.345 -> 0.34
    assert_eq!(mul_to_money(dec!(1), dec!(0.345)), dec!(0.34));
}

#[test]
fn test_parse_format_canonical() {
    assert_eq!(parse_money("10").unwrap(), dec!(10.00));
    assert_eq!(format_money(dec!(10)), "10.00");
    assert_eq!(format_money(parse_money(" 118.00 ").unwrap()), "118.00");
    assert!(parse_money("1e3").is_err());
    assert!(parse_money("INR 5").is_err());
}

#[test]
fn test_tolerance_boundary() {
    assert!(within_tolerance(dec!(100.00), dec!(100.01)));
    assert!(within_tolerance(dec!(100.01), dec!(100.00)));
    assert!(!within_tolerance(dec!(100.00), dec!(100.02)));
    assert_eq!(money_tolerance(), dec!(0.01));
}

proptest! {
    #[test]
    fn prop_round_money_is_idempotent(cents in -1_000_000_000i64..1_000_000_000i64) {
        let amount = Decimal::new(cents, 2);
        prop_assert_eq!(round_money(amount), round_money(round_money(amount)));
    }

    #[test]
    fn prop_round_money_never_moves_more_than_half_cent(
        micros in -1_000_000_000i64..1_000_000_000i64
    ) {
        let amount = Decimal::new(micros, 6);
        let rounded = round_money(amount);
        prop_assert!(abs_diff(amount, rounded) <= dec!(0.005));
        prop_assert!(rounded.scale() <= 2);
    }

    #[test]
    fn prop_mul_to_money_is_deterministic(
        quantity in 0u64..10_000_000u64,
        price_nanos in 0i64..100_000_000i64
    ) {
        let quantity = Decimal::from(quantity);
        let price = Decimal::new(price_nanos, 8);
        prop_assert_eq!(mul_to_money(quantity, price), mul_to_money(quantity, price));
    }

    #[test]
    fn prop_format_parse_round_trips(cents in 0i64..1_000_000_000i64) {
        let amount = Decimal::new(cents, 2);
        let formatted = format_money(amount);
        prop_assert_eq!(parse_money(&formatted).unwrap(), amount);
    }
}
