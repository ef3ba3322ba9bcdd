// Exchange-rate selection and conversion arithmetic. The repository-facing
// parts need a database; the selection tie-break and the monetary laws are
// pure and covered here.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use meterbill::core::money::{round_money, within_tolerance};
use meterbill::core::Currency;
use meterbill::modules::exchange::models::{select_rate, ExchangeRate};

fn rate_row(
    rate: Decimal,
    effective_from: DateTime<Utc>,
    effective_to: Option<DateTime<Utc>>,
) -> ExchangeRate {
    ExchangeRate {
        id: Uuid::new_v4(),
        base: Currency::INR,
        target: Currency::USD,
        rate,
        effective_from,
        effective_to,
        created_at: Utc::now(),
    }
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

#[test]
fn test_covering_row_is_selected() {
    let rows = vec![
        rate_row(dec!(0.011), at(2023, 1, 1), Some(at(2023, 7, 1))),
        rate_row(dec!(0.012), at(2023, 7, 1), None),
    ];

    let hit = select_rate(&rows, at(2024, 1, 1)).unwrap();
    assert_eq!(hit.rate, dec!(0.012));

    let earlier = select_rate(&rows, at(2023, 3, 1)).unwrap();
    assert_eq!(earlier.rate, dec!(0.011));
}

#[test]
fn test_half_open_containment() {
    let boundary = at(2023, 7, 1);
    let rows = vec![
        rate_row(dec!(0.011), at(2023, 1, 1), Some(boundary)),
        rate_row(dec!(0.012), boundary, None),
    ];

    // Exactly at the boundary the newer row owns the instant
    let hit = select_rate(&rows, boundary).unwrap();
    assert_eq!(hit.rate, dec!(0.012));

    let just_before = select_rate(&rows, boundary - Duration::milliseconds(1)).unwrap();
    assert_eq!(just_before.rate, dec!(0.011));
}

#[test]
fn test_most_recent_effective_from_wins_overlap() {
    // Two open-ended rows (a sync glitch): the newer one wins
    let rows = vec![
        rate_row(dec!(0.011), at(2023, 1, 1), None),
        rate_row(dec!(0.012), at(2023, 7, 1), None),
    ];
    assert_eq!(select_rate(&rows, at(2024, 1, 1)).unwrap().rate, dec!(0.012));
}

#[test]
fn test_no_covering_row_yields_none() {
    let rows = vec![rate_row(dec!(0.012), at(2024, 6, 1), None)];
    assert!(select_rate(&rows, at(2024, 1, 1)).is_none());
    assert!(select_rate(&[], at(2024, 1, 1)).is_none());
}

#[test]
fn test_rule_price_conversion_example() {
    // 100 INR/unit at 0.012 INR->USD is 1.20 USD/unit
    let rate = dec!(0.01200000);
    let converted = (dec!(100.00000000) * rate).round_dp(8);
    assert_eq!(converted, dec!(1.20000000));
}

proptest! {
    #[test]
    fn prop_conversion_is_reflexive(cents in 0i64..1_000_000_000i64) {
        // from == to short-circuits to rate 1
        let amount = Decimal::new(cents, 2);
        prop_assert_eq!(round_money(amount * Decimal::ONE), amount);
    }

    #[test]
    fn prop_conversion_is_monotone_additive(
        a_cents in 1i64..100_000_000i64,
        b_cents in 1i64..100_000_000i64,
        rate_nanos in 1i64..10_000_000_000i64
    ) {
        // convert(a + b) == convert(a) + convert(b) up to scale-2 rounding
        let a = Decimal::new(a_cents, 2);
        let b = Decimal::new(b_cents, 2);
        let rate = Decimal::new(rate_nanos, 8);

        let together = round_money((a + b) * rate);
        let split = round_money(a * rate) + round_money(b * rate);

        prop_assert!(
            within_tolerance(together, split),
            "convert({} + {}) = {} but parts sum to {}",
            a, b, together, split
        );
    }

    #[test]
    fn prop_inverse_rate_round_trips(rate_nanos in 1_000i64..10_000_000_000i64) {
        // Deriving the reverse rate as 1/rate inverts within rate precision
        let rate = Decimal::new(rate_nanos, 8);
        let inverse = (Decimal::ONE / rate).round_dp(8);
        let round_trip = (rate * inverse).round_dp(4);
        prop_assert!(
            (round_trip - Decimal::ONE).abs() <= dec!(0.001),
            "rate {} * inverse {} = {}",
            rate, inverse, round_trip
        );
    }
}
