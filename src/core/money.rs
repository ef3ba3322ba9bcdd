//! Exact-decimal money primitives.
//!
//! Settlement amounts are stored at scale 2, per-unit prices and exchange
//! rates at scale 8. Narrowing always rounds half-even (`round_dp`'s
//! `MidpointNearestEven` default). Nothing here accepts floating point.

use rust_decimal::Decimal;

use crate::core::error::{AppError, Result};

/// Scale for settlement amounts (invoice totals, payments, refunds)
pub const MONEY_SCALE: u32 = 2;

/// Scale for per-unit prices and exchange rates
pub const RATE_SCALE: u32 = 8;

/// Tolerance for cross-field monetary consistency checks
pub fn money_tolerance() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

/// Round to settlement precision (scale 2, half-even)
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp(MONEY_SCALE)
}

/// Round to rate precision (scale 8, half-even)
pub fn round_rate(rate: Decimal) -> Decimal {
    rate.round_dp(RATE_SCALE)
}

/// Multiply a quantity by a scale-8 unit price and narrow to settlement scale
pub fn mul_to_money(quantity: Decimal, unit_price: Decimal) -> Decimal {
    round_money(quantity * unit_price)
}

/// Parse a canonical decimal string
///
/// Rejects anything `rust_decimal` cannot represent exactly; float literals
/// never enter the money path.
pub fn parse_money(s: &str) -> Result<Decimal> {
    let parsed: Decimal = s
        .trim()
        .parse()
        .map_err(|e| AppError::validation(format!("Invalid decimal '{}': {}", s, e)))?;
    Ok(round_money(parsed))
}

/// Format a settlement amount canonically with exactly two fraction digits
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}

/// Absolute difference of two amounts
pub fn abs_diff(a: Decimal, b: Decimal) -> Decimal {
    (a - b).abs()
}

/// Whether two amounts agree within the settlement tolerance
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    abs_diff(a, b) <= money_tolerance()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_even() {
        // Ties go to the even neighbour
        assert_eq!(round_money(dec!(2.675)), dec!(2.68));
        assert_eq!(round_money(dec!(2.665)), dec!(2.66));
        assert_eq!(round_money(dec!(2.125)), dec!(2.12));
        assert_eq!(round_money(dec!(2.135)), dec!(2.14));
    }

    #[test]
    fn test_mul_to_money_narrows() {
        // 1000 * 0.00100000 = 1.00
        assert_eq!(mul_to_money(dec!(1000), dec!(0.00100000)), dec!(1.00));
        // 333 * 0.00333333 = 1.10999889 -> 1.11
        assert_eq!(mul_to_money(dec!(333), dec!(0.00333333)), dec!(1.11));
    }

    #[test]
    fn test_parse_and_format_round_trip() {
        let parsed = parse_money("118.00").unwrap();
        assert_eq!(parsed, dec!(118.00));
        assert_eq!(format_money(parsed), "118.00");
        assert_eq!(format_money(dec!(7)), "7.00");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_money("12,50").is_err());
        assert!(parse_money("abc").is_err());
    }

    #[test]
    fn test_tolerance() {
        assert!(within_tolerance(dec!(10.00), dec!(10.01)));
        assert!(!within_tolerance(dec!(10.00), dec!(10.02)));
    }
}
