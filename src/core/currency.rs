use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported settlement currencies.
///
/// All four settle at scale 2; the gateway wire format uses minor units
/// (paise, cents) at a factor of 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
pub enum Currency {
    #[serde(rename = "INR")]
    INR,
    #[serde(rename = "USD")]
    USD,
    #[serde(rename = "EUR")]
    EUR,
    #[serde(rename = "GBP")]
    GBP,
}

impl Currency {
    /// Decimal scale for settlement amounts in this currency
    pub fn scale(&self) -> u32 {
        2
    }

    /// Minor units per major unit (paise per rupee, cents per dollar)
    pub fn minor_unit_factor(&self) -> i64 {
        100
    }

    /// Round an amount to this currency's settlement precision (half-even)
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp(self.scale())
    }

    /// Convert a settlement amount into gateway minor units
    ///
    /// Fails when the amount carries sub-minor-unit precision.
    pub fn to_minor_units(&self, amount: Decimal) -> Option<i64> {
        let scaled = amount * Decimal::from(self.minor_unit_factor());
        if scaled.fract().is_zero() {
            scaled.trunc().to_i64()
        } else {
            None
        }
    }

    /// Convert gateway minor units back to a settlement amount
    pub fn from_minor_units(&self, minor: i64) -> Decimal {
        Decimal::from(minor) / Decimal::from(self.minor_unit_factor())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::INR => write!(f, "INR"),
            Currency::USD => write!(f, "USD"),
            Currency::EUR => write!(f, "EUR"),
            Currency::GBP => write!(f, "GBP"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INR" => Ok(Currency::INR),
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scale() {
        assert_eq!(Currency::INR.scale(), 2);
        assert_eq!(Currency::USD.scale(), 2);
    }

    #[test]
    fn test_rounding_is_half_even() {
        assert_eq!(Currency::INR.round(dec!(10.005)), dec!(10.00));
        assert_eq!(Currency::INR.round(dec!(10.015)), dec!(10.02));
        assert_eq!(Currency::USD.round(dec!(1.567)), dec!(1.57));
    }

    #[test]
    fn test_minor_units_round_trip() {
        assert_eq!(Currency::INR.to_minor_units(dec!(118.00)), Some(11800));
        assert_eq!(Currency::INR.to_minor_units(dec!(0.01)), Some(1));
        assert_eq!(Currency::INR.from_minor_units(11800), dec!(118.00));
    }

    #[test]
    fn test_minor_units_rejects_sub_minor_precision() {
        assert_eq!(Currency::INR.to_minor_units(dec!(1.005)), None);
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("INR".parse::<Currency>().unwrap(), Currency::INR);
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert!("XAU".parse::<Currency>().is_err());
    }
}
