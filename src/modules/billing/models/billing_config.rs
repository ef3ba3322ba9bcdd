use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// Billing cadence for an organisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum BillingCycle {
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "yearly")]
    Yearly,
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingCycle::Monthly => write!(f, "monthly"),
            BillingCycle::Yearly => write!(f, "yearly"),
        }
    }
}

/// Per-organisation billing knobs: flat tax rate, settlement currency,
/// payment terms and the optional minimum-charge fallback amount.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillingConfig {
    pub org_id: Uuid,
    pub tax_rate: Decimal,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
    #[sqlx(try_from = "String")]
    pub cycle: BillingCycle,
    pub payment_terms_days: i32,
    pub min_charge_enabled: bool,
    pub min_charge_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE {
            return Err(AppError::validation(format!(
                "tax_rate must be within [0, 1], got {}",
                self.tax_rate
            )));
        }
        if self.payment_terms_days <= 0 {
            return Err(AppError::validation(format!(
                "payment_terms_days must be positive, got {}",
                self.payment_terms_days
            )));
        }
        if let Some(amount) = self.min_charge_amount {
            if amount < Decimal::ZERO {
                return Err(AppError::validation(format!(
                    "min_charge_amount must be non-negative, got {}",
                    amount
                )));
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for BillingCycle {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        match s.as_str() {
            "monthly" => Ok(BillingCycle::Monthly),
            "yearly" => Ok(BillingCycle::Yearly),
            other => Err(format!("Invalid billing cycle: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(tax_rate: Decimal, terms: i32) -> BillingConfig {
        BillingConfig {
            org_id: Uuid::new_v4(),
            tax_rate,
            currency: Currency::INR,
            cycle: BillingCycle::Monthly,
            payment_terms_days: terms,
            min_charge_enabled: false,
            min_charge_amount: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_accepts_bounds() {
        assert!(config(Decimal::ZERO, 30).validate().is_ok());
        assert!(config(Decimal::ONE, 1).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(config(dec!(1.01), 30).validate().is_err());
        assert!(config(dec!(-0.1), 30).validate().is_err());
        assert!(config(dec!(0.18), 0).validate().is_err());
    }
}
