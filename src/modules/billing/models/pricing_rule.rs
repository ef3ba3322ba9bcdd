use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// Time-bounded mapping from (metric, unit) to a per-unit price.
///
/// Rules with `org_id` set shadow global rules (`org_id` null). Two active
/// rules for the same (org, metric, unit) must not overlap in time; the
/// repository refuses overlapping inserts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PricingRule {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub metric: String,
    pub unit: String,
    pub price_per_unit: Decimal,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub active: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PricingRule {
    pub fn validate(&self) -> Result<()> {
        if self.metric.trim().is_empty() {
            return Err(AppError::validation("Pricing rule metric cannot be empty"));
        }
        if self.unit.trim().is_empty() {
            return Err(AppError::validation("Pricing rule unit cannot be empty"));
        }
        if self.price_per_unit < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "price_per_unit must be non-negative, got {}",
                self.price_per_unit
            )));
        }
        if let Some(to) = self.effective_to {
            if to <= self.effective_from {
                return Err(AppError::validation(
                    "effective_to must be after effective_from",
                ));
            }
        }
        Ok(())
    }

    /// Whether this rule covers the given instant.
    ///
    /// The window is half-open: a rule whose `effective_to` equals the
    /// billing-period start does not apply, one whose `effective_from`
    /// equals it does.
    pub fn applies_at(&self, at: DateTime<Utc>) -> bool {
        self.active
            && self.effective_from <= at
            && self.effective_to.map_or(true, |to| to > at)
    }

    /// Whether this rule prices the given aggregate key
    pub fn matches(&self, metric: &str, unit: &str) -> bool {
        self.metric == metric && self.unit == unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn rule(from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> PricingRule {
        PricingRule {
            id: Uuid::new_v4(),
            org_id: None,
            metric: "api_calls".to_string(),
            unit: "count".to_string(),
            price_per_unit: dec!(0.00100000),
            currency: Currency::INR,
            effective_from: from,
            effective_to: to,
            active: true,
            metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_applies_at_half_open_window() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let r = rule(start, Some(end));
        // effective_from == instant: included
        assert!(r.applies_at(start));
        // effective_to == instant: excluded
        assert!(!r.applies_at(end));
        assert!(r.applies_at(end - chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_inactive_rule_never_applies() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut r = rule(start, None);
        r.active = false;
        assert!(!r.applies_at(start + chrono::Duration::days(1)));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let r = rule(start, Some(start));
        assert!(r.validate().is_err());
    }
}
