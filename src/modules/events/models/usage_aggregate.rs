use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Result};

/// Materialised monthly sum of usage events for one
/// (org, project, metric, unit) key. Unique per month and year.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageAggregate {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub metric: String,
    pub unit: String,
    pub month: i32,
    pub year: i32,
    pub total_value: Decimal,
    pub event_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl UsageAggregate {
    pub fn validate(&self) -> Result<()> {
        validate_billing_month(self.month, self.year)?;
        if self.total_value < Decimal::ZERO {
            return Err(AppError::integrity(format!(
                "aggregate total_value must be non-negative, got {}",
                self.total_value
            )));
        }
        if self.event_count < 0 {
            return Err(AppError::integrity(format!(
                "aggregate event_count must be non-negative, got {}",
                self.event_count
            )));
        }
        Ok(())
    }
}

/// Shared month/year sanity check for aggregates and invoice generation
pub fn validate_billing_month(month: i32, year: i32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(AppError::validation(format!(
            "month must be in 1..=12, got {}",
            month
        )));
    }
    if year < 2020 {
        return Err(AppError::validation(format!(
            "year must be 2020 or later, got {}",
            year
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_billing_month() {
        assert!(validate_billing_month(1, 2024).is_ok());
        assert!(validate_billing_month(12, 2020).is_ok());
        assert!(validate_billing_month(0, 2024).is_err());
        assert!(validate_billing_month(13, 2024).is_err());
        assert!(validate_billing_month(6, 2019).is_err());
    }
}
