use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// Configurable floor on a billing period's subtotal.
///
/// Resolved with the same org-specific-over-global precedence as pricing
/// rules.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MinimumChargeRule {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub active: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MinimumChargeRule {
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(AppError::validation(format!(
                "minimum charge amount must be positive, got {}",
                self.amount
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

    /// Same half-open effectiveness window as pricing rules
    pub fn applies_at(&self, at: DateTime<Utc>) -> bool {
        self.active
            && self.effective_from <= at
            && self.effective_to.map_or(true, |to| to > at)
    }
}
