use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::Currency;

/// Historical exchange rate row.
///
/// At most one row per (base, target) is open-ended (`effective_to` null);
/// that is the active rate. The table is populated by an external sync job
/// and consumed read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExchangeRate {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub base: Currency,
    #[sqlx(try_from = "String")]
    pub target: Currency,
    pub rate: Decimal,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// Half-open `[effective_from, effective_to)` containment
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.effective_from <= at && self.effective_to.map_or(true, |to| to > at)
    }
}

/// Pure selection over candidate rows: the covering row with the most recent
/// `effective_from` wins. Factored out of the repository so the tie-break is
/// testable without a database.
pub fn select_rate(rows: &[ExchangeRate], at: DateTime<Utc>) -> Option<&ExchangeRate> {
    rows.iter()
        .filter(|row| row.covers(at))
        .max_by_key(|row| row.effective_from)
}
