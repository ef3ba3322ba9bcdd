use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::core::{Currency, Result};
use crate::modules::exchange::models::ExchangeRate;

/// Read-only access to the historical exchange-rate table
pub struct ExchangeRateRepository {
    pool: PgPool,
}

impl ExchangeRateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The (base, target) row in effect at `at`, most recent first
    pub async fn find_rate(
        &self,
        base: Currency,
        target: Currency,
        at: DateTime<Utc>,
    ) -> Result<Option<ExchangeRate>> {
        let rate = sqlx::query_as::<_, ExchangeRate>(
            r#"
            SELECT id, base, target, rate, effective_from, effective_to, created_at
            FROM exchange_rates
            WHERE base = $1 AND target = $2
              AND effective_from <= $3
              AND (effective_to IS NULL OR effective_to > $3)
            ORDER BY effective_from DESC
            LIMIT 1
            "#,
        )
        .bind(base.to_string())
        .bind(target.to_string())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rate)
    }
}
