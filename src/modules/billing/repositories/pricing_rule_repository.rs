use sqlx::PgPool;
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::billing::models::PricingRule;

/// Repository for pricing rule database operations
pub struct PricingRuleRepository {
    pool: PgPool,
}

impl PricingRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a rule, refusing temporal overlap with an existing active rule
    /// for the same (org, metric, unit).
    ///
    /// An open-ended window (`effective_to` null) overlaps everything after
    /// its start.
    pub async fn create(&self, rule: &PricingRule) -> Result<()> {
        rule.validate()?;

        let mut tx = self.pool.begin().await?;

        let overlapping: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM pricing_rules
            WHERE org_id IS NOT DISTINCT FROM $1
              AND metric = $2 AND unit = $3 AND active = TRUE
              AND effective_from < COALESCE($5, 'infinity'::timestamptz)
              AND COALESCE(effective_to, 'infinity'::timestamptz) > $4
            LIMIT 1
            "#,
        )
        .bind(rule.org_id)
        .bind(&rule.metric)
        .bind(&rule.unit)
        .bind(rule.effective_from)
        .bind(rule.effective_to)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = overlapping {
            tx.rollback().await?;
            return Err(AppError::conflict(format!(
                "Pricing rule overlaps active rule {} for ({}, {})",
                existing, rule.metric, rule.unit
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO pricing_rules (
                id, org_id, metric, unit, price_per_unit, currency,
                effective_from, effective_to, active, metadata, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(rule.id)
        .bind(rule.org_id)
        .bind(&rule.metric)
        .bind(&rule.unit)
        .bind(rule.price_per_unit)
        .bind(rule.currency.to_string())
        .bind(rule.effective_from)
        .bind(rule.effective_to)
        .bind(rule.active)
        .bind(&rule.metadata)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Rules visible to an organisation: its own plus the global set
    pub async fn list_for_org(&self, org_id: Uuid) -> Result<Vec<PricingRule>> {
        let rules = sqlx::query_as::<_, PricingRule>(
            r#"
            SELECT id, org_id, metric, unit, price_per_unit, currency,
                   effective_from, effective_to, active, metadata, created_at, updated_at
            FROM pricing_rules
            WHERE (org_id = $1 OR org_id IS NULL) AND active = TRUE
            ORDER BY effective_from DESC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE pricing_rules
            SET active = FALSE, updated_at = NOW()
            WHERE id = $1 AND active = TRUE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
