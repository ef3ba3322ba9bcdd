use sqlx::PgPool;
use uuid::Uuid;

use crate::core::Result;
use crate::modules::billing::models::MinimumChargeRule;

/// Repository for minimum-charge rule database operations
pub struct MinimumChargeRuleRepository {
    pool: PgPool,
}

impl MinimumChargeRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, rule: &MinimumChargeRule) -> Result<()> {
        rule.validate()?;

        sqlx::query(
            r#"
            INSERT INTO minimum_charge_rules (
                id, org_id, amount, currency, effective_from, effective_to,
                active, description, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(rule.id)
        .bind(rule.org_id)
        .bind(rule.amount)
        .bind(rule.currency.to_string())
        .bind(rule.effective_from)
        .bind(rule.effective_to)
        .bind(rule.active)
        .bind(&rule.description)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Rules visible to an organisation: its own plus the global set
    pub async fn list_for_org(&self, org_id: Uuid) -> Result<Vec<MinimumChargeRule>> {
        let rules = sqlx::query_as::<_, MinimumChargeRule>(
            r#"
            SELECT id, org_id, amount, currency, effective_from, effective_to,
                   active, description, created_at, updated_at
            FROM minimum_charge_rules
            WHERE (org_id = $1 OR org_id IS NULL) AND active = TRUE
            ORDER BY effective_from DESC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }
}
