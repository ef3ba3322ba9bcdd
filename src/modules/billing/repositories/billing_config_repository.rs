use sqlx::PgPool;
use uuid::Uuid;

use crate::core::Result;
use crate::modules::billing::models::BillingConfig;

/// Repository for per-organisation billing configuration
pub struct BillingConfigRepository {
    pool: PgPool,
}

impl BillingConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, config: &BillingConfig) -> Result<()> {
        config.validate()?;

        sqlx::query(
            r#"
            INSERT INTO billing_configs (
                org_id, tax_rate, currency, cycle, payment_terms_days,
                min_charge_enabled, min_charge_amount, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (org_id) DO UPDATE SET
                tax_rate = EXCLUDED.tax_rate,
                currency = EXCLUDED.currency,
                cycle = EXCLUDED.cycle,
                payment_terms_days = EXCLUDED.payment_terms_days,
                min_charge_enabled = EXCLUDED.min_charge_enabled,
                min_charge_amount = EXCLUDED.min_charge_amount,
                updated_at = NOW()
            "#,
        )
        .bind(config.org_id)
        .bind(config.tax_rate)
        .bind(config.currency.to_string())
        .bind(config.cycle.to_string())
        .bind(config.payment_terms_days)
        .bind(config.min_charge_enabled)
        .bind(config.min_charge_amount)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_org(&self, org_id: Uuid) -> Result<Option<BillingConfig>> {
        let config = sqlx::query_as::<_, BillingConfig>(
            r#"
            SELECT org_id, tax_rate, currency, cycle, payment_terms_days,
                   min_charge_enabled, min_charge_amount, created_at, updated_at
            FROM billing_configs
            WHERE org_id = $1
            "#,
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }
}
