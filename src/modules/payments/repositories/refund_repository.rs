use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::Result;
use crate::modules::payments::models::{Refund, RefundStatus};

const REFUND_COLUMNS: &str = r#"
    id, org_id, invoice_id, payment_id, number, gateway_refund_id,
    amount, currency, status, refund_type, reason, processed_at,
    created_at, updated_at
"#;

/// Repository for refund database operations
pub struct RefundRepository {
    pool: PgPool,
}

impl RefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, refund: &Refund) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, org_id, invoice_id, payment_id, number, gateway_refund_id,
                amount, currency, status, refund_type, reason, processed_at,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(refund.id)
        .bind(refund.org_id)
        .bind(refund.invoice_id)
        .bind(refund.payment_id)
        .bind(&refund.number)
        .bind(&refund.gateway_refund_id)
        .bind(refund.amount)
        .bind(refund.currency.to_string())
        .bind(refund.status.to_string())
        .bind(refund.refund_type.to_string())
        .bind(&refund.reason)
        .bind(refund.processed_at)
        .bind(refund.created_at)
        .bind(refund.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Refund>> {
        let refund = sqlx::query_as::<_, Refund>(&format!(
            "SELECT {} FROM refunds WHERE id = $1",
            REFUND_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(refund)
    }

    /// Locate the refund a gateway webhook refers to, locked for processing
    pub async fn find_by_gateway_refund_for_update(
        tx: &mut Transaction<'static, Postgres>,
        gateway_refund_id: &str,
    ) -> Result<Option<Refund>> {
        let refund = sqlx::query_as::<_, Refund>(&format!(
            "SELECT {} FROM refunds WHERE gateway_refund_id = $1 FOR UPDATE",
            REFUND_COLUMNS
        ))
        .bind(gateway_refund_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(refund)
    }

    /// Stamp the gateway's refund id after the outbound call
    pub async fn set_gateway_refund_id(&self, id: Uuid, gateway_refund_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE refunds
            SET gateway_refund_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(gateway_refund_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Conditional pending -> processed/failed/cancelled transition
    pub async fn transition_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        to: RefundStatus,
        processed_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE refunds
            SET status = $2, processed_at = COALESCE($3, processed_at), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(to.to_string())
        .bind(processed_at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
