use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::Result;
use crate::modules::payments::models::{Payment, PaymentStatus, RetryAttempt};

const PAYMENT_COLUMNS: &str = r#"
    id, org_id, invoice_id, number, gateway_order_id, gateway_payment_id,
    amount, currency, status, method, paid_at, reconciled_at,
    refund_amount, refunded_at, retry_count, max_retries,
    next_retry_at, last_retry_at, retry_history, metadata,
    created_at, updated_at
"#;

/// Repository for payment database operations.
///
/// Status-changing statements assert the prior state in their WHERE clause
/// so the webhook path and the retry scheduler compose without lost updates.
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        payment: &Payment,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, org_id, invoice_id, number, gateway_order_id, gateway_payment_id,
                amount, currency, status, method, paid_at, reconciled_at,
                refund_amount, refunded_at, retry_count, max_retries,
                next_retry_at, last_retry_at, retry_history, metadata,
                created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
            )
            "#,
        )
        .bind(payment.id)
        .bind(payment.org_id)
        .bind(payment.invoice_id)
        .bind(&payment.number)
        .bind(&payment.gateway_order_id)
        .bind(&payment.gateway_payment_id)
        .bind(payment.amount)
        .bind(payment.currency.to_string())
        .bind(payment.status.to_string())
        .bind(&payment.method)
        .bind(payment.paid_at)
        .bind(payment.reconciled_at)
        .bind(payment.refund_amount)
        .bind(payment.refunded_at)
        .bind(payment.retry_count)
        .bind(payment.max_retries)
        .bind(payment.next_retry_at)
        .bind(payment.last_retry_at)
        .bind(&payment.retry_history)
        .bind(&payment.metadata)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Locate the payment for a gateway order, locked for webhook processing
    pub async fn find_by_gateway_order_for_update(
        tx: &mut Transaction<'static, Postgres>,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE gateway_order_id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(gateway_order_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(payment)
    }

    pub async fn find_by_id_for_update(
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(payment)
    }

    /// Apply a webhook-driven state change inside the caller's transaction
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_webhook_update_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        status: PaymentStatus,
        gateway_payment_id: &str,
        method: Option<&str>,
        paid_at: Option<DateTime<Utc>>,
        next_retry_at: Option<DateTime<Utc>>,
        reconciled_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET status = $2,
                gateway_payment_id = $3,
                method = COALESCE($4, method),
                paid_at = COALESCE($5, paid_at),
                next_retry_at = $6,
                reconciled_at = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(gateway_payment_id)
        .bind(method)
        .bind(paid_at)
        .bind(next_retry_at)
        .bind(reconciled_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Failed payments whose next retry is due
    pub async fn find_due_retries(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {}
            FROM payments
            WHERE status = 'failed'
              AND retry_count < max_retries
              AND next_retry_at IS NOT NULL
              AND next_retry_at <= $1
            ORDER BY next_retry_at
            LIMIT $2
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Record one retry attempt.
    ///
    /// Conditional on the payment still being failed with the retry count
    /// the scheduler read; a webhook landing in between makes this a no-op.
    /// The history entry is appended, never rewritten.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_retry_attempt(
        &self,
        id: Uuid,
        expected_retry_count: i32,
        new_gateway_order_id: Option<&str>,
        attempt: &RetryAttempt,
        next_retry_at: Option<DateTime<Utc>>,
        final_failure: bool,
    ) -> Result<bool> {
        let entry = serde_json::to_value(attempt)?;

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET retry_count = retry_count + 1,
                last_retry_at = $4,
                gateway_order_id = COALESCE($3, gateway_order_id),
                retry_history = retry_history || jsonb_build_array($5::jsonb),
                next_retry_at = $6,
                metadata = CASE
                    WHEN $7 THEN COALESCE(metadata, '{}'::jsonb)
                        || jsonb_build_object('final_failure', true)
                    ELSE metadata
                END,
                updated_at = NOW()
            WHERE id = $1 AND status = 'failed' AND retry_count = $2
            "#,
        )
        .bind(id)
        .bind(expected_retry_count)
        .bind(new_gateway_order_id)
        .bind(attempt.at)
        .bind(&entry)
        .bind(next_retry_at)
        .bind(final_failure)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Accumulate a processed refund on the payment row.
    ///
    /// Sets the cascaded status: `refunded` once the full amount is
    /// returned, `partially_refunded` otherwise. Returns the new
    /// refund_amount when the guarded update applied.
    pub async fn apply_refund_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        amount: Decimal,
        refunded_at: DateTime<Utc>,
    ) -> Result<Option<(Decimal, PaymentStatus)>> {
        let row: Option<(Decimal, String)> = sqlx::query_as(
            r#"
            UPDATE payments
            SET refund_amount = refund_amount + $2,
                status = CASE
                    WHEN refund_amount + $2 >= amount THEN 'refunded'
                    ELSE 'partially_refunded'
                END,
                refunded_at = $3,
                updated_at = NOW()
            WHERE id = $1 AND refund_amount + $2 <= amount
            RETURNING refund_amount, status
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(refunded_at)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(|(refund_amount, status)| {
            status
                .parse::<PaymentStatus>()
                .map(|status| (refund_amount, status))
                .map_err(crate::core::AppError::internal)
        })
        .transpose()
    }

    /// Payment counts per (org, day), for reconciliation
    pub async fn daily_counts(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, i64)>> {
        let rows = sqlx::query_as(
            r#"
            SELECT org_id, COUNT(*)
            FROM payments
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY org_id
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Payments still lacking a gateway payment id: the unreconciled view
    pub async fn daily_unreconciled_counts(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, i64)>> {
        let rows = sqlx::query_as(
            r#"
            SELECT org_id, COUNT(*)
            FROM payments
            WHERE created_at >= $1 AND created_at < $2
              AND gateway_payment_id IS NULL
            GROUP BY org_id
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
