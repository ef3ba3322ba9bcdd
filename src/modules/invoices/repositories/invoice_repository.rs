use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{Invoice, InvoiceLineItem, InvoiceStatus};

const INVOICE_COLUMNS: &str = r#"
    id, org_id, number, status, subtotal, tax, discount, total, currency,
    billing_period_start, billing_period_end, due_date, month, year,
    finalized_at, issued_at, paid_at, pdf_url, template_id,
    original_currency, exchange_rate, metadata, created_at, updated_at
"#;

const LINE_ITEM_COLUMNS: &str = r#"
    id, invoice_id, line_number, project_id, description, metric,
    quantity, unit, unit_price, total, currency
"#;

/// Repository for invoice and line-item database operations.
///
/// All writes that must compose with other entities (payments, audit rows)
/// take an explicit transaction; the finalized-invoice triggers are the last
/// line of defence behind every statement here.
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an invoice and its line items inside the caller's transaction
    pub async fn create_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        invoice: &Invoice,
    ) -> Result<()> {
        invoice.validate()?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, org_id, number, status, subtotal, tax, discount, total, currency,
                billing_period_start, billing_period_end, due_date, month, year,
                finalized_at, issued_at, paid_at, pdf_url, template_id,
                original_currency, exchange_rate, metadata, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9,
                $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.org_id)
        .bind(&invoice.number)
        .bind(invoice.status.to_string())
        .bind(invoice.subtotal)
        .bind(invoice.tax)
        .bind(invoice.discount)
        .bind(invoice.total)
        .bind(invoice.currency.to_string())
        .bind(invoice.billing_period_start)
        .bind(invoice.billing_period_end)
        .bind(invoice.due_date)
        .bind(invoice.month)
        .bind(invoice.year)
        .bind(invoice.finalized_at)
        .bind(invoice.issued_at)
        .bind(invoice.paid_at)
        .bind(&invoice.pdf_url)
        .bind(invoice.template_id)
        .bind(&invoice.original_currency)
        .bind(invoice.exchange_rate)
        .bind(&invoice.metadata)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::conflict(format!(
                        "An invoice already exists for org {} in {}-{:02}",
                        invoice.org_id, invoice.year, invoice.month
                    ));
                }
            }
            AppError::Database(e)
        })?;

        for line in &invoice.line_items {
            sqlx::query(
                r#"
                INSERT INTO invoice_line_items (
                    id, invoice_id, line_number, project_id, description, metric,
                    quantity, unit, unit_price, total, currency
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(line.id)
            .bind(line.invoice_id)
            .bind(line.line_number)
            .bind(line.project_id)
            .bind(&line.description)
            .bind(&line.metric)
            .bind(line.quantity)
            .bind(&line.unit)
            .bind(line.unit_price)
            .bind(line.total)
            .bind(line.currency.to_string())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// The non-cancelled invoice for a billing month, if any.
    ///
    /// Backed by the partial unique index; used to re-check inside the
    /// generation transaction.
    pub async fn find_for_period_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        org_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM invoices
            WHERE org_id = $1 AND month = $2 AND year = $3 AND status <> 'cancelled'
            "#,
        )
        .bind(org_id)
        .bind(month as i32)
        .bind(year)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(id)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(mut invoice) = invoice else {
            return Ok(None);
        };

        invoice.line_items = self.fetch_line_items(id).await?;
        Ok(Some(invoice))
    }

    /// Fetch with a row lock for payment processing. Must run inside the
    /// caller's transaction; serialises webhook and retry mutations against
    /// each other.
    pub async fn find_by_id_for_update(
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> Result<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE id = $1 FOR UPDATE",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(invoice)
    }

    async fn fetch_line_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceLineItem>> {
        let lines = sqlx::query_as::<_, InvoiceLineItem>(&format!(
            "SELECT {} FROM invoice_line_items WHERE invoice_id = $1 ORDER BY line_number",
            LINE_ITEM_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Conditional draft -> finalized transition.
    ///
    /// Returns false when the invoice was not in draft (caller distinguishes
    /// not-found from already-finalized).
    pub async fn finalize_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        finalized_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'finalized', finalized_at = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            "#,
        )
        .bind(id)
        .bind(finalized_at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Conditional transition to paid; a no-op when the invoice is already
    /// paid, so replayed capture webhooks keep the first `paid_at`.
    pub async fn mark_paid_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'paid', paid_at = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('finalized', 'sent', 'overdue')
            "#,
        )
        .bind(id)
        .bind(paid_at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Paid -> refunded, driven by the refund engine
    pub async fn mark_refunded_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'refunded', updated_at = NOW()
            WHERE id = $1 AND status = 'paid'
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Finalized -> sent, stamping `issued_at`
    pub async fn mark_sent(&self, id: Uuid, issued_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = 'sent', issued_at = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'finalized'
            "#,
        )
        .bind(id)
        .bind(issued_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Invoices per organisation, newest first
    pub async fn list_for_org(&self, org_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE org_id = $1 ORDER BY year DESC, month DESC LIMIT $2 OFFSET $3",
            INVOICE_COLUMNS
        ))
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Current status only, for cheap state checks
    pub async fn fetch_status(&self, id: Uuid) -> Result<Option<InvoiceStatus>> {
        let status: Option<String> = sqlx::query_scalar(
            r#"
            SELECT status FROM invoices WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        status
            .map(|s| {
                s.parse::<InvoiceStatus>()
                    .map_err(|e| AppError::internal(format!("Invalid status in database: {}", e)))
            })
            .transpose()
    }
}
