use chrono::NaiveDate;
use sqlx::PgPool;

use crate::core::Result;
use crate::modules::reconciliation::models::{ReconciliationRun, SourcePair};

/// Repository for reconciliation run records
pub struct ReconciliationRepository {
    pool: PgPool,
}

impl ReconciliationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record one scope outcome. Re-running a loop for the same day replaces
    /// the previous row for that (source pair, scope, date).
    pub async fn record(&self, run: &ReconciliationRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_runs (
                id, source_pair, scope, run_date, expected_count, actual_count,
                status, detail, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_pair, scope, run_date) DO UPDATE SET
                expected_count = EXCLUDED.expected_count,
                actual_count = EXCLUDED.actual_count,
                status = EXCLUDED.status,
                detail = EXCLUDED.detail,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(run.id)
        .bind(run.source_pair.to_string())
        .bind(&run.scope)
        .bind(run.run_date)
        .bind(run.expected_count)
        .bind(run.actual_count)
        .bind(run.status.to_string())
        .bind(&run.detail)
        .bind(run.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Runs for one source pair and day, newest first
    pub async fn list_for_date(
        &self,
        source_pair: SourcePair,
        run_date: NaiveDate,
    ) -> Result<Vec<ReconciliationRun>> {
        let runs = sqlx::query_as::<_, ReconciliationRun>(
            r#"
            SELECT id, source_pair, scope, run_date, expected_count, actual_count,
                   status, detail, created_at
            FROM reconciliation_runs
            WHERE source_pair = $1 AND run_date = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(source_pair.to_string())
        .bind(run_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }
}
