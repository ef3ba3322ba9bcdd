use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::Result;
use crate::modules::events::models::UsageEvent;

/// Outcome of an ingestion write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    New,
    Duplicate,
}

/// The hot event store: an append-mostly buffer between ingestion and the
/// durable store, optimised for write throughput and short scans.
///
/// `processed_at` is the migration watermark; purge never touches rows that
/// still lack one.
pub struct HotEventRepository {
    pool: PgPool,
}

impl HotEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an event; a repeated idempotency key is a silent no-op
    pub async fn put(&self, event: &UsageEvent) -> Result<PutOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO hot_usage_events (
                id, org_id, project_id, metric, value, unit, ts,
                idempotency_key, metadata, ingested_at, processed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NULL)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(event.id)
        .bind(event.org_id)
        .bind(event.project_id)
        .bind(&event.metric)
        .bind(event.value)
        .bind(&event.unit)
        .bind(event.ts)
        .bind(&event.idempotency_key)
        .bind(&event.metadata)
        .bind(event.ingested_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(PutOutcome::Duplicate)
        } else {
            Ok(PutOutcome::New)
        }
    }

    /// Oldest unprocessed events first, the migration worker's read side
    pub async fn fetch_unprocessed(&self, limit: i64) -> Result<Vec<UsageEvent>> {
        let events = sqlx::query_as::<_, UsageEvent>(
            r#"
            SELECT id, org_id, project_id, metric, value, unit, ts,
                   idempotency_key, metadata, ingested_at, processed_at
            FROM hot_usage_events
            WHERE processed_at IS NULL
            ORDER BY ingested_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Batch-stamp the migration watermark
    pub async fn mark_processed(&self, ids: &[Uuid], ts: DateTime<Utc>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE hot_usage_events
            SET processed_at = $1
            WHERE id = ANY($2)
            "#,
        )
        .bind(ts)
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete rows processed before `before`. In-flight rows are never touched.
    pub async fn purge_processed_before(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM hot_usage_events
            WHERE processed_at IS NOT NULL AND processed_at < $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Daily event counts per (org, project, metric), for reconciliation
    pub async fn daily_counts(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, Uuid, String, i64)>> {
        let rows = sqlx::query_as(
            r#"
            SELECT org_id, project_id, metric, COUNT(*)
            FROM hot_usage_events
            WHERE ts >= $1 AND ts < $2
            GROUP BY org_id, project_id, metric
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
