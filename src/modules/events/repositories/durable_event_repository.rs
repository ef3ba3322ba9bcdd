use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::events::models::UsageEvent;

/// Rows per multi-value INSERT; keeps bind-parameter counts bounded
const INSERT_SUB_BATCH: usize = 100;

/// Partition of a migration batch after the conflict-skipping insert
#[derive(Debug, Default)]
pub struct InsertOutcome {
    /// Ids actually written this call
    pub inserted: Vec<Uuid>,
    /// Ids whose idempotency key the store already held
    pub skipped: Vec<Uuid>,
}

/// The durable, authoritative event table.
///
/// The unique idempotency key provides at-most-once semantics for the
/// at-least-once hot-store feed.
pub struct DurableEventRepository {
    pool: PgPool,
}

impl DurableEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a batch, skipping events whose idempotency key already exists.
    ///
    /// The returned `inserted` set is authoritative: it is exactly the ids the
    /// INSERT reported back, and the complement of the submitted ids is
    /// `skipped`. Work proceeds in sub-batches of at most 100 rows, each its
    /// own statement, so a mid-run failure preserves the sub-batches already
    /// committed. A failing sub-batch is replayed row by row to name the
    /// faulty event before the error is surfaced.
    pub async fn insert_events(&self, events: &[UsageEvent]) -> Result<InsertOutcome> {
        let mut outcome = InsertOutcome::default();

        for chunk in events.chunks(INSERT_SUB_BATCH) {
            let inserted = match self.insert_chunk(chunk).await {
                Ok(ids) => ids,
                Err(batch_err) => {
                    tracing::warn!(
                        error = %batch_err,
                        rows = chunk.len(),
                        "Batch insert failed, retrying row by row"
                    );
                    self.insert_rows_individually(chunk, &mut outcome).await?;
                    continue;
                }
            };

            let inserted_set: HashSet<Uuid> = inserted.iter().copied().collect();
            for event in chunk {
                if inserted_set.contains(&event.id) {
                    outcome.inserted.push(event.id);
                } else {
                    outcome.skipped.push(event.id);
                }
            }
        }

        Ok(outcome)
    }

    async fn insert_chunk(&self, chunk: &[UsageEvent]) -> Result<Vec<Uuid>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO usage_events (id, org_id, project_id, metric, value, unit, ts, \
             idempotency_key, metadata, ingested_at, processed_at) ",
        );

        builder.push_values(chunk, |mut b, event| {
            b.push_bind(event.id)
                .push_bind(event.org_id)
                .push_bind(event.project_id)
                .push_bind(&event.metric)
                .push_bind(event.value)
                .push_bind(&event.unit)
                .push_bind(event.ts)
                .push_bind(&event.idempotency_key)
                .push_bind(&event.metadata)
                .push_bind(event.ingested_at)
                .push_bind(event.processed_at);
        });

        builder.push(" ON CONFLICT (idempotency_key) DO NOTHING RETURNING id");

        let ids: Vec<Uuid> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    /// Fallback path: single-row inserts so the faulty row is identified.
    /// The first row error aborts the run.
    async fn insert_rows_individually(
        &self,
        chunk: &[UsageEvent],
        outcome: &mut InsertOutcome,
    ) -> Result<()> {
        for event in chunk {
            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"
                INSERT INTO usage_events (
                    id, org_id, project_id, metric, value, unit, ts,
                    idempotency_key, metadata, ingested_at, processed_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (idempotency_key) DO NOTHING
                RETURNING id
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
            .bind(event.processed_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::internal(format!(
                    "durable insert failed for event {} (key '{}'): {}",
                    event.id, event.idempotency_key, e
                ))
            })?;

            match inserted {
                Some(id) => outcome.inserted.push(id),
                None => outcome.skipped.push(event.id),
            }
        }

        Ok(())
    }

    /// Sum and count of event values for one aggregate key inside a month
    /// window. Used by reconciliation to cross-check stored aggregates.
    #[allow(clippy::too_many_arguments)]
    pub async fn sum_for_window(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        metric: &str,
        unit: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<(Decimal, i64)> {
        let row: (Option<Decimal>, i64) = sqlx::query_as(
            r#"
            SELECT SUM(value), COUNT(*)
            FROM usage_events
            WHERE org_id = $1 AND project_id = $2 AND metric = $3 AND unit = $4
              AND ts >= $5 AND ts < $6
            "#,
        )
        .bind(org_id)
        .bind(project_id)
        .bind(metric)
        .bind(unit)
        .bind(window_start)
        .bind(window_end)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.0.unwrap_or(Decimal::ZERO), row.1))
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
            FROM usage_events
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
