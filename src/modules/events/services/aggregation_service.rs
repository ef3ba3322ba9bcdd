use sqlx::PgPool;
use uuid::Uuid;

use crate::core::{BillingPeriod, Result};
use crate::modules::events::models::{validate_billing_month, UsageAggregate};

/// Monthly rollup of durable events into `usage_aggregates`.
///
/// The rollup is a single upsert computed from the event table, so re-running
/// it for the same month always lands on the same row values. Sums are
/// commutative, which is why cross-row ingestion order never matters here.
pub struct AggregationService {
    pool: PgPool,
}

impl AggregationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Roll up one (org, project, metric, unit) key for a month
    #[allow(clippy::too_many_arguments)]
    pub async fn aggregate(
        &self,
        org_id: Uuid,
        project_id: Uuid,
        metric: &str,
        unit: &str,
        month: u32,
        year: i32,
    ) -> Result<Option<UsageAggregate>> {
        validate_billing_month(month as i32, year)?;
        let period = BillingPeriod::of_month(month, year)?;

        let aggregate = sqlx::query_as::<_, UsageAggregate>(
            r#"
            INSERT INTO usage_aggregates (
                id, org_id, project_id, metric, unit, month, year,
                total_value, event_count, updated_at
            )
            SELECT gen_random_uuid(), org_id, project_id, metric, unit, $5, $6,
                   SUM(value), COUNT(*), NOW()
            FROM usage_events
            WHERE org_id = $1 AND project_id = $2 AND metric = $3 AND unit = $4
              AND ts >= $7 AND ts < $8
            GROUP BY org_id, project_id, metric, unit
            ON CONFLICT (org_id, project_id, metric, unit, month, year)
            DO UPDATE SET
                total_value = EXCLUDED.total_value,
                event_count = EXCLUDED.event_count,
                updated_at = NOW()
            RETURNING id, org_id, project_id, metric, unit, month, year,
                      total_value, event_count, updated_at
            "#,
        )
        .bind(org_id)
        .bind(project_id)
        .bind(metric)
        .bind(unit)
        .bind(month as i32)
        .bind(year)
        .bind(period.start)
        .bind(period.end_exclusive)
        .fetch_optional(&self.pool)
        .await?;

        Ok(aggregate)
    }

    /// Roll up every key an organisation touched in the month.
    ///
    /// One statement covers all (project, metric, unit) groups; returns the
    /// refreshed rows.
    pub async fn aggregate_month(
        &self,
        org_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<Vec<UsageAggregate>> {
        validate_billing_month(month as i32, year)?;
        let period = BillingPeriod::of_month(month, year)?;

        let aggregates = sqlx::query_as::<_, UsageAggregate>(
            r#"
            INSERT INTO usage_aggregates (
                id, org_id, project_id, metric, unit, month, year,
                total_value, event_count, updated_at
            )
            SELECT gen_random_uuid(), org_id, project_id, metric, unit, $2, $3,
                   SUM(value), COUNT(*), NOW()
            FROM usage_events
            WHERE org_id = $1 AND ts >= $4 AND ts < $5
            GROUP BY org_id, project_id, metric, unit
            ON CONFLICT (org_id, project_id, metric, unit, month, year)
            DO UPDATE SET
                total_value = EXCLUDED.total_value,
                event_count = EXCLUDED.event_count,
                updated_at = NOW()
            RETURNING id, org_id, project_id, metric, unit, month, year,
                      total_value, event_count, updated_at
            "#,
        )
        .bind(org_id)
        .bind(month as i32)
        .bind(year)
        .bind(period.start)
        .bind(period.end_exclusive)
        .fetch_all(&self.pool)
        .await?;

        tracing::info!(
            org_id = %org_id,
            month = month,
            year = year,
            keys = aggregates.len(),
            "Monthly usage rollup refreshed"
        );

        Ok(aggregates)
    }

    /// Stored aggregates for an organisation's billing month
    pub async fn list_for_month(
        &self,
        org_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<Vec<UsageAggregate>> {
        let aggregates = sqlx::query_as::<_, UsageAggregate>(
            r#"
            SELECT id, org_id, project_id, metric, unit, month, year,
                   total_value, event_count, updated_at
            FROM usage_aggregates
            WHERE org_id = $1 AND month = $2 AND year = $3
            ORDER BY project_id, metric, unit
            "#,
        )
        .bind(org_id)
        .bind(month as i32)
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        Ok(aggregates)
    }

    /// Every aggregate row for a month across organisations, for reconciliation
    pub async fn list_all_for_month(&self, month: u32, year: i32) -> Result<Vec<UsageAggregate>> {
        let aggregates = sqlx::query_as::<_, UsageAggregate>(
            r#"
            SELECT id, org_id, project_id, metric, unit, month, year,
                   total_value, event_count, updated_at
            FROM usage_aggregates
            WHERE month = $1 AND year = $2
            ORDER BY org_id, project_id, metric, unit
            "#,
        )
        .bind(month as i32)
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        Ok(aggregates)
    }
}
