use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::{BillingPeriod, Result};
use crate::modules::events::repositories::{DurableEventRepository, HotEventRepository};
use crate::modules::events::services::AggregationService;
use crate::modules::payments::repositories::PaymentRepository;
use crate::modules::reconciliation::models::{ReconciliationRun, SourcePair};
use crate::modules::reconciliation::repositories::ReconciliationRepository;

/// Summary of one reconciliation sweep
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconciliationReport {
    pub scopes: usize,
    pub reconciled: usize,
    pub discrepancies: usize,
    pub errors: usize,
}

/// The three audit loops over the pipeline's data movements.
///
/// Every loop writes one run row per scope and keeps going past individual
/// scope failures; a failed scope becomes an `error` row rather than an
/// aborted sweep.
pub struct ReconciliationService {
    hot: Arc<HotEventRepository>,
    durable: Arc<DurableEventRepository>,
    aggregation: Arc<AggregationService>,
    payments: Arc<PaymentRepository>,
    runs: Arc<ReconciliationRepository>,
}

impl ReconciliationService {
    pub fn new(
        hot: Arc<HotEventRepository>,
        durable: Arc<DurableEventRepository>,
        aggregation: Arc<AggregationService>,
        payments: Arc<PaymentRepository>,
        runs: Arc<ReconciliationRepository>,
    ) -> Self {
        Self {
            hot,
            durable,
            aggregation,
            payments,
            runs,
        }
    }

    /// Hot store vs durable store: per (org, project, metric) daily event
    /// counts must agree once migration has caught up.
    pub async fn reconcile_hot_vs_durable(&self, day: NaiveDate) -> Result<ReconciliationReport> {
        let (day_start, day_end) = day_window(day);
        let mut report = ReconciliationReport::default();

        let hot_counts = self.hot.daily_counts(day_start, day_end).await?;
        let durable_counts = self.durable.daily_counts(day_start, day_end).await?;

        let mut by_scope: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for (org_id, project_id, metric, count) in hot_counts {
            by_scope
                .entry(scope_key(org_id, project_id, &metric))
                .or_default()
                .0 = count;
        }
        for (org_id, project_id, metric, count) in durable_counts {
            by_scope
                .entry(scope_key(org_id, project_id, &metric))
                .or_default()
                .1 = count;
        }

        for (scope, (hot_count, durable_count)) in by_scope {
            let run = ReconciliationRun::new(
                SourcePair::HotVsDurable,
                scope,
                day,
                hot_count,
                durable_count,
                None,
            );
            self.write_run(run, &mut report).await;
        }

        self.log_report("hot_vs_durable", &report);
        Ok(report)
    }

    /// Stored aggregates vs the durable events underneath them: sums and
    /// event counts must match whenever both are quiescent.
    pub async fn reconcile_aggregates(&self, month: u32, year: i32) -> Result<ReconciliationReport> {
        let period = BillingPeriod::of_month(month, year)?;
        let run_date = period.start.date_naive();
        let mut report = ReconciliationReport::default();

        let aggregates = self.aggregation.list_all_for_month(month, year).await?;

        for aggregate in aggregates {
            let scope = format!(
                "{}:{}:{}:{}:{}-{:02}",
                aggregate.org_id, aggregate.project_id, aggregate.metric, aggregate.unit,
                year, month
            );

            match self
                .durable
                .sum_for_window(
                    aggregate.org_id,
                    aggregate.project_id,
                    &aggregate.metric,
                    &aggregate.unit,
                    period.start,
                    period.end_exclusive,
                )
                .await
            {
                Ok((event_sum, event_count)) => {
                    let values_match = event_sum == aggregate.total_value;
                    let mut run = ReconciliationRun::new(
                        SourcePair::AggregatesVsEvents,
                        scope,
                        run_date,
                        aggregate.event_count,
                        event_count,
                        Some(serde_json::json!({
                            "aggregate_total": aggregate.total_value.to_string(),
                            "event_sum": event_sum.to_string(),
                        })),
                    );
                    // A count match with drifting sums is still a discrepancy
                    if !values_match {
                        run.status = crate::modules::reconciliation::models::RunStatus::Discrepancy;
                    }
                    self.write_run(run, &mut report).await;
                }
                Err(e) => {
                    let run = ReconciliationRun::error(
                        SourcePair::AggregatesVsEvents,
                        scope,
                        run_date,
                        &e.to_string(),
                    );
                    self.write_run(run, &mut report).await;
                }
            }
        }

        self.log_report("aggregates_vs_events", &report);
        Ok(report)
    }

    /// Local payments vs the gateway: counts the local rows against the
    /// unreconciled view (rows still lacking a gateway payment id).
    pub async fn reconcile_payments(&self, day: NaiveDate) -> Result<ReconciliationReport> {
        let (day_start, day_end) = day_window(day);
        let mut report = ReconciliationReport::default();

        let totals = self.payments.daily_counts(day_start, day_end).await?;
        let unreconciled = self
            .payments
            .daily_unreconciled_counts(day_start, day_end)
            .await?;
        let unreconciled: BTreeMap<Uuid, i64> = unreconciled.into_iter().collect();

        let orgs: BTreeSet<Uuid> = totals.iter().map(|(org_id, _)| *org_id).collect();

        for org_id in orgs {
            let total = totals
                .iter()
                .find(|(id, _)| *id == org_id)
                .map(|(_, count)| *count)
                .unwrap_or(0);
            let open = unreconciled.get(&org_id).copied().unwrap_or(0);

            let expected = match self.fetch_gateway_order_count(org_id, day).await? {
                // Until the gateway listing API is wired in, every local row
                // that has reconciled against a webhook counts as matched.
                None => total - open,
                Some(gateway_count) => gateway_count,
            };

            let run = ReconciliationRun::new(
                SourcePair::LocalVsGateway,
                format!("{}:{}", org_id, day),
                day,
                total,
                expected,
                Some(serde_json::json!({ "unreconciled": open })),
            );
            self.write_run(run, &mut report).await;
        }

        self.log_report("local_vs_gateway", &report);
        Ok(report)
    }

    /// Hook for the real gateway order listing. Returns None while the
    /// listing API is not integrated, which keeps the count heuristic in
    /// charge.
    async fn fetch_gateway_order_count(
        &self,
        _org_id: Uuid,
        _day: NaiveDate,
    ) -> Result<Option<i64>> {
        Ok(None)
    }

    async fn write_run(&self, run: ReconciliationRun, report: &mut ReconciliationReport) {
        use crate::modules::reconciliation::models::RunStatus;

        report.scopes += 1;
        match run.status {
            RunStatus::Reconciled => report.reconciled += 1,
            RunStatus::Discrepancy => {
                report.discrepancies += 1;
                tracing::warn!(
                    source_pair = %run.source_pair,
                    scope = %run.scope,
                    expected = run.expected_count,
                    actual = run.actual_count,
                    "Reconciliation discrepancy"
                );
            }
            RunStatus::Error => report.errors += 1,
        }

        if let Err(e) = self.runs.record(&run).await {
            report.errors += 1;
            tracing::error!(
                source_pair = %run.source_pair,
                scope = %run.scope,
                error = %e,
                "Failed to record reconciliation run"
            );
        }
    }

    fn log_report(&self, loop_name: &str, report: &ReconciliationReport) {
        tracing::info!(
            loop_name = %loop_name,
            scopes = report.scopes,
            reconciled = report.reconciled,
            discrepancies = report.discrepancies,
            errors = report.errors,
            "Reconciliation loop complete"
        );
    }
}

fn day_window(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_hms_opt(0, 0, 0).unwrap().and_utc();
    (start, start + Duration::days(1))
}

fn scope_key(org_id: Uuid, project_id: Uuid, metric: &str) -> String {
    format!("{}:{}:{}", org_id, project_id, metric)
}
