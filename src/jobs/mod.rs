//! Periodic background loops.
//!
//! Each job is a tokio task around an interval timer; a failing run is
//! logged and the loop keeps ticking. Intervals: migration every 5 minutes,
//! payment retry every 6 hours, hot-store purge and reconciliation daily,
//! invoice generation on the first day of each month for the month before.

use chrono::{Datelike, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

use crate::modules::events::services::{AggregationService, MigrationWorker};
use crate::modules::idempotency::IdempotencyRegistry;
use crate::modules::invoices::services::InvoiceService;
use crate::modules::organizations::repositories::OrganizationRepository;
use crate::modules::payments::services::RetryScheduler;
use crate::modules::reconciliation::services::ReconciliationService;

const MIGRATION_INTERVAL: Duration = Duration::from_secs(5 * 60);
const RETRY_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const DAILY_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct JobRunner {
    pub migration: Arc<MigrationWorker>,
    pub retry: Arc<RetryScheduler>,
    pub reconciliation: Arc<ReconciliationService>,
    pub invoices: Arc<InvoiceService>,
    pub organizations: Arc<OrganizationRepository>,
    pub aggregation: Arc<AggregationService>,
    pub registry: Arc<IdempotencyRegistry>,
}

impl JobRunner {
    /// Spawn every loop. Tasks run for the life of the process.
    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(Arc::clone(&self).migration_loop());
        tokio::spawn(Arc::clone(&self).retry_loop());
        tokio::spawn(Arc::clone(&self).cleanup_loop());
        tokio::spawn(Arc::clone(&self).reconciliation_loop());
        tokio::spawn(Arc::clone(&self).invoice_generation_loop());
        info!("Background jobs started");
    }

    async fn migration_loop(self: Arc<Self>) {
        let mut ticker = interval(MIGRATION_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = self.migration.run_once().await {
                error!(error = %e, "Migration run failed");
            }
        }
    }

    async fn retry_loop(self: Arc<Self>) {
        let mut ticker = interval(RETRY_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = self.retry.run_once().await {
                error!(error = %e, "Payment retry sweep failed");
            }
        }
    }

    /// Hot-store retention purge plus expired idempotency keys
    async fn cleanup_loop(self: Arc<Self>) {
        let mut ticker = interval(DAILY_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = self.migration.purge_hot_store().await {
                error!(error = %e, "Hot-store purge failed");
            }
            match self.registry.purge_expired(Utc::now()).await {
                Ok(purged) if purged > 0 => {
                    info!(purged = purged, "Expired idempotency keys purged");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Idempotency key purge failed"),
            }
        }
    }

    /// Yesterday's event and payment movements, plus the current month's
    /// aggregates
    async fn reconciliation_loop(self: Arc<Self>) {
        let mut ticker = interval(DAILY_INTERVAL);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let yesterday = (now - ChronoDuration::days(1)).date_naive();

            if let Err(e) = self.reconciliation.reconcile_hot_vs_durable(yesterday).await {
                error!(error = %e, "Hot-vs-durable reconciliation failed");
            }
            if let Err(e) = self
                .reconciliation
                .reconcile_aggregates(now.month(), now.year())
                .await
            {
                error!(error = %e, "Aggregate reconciliation failed");
            }
            if let Err(e) = self.reconciliation.reconcile_payments(yesterday).await {
                error!(error = %e, "Payment reconciliation failed");
            }
        }
    }

    /// On the first day of the month, roll up and invoice the previous month
    /// for every active organisation. Generation is idempotent, so a restart
    /// on day one re-running the loop is harmless.
    async fn invoice_generation_loop(self: Arc<Self>) {
        let mut ticker = interval(DAILY_INTERVAL);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if now.day() != 1 {
                continue;
            }

            let (month, year) = if now.month() == 1 {
                (12, now.year() - 1)
            } else {
                (now.month() - 1, now.year())
            };

            let orgs = match self.organizations.list_active().await {
                Ok(orgs) => orgs,
                Err(e) => {
                    error!(error = %e, "Failed to list organisations for invoicing");
                    continue;
                }
            };

            info!(month = month, year = year, orgs = orgs.len(), "Monthly invoice generation starting");

            for org in orgs {
                if let Err(e) = self.aggregation.aggregate_month(org.id, month, year).await {
                    error!(org_id = %org.id, error = %e, "Monthly rollup failed");
                    continue;
                }
                match self.invoices.generate(org.id, month, year).await {
                    Ok(invoice_id) => {
                        info!(org_id = %org.id, invoice_id = %invoice_id, "Monthly invoice ready");
                    }
                    Err(e) => {
                        error!(org_id = %org.id, error = %e, "Monthly invoice generation failed");
                    }
                }
            }
        }
    }
}
