use chrono::Utc;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::core::Result;
use crate::modules::invoices::models::InvoiceStatus;
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::payments::models::{Payment, RetryAttempt};
use crate::modules::payments::repositories::PaymentRepository;
use crate::modules::payments::services::backoff;
use crate::modules::payments::services::gateway_client::GatewayClient;

/// Summary of one retry sweep
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryRunReport {
    pub examined: usize,
    pub retried: usize,
    pub exhausted: usize,
    pub errors: usize,
}

const RETRY_SWEEP_LIMIT: i64 = 100;

/// Periodic sweep over failed payments whose backoff has elapsed.
///
/// Each due payment gets a fresh gateway order; the attempt is appended to
/// the payment's retry history under a state-asserting update, so a webhook
/// that settles the payment mid-sweep silently wins.
pub struct RetryScheduler {
    payments: Arc<PaymentRepository>,
    invoices: Arc<InvoiceRepository>,
    gateway: Arc<GatewayClient>,
    retry: RetryConfig,
}

impl RetryScheduler {
    pub fn new(
        payments: Arc<PaymentRepository>,
        invoices: Arc<InvoiceRepository>,
        gateway: Arc<GatewayClient>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            payments,
            invoices,
            gateway,
            retry,
        }
    }

    /// One sweep. Individual payment failures never abort the run.
    pub async fn run_once(&self) -> Result<RetryRunReport> {
        let mut report = RetryRunReport::default();

        if !self.retry.enabled {
            return Ok(report);
        }

        let due = self
            .payments
            .find_due_retries(Utc::now(), RETRY_SWEEP_LIMIT)
            .await?;
        report.examined = due.len();

        for payment in due {
            match self.retry_payment(&payment).await {
                Ok(final_failure) => {
                    report.retried += 1;
                    if final_failure {
                        report.exhausted += 1;
                    }
                }
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        payment_id = %payment.id,
                        error = %e,
                        "Payment retry attempt failed"
                    );
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                retried = report.retried,
                exhausted = report.exhausted,
                errors = report.errors,
                "Payment retry sweep complete"
            );
        }

        Ok(report)
    }

    /// Retry one payment. Returns whether this was the final attempt.
    async fn retry_payment(&self, payment: &Payment) -> Result<bool> {
        let now = Utc::now();
        let attempt_number = payment.retry_count + 1;
        let is_final = attempt_number >= payment.max_retries;

        // The invoice may have been settled by another payment since the
        // failure; stop retrying a charge nobody owes.
        let invoice_status = self.invoices.fetch_status(payment.invoice_id).await?;
        if !matches!(
            invoice_status,
            Some(InvoiceStatus::Finalized) | Some(InvoiceStatus::Sent) | Some(InvoiceStatus::Overdue)
        ) {
            tracing::info!(
                payment_id = %payment.id,
                invoice_id = %payment.invoice_id,
                invoice_status = ?invoice_status,
                "Skipping retry: invoice no longer chargeable"
            );
            let attempt = RetryAttempt {
                attempt: attempt_number,
                at: now,
                gateway_order_id: None,
                error: Some("invoice no longer chargeable".to_string()),
            };
            self.payments
                .record_retry_attempt(payment.id, payment.retry_count, None, &attempt, None, true)
                .await?;
            return Ok(true);
        }

        let amount_minor = payment
            .currency
            .to_minor_units(payment.amount)
            .unwrap_or_default();

        match self.gateway.create_order(&payment.number, amount_minor).await {
            Ok(order) => {
                let next = backoff::next_retry_at(
                    now,
                    self.retry.base_interval_hours,
                    attempt_number,
                    payment.max_retries,
                );
                let attempt = RetryAttempt {
                    attempt: attempt_number,
                    at: now,
                    gateway_order_id: Some(order.id.clone()),
                    error: None,
                };

                let applied = self
                    .payments
                    .record_retry_attempt(
                        payment.id,
                        payment.retry_count,
                        Some(&order.id),
                        &attempt,
                        next,
                        is_final,
                    )
                    .await?;

                if !applied {
                    tracing::info!(
                        payment_id = %payment.id,
                        "Retry superseded by a concurrent payment update"
                    );
                } else if is_final {
                    tracing::warn!(
                        payment_id = %payment.id,
                        attempts = attempt_number,
                        "Payment reached its final retry attempt"
                    );
                }

                Ok(is_final)
            }
            Err(e) if e.is_retryable() => {
                // Transient gateway trouble: the attempt still counts and the
                // backoff clock keeps running.
                let next = backoff::next_retry_at(
                    now,
                    self.retry.base_interval_hours,
                    attempt_number,
                    payment.max_retries,
                );
                let attempt = RetryAttempt {
                    attempt: attempt_number,
                    at: now,
                    gateway_order_id: None,
                    error: Some(e.to_string()),
                };
                self.payments
                    .record_retry_attempt(
                        payment.id,
                        payment.retry_count,
                        None,
                        &attempt,
                        next,
                        is_final,
                    )
                    .await?;
                Err(e)
            }
            Err(e) => {
                // Validation, auth, not-found: retrying cannot help. Surface
                // and stop the schedule; an operator takes it from here.
                let attempt = RetryAttempt {
                    attempt: attempt_number,
                    at: now,
                    gateway_order_id: None,
                    error: Some(e.to_string()),
                };
                self.payments
                    .record_retry_attempt(payment.id, payment.retry_count, None, &attempt, None, true)
                    .await?;
                Err(e)
            }
        }
    }
}
