use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::core::{AppError, Result};
use crate::modules::audit::AuditRecorder;
use crate::modules::exchange::services::CurrencyConverter;
use crate::modules::idempotency::{ConflictPolicy, IdempotencyRegistry};
use crate::modules::invoices::models::InvoiceStatus;
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::payments::models::{Payment, PaymentStatus};
use crate::modules::payments::repositories::PaymentRepository;
use crate::modules::payments::services::backoff;
use crate::modules::payments::services::gateway_client::{GatewayClient, GATEWAY_CURRENCY};

/// Payment entity as delivered inside a `payment.*` webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentEvent {
    pub id: String,
    pub order_id: String,
    pub status: String,
    pub method: Option<String>,
    /// Minor units, when the gateway includes an amount
    pub amount: Option<i64>,
}

/// Result of creating a payment order for an invoice
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOrder {
    pub order_id: String,
    pub payment_id: Uuid,
    /// Minor units in the gateway currency
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub receipt: String,
}

/// Whether an invoice can accept payment activity.
///
/// Draft invoices are not payable; cancelled, void and refunded ones never
/// are again. Paid stays in the set so a second capture on a fresh payment
/// row can still record itself (the invoice transition is a guarded no-op).
fn invoice_accepts_payment(status: InvoiceStatus) -> bool {
    matches!(
        status,
        InvoiceStatus::Finalized | InvoiceStatus::Sent | InvoiceStatus::Overdue | InvoiceStatus::Paid
    )
}

/// Whether a payment row may move to the mapped webhook status.
///
/// Guards against stale events downgrading a settled payment; the allowed
/// moves mirror the row-level assertions in the repository.
fn payment_accepts_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    match to {
        Captured => matches!(from, Pending | Authorized | Failed | Captured),
        Authorized => matches!(from, Pending | Authorized),
        Failed => matches!(from, Pending | Authorized | Failed),
        Refunded => matches!(from, Captured | PartiallyRefunded | Refunded),
        Pending => matches!(from, Pending),
        PartiallyRefunded => matches!(from, Captured | PartiallyRefunded),
        Cancelled => matches!(from, Pending | Authorized),
    }
}

/// Order creation and webhook-driven payment state.
///
/// Webhook processing is single-flight per gateway payment event: the
/// idempotency key carries the gateway payment id plus the mapped status, so
/// replays of one event are absorbed while an authorized event cannot mask
/// the capture that follows it.
pub struct PaymentService {
    registry: Arc<IdempotencyRegistry>,
    payments: Arc<PaymentRepository>,
    invoices: Arc<InvoiceRepository>,
    gateway: Arc<GatewayClient>,
    converter: Arc<CurrencyConverter>,
    retry: RetryConfig,
}

impl PaymentService {
    pub fn new(
        registry: Arc<IdempotencyRegistry>,
        payments: Arc<PaymentRepository>,
        invoices: Arc<InvoiceRepository>,
        gateway: Arc<GatewayClient>,
        converter: Arc<CurrencyConverter>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            registry,
            payments,
            invoices,
            gateway,
            converter,
            retry,
        }
    }

    /// Create a gateway order for a finalized invoice and open the local
    /// payment row.
    ///
    /// Invoices not denominated in the gateway currency are converted at the
    /// current rate; a missing rate refuses the order.
    pub async fn create_order(&self, invoice_id: Uuid) -> Result<PaymentOrder> {
        let invoice = self
            .invoices
            .find_by_id(invoice_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Invoice {} not found", invoice_id)))?;

        if !matches!(
            invoice.status,
            InvoiceStatus::Finalized | InvoiceStatus::Sent | InvoiceStatus::Overdue
        ) {
            return Err(AppError::conflict(format!(
                "Invoice {} is {} and cannot be charged",
                invoice.number, invoice.status
            )));
        }

        let charge_amount = if invoice.currency == GATEWAY_CURRENCY {
            invoice.total
        } else {
            self.converter
                .convert(invoice.total, invoice.currency, GATEWAY_CURRENCY, Utc::now())
                .await?
        };

        let amount_minor = GATEWAY_CURRENCY.to_minor_units(charge_amount).ok_or_else(|| {
            AppError::integrity(format!(
                "charge amount {} carries sub-minor-unit precision",
                charge_amount
            ))
        })?;

        let order = self.gateway.create_order(&invoice.number, amount_minor).await?;

        let payment = Payment::new(
            invoice.org_id,
            invoice.id,
            charge_amount,
            GATEWAY_CURRENCY,
            order.id.clone(),
            self.retry.max_retries,
        )?;

        let payments = Arc::clone(&self.payments);
        let payment_row = payment.clone();
        let key = format!("gateway-order:{}", order.id);
        let payment_id = self
            .registry
            .register(
                &key,
                "payment",
                None,
                None,
                ConflictPolicy::ReturnExisting,
                move |tx| {
                    Box::pin(async move {
                        payments.create_with_tx(tx, &payment_row).await?;
                        AuditRecorder::record_with_tx(
                            tx,
                            "payment",
                            payment_row.id,
                            "order_created",
                            Some(serde_json::json!({
                                "gateway_order_id": payment_row.gateway_order_id,
                                "amount": payment_row.amount.to_string(),
                                "invoice_id": payment_row.invoice_id,
                            })),
                        )
                        .await?;
                        Ok(payment_row.id)
                    })
                },
            )
            .await?;

        Ok(PaymentOrder {
            order_id: order.id,
            payment_id,
            amount: amount_minor,
            currency: GATEWAY_CURRENCY.to_string(),
            status: order.status,
            receipt: invoice.number,
        })
    }

    /// Apply one `payment.*` webhook event.
    ///
    /// Runs entirely inside one transaction: payment row and invoice row are
    /// both locked, the payment is updated, and a capture flips the invoice
    /// to paid in the same commit, only if it is not already paid.
    pub async fn process_payment_webhook(&self, event: GatewayPaymentEvent) -> Result<Uuid> {
        let mapped = PaymentStatus::from_gateway(&event.status);
        let key = format!("gateway-payment:{}:{}", event.id, mapped);

        let payments = Arc::clone(&self.payments);
        let invoices = Arc::clone(&self.invoices);
        let retry = self.retry.clone();

        self.registry
            .register(
                &key,
                "payment",
                None,
                None,
                ConflictPolicy::ReturnExisting,
                move |tx| {
                    Box::pin(async move {
                        let payment = PaymentRepository::find_by_gateway_order_for_update(
                            tx,
                            &event.order_id,
                        )
                        .await?
                        .ok_or_else(|| {
                            AppError::not_found(format!(
                                "No payment for gateway order {}",
                                event.order_id
                            ))
                        })?;

                        let invoice =
                            InvoiceRepository::find_by_id_for_update(tx, payment.invoice_id)
                                .await?
                                .ok_or_else(|| {
                                    AppError::not_found(format!(
                                        "Invoice {} not found",
                                        payment.invoice_id
                                    ))
                                })?;

                        if !invoice_accepts_payment(invoice.status) {
                            return Err(AppError::conflict(format!(
                                "Invoice {} is {} and cannot accept payment events",
                                invoice.number, invoice.status
                            )));
                        }

                        // Amount echo check against the local row, one minor
                        // unit of slack for gateway rounding
                        if let Some(webhook_amount) = event.amount {
                            let local_minor = payment
                                .currency
                                .to_minor_units(payment.amount)
                                .unwrap_or_default();
                            if (webhook_amount - local_minor).abs() > 1 {
                                return Err(AppError::validation(format!(
                                    "Webhook amount {} does not match payment {} ({} minor units)",
                                    webhook_amount, payment.number, local_minor
                                )));
                            }
                        }

                        if !payment_accepts_transition(payment.status, mapped) {
                            tracing::warn!(
                                payment_id = %payment.id,
                                from = %payment.status,
                                to = %mapped,
                                "Ignoring stale payment webhook transition"
                            );
                            return Ok(payment.id);
                        }

                        let now = Utc::now();

                        // First failure schedules the first retry; later
                        // failures are the scheduler's business.
                        let next_retry_at = if mapped == PaymentStatus::Failed
                            && payment.status != PaymentStatus::Failed
                            && payment.retry_count == 0
                            && retry.enabled
                        {
                            backoff::next_retry_at(
                                now,
                                retry.base_interval_hours,
                                0,
                                payment.max_retries,
                            )
                        } else {
                            payment.next_retry_at
                        };

                        let paid_at = if mapped == PaymentStatus::Captured {
                            Some(now)
                        } else {
                            None
                        };

                        payments
                            .apply_webhook_update_with_tx(
                                tx,
                                payment.id,
                                mapped,
                                &event.id,
                                event.method.as_deref(),
                                paid_at,
                                next_retry_at,
                                now,
                            )
                            .await?;

                        AuditRecorder::record_with_tx(
                            tx,
                            "payment",
                            payment.id,
                            "webhook_status",
                            Some(serde_json::json!({
                                "gateway_payment_id": event.id,
                                "from": payment.status.to_string(),
                                "to": mapped.to_string(),
                            })),
                        )
                        .await?;

                        if mapped == PaymentStatus::Captured {
                            let flipped =
                                invoices.mark_paid_with_tx(tx, invoice.id, now).await?;
                            if flipped {
                                AuditRecorder::record_with_tx(
                                    tx,
                                    "invoice",
                                    invoice.id,
                                    "paid",
                                    Some(serde_json::json!({
                                        "payment_id": payment.id,
                                        "gateway_payment_id": event.id,
                                    })),
                                )
                                .await?;
                            }
                        }

                        Ok(payment.id)
                    })
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_payability() {
        assert!(invoice_accepts_payment(InvoiceStatus::Finalized));
        assert!(invoice_accepts_payment(InvoiceStatus::Sent));
        assert!(invoice_accepts_payment(InvoiceStatus::Overdue));
        assert!(invoice_accepts_payment(InvoiceStatus::Paid));
        assert!(!invoice_accepts_payment(InvoiceStatus::Draft));
        assert!(!invoice_accepts_payment(InvoiceStatus::Cancelled));
        assert!(!invoice_accepts_payment(InvoiceStatus::Refunded));
        assert!(!invoice_accepts_payment(InvoiceStatus::Void));
    }

    #[test]
    fn test_payment_transition_guard() {
        use PaymentStatus::*;
        assert!(payment_accepts_transition(Pending, Captured));
        assert!(payment_accepts_transition(Authorized, Captured));
        assert!(payment_accepts_transition(Failed, Captured));
        assert!(payment_accepts_transition(Pending, Failed));
        // Stale events cannot downgrade a settled payment
        assert!(!payment_accepts_transition(Captured, Failed));
        assert!(!payment_accepts_transition(Refunded, Captured));
        assert!(!payment_accepts_transition(Captured, Authorized));
    }
}
