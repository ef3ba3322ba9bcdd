use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::audit::AuditRecorder;
use crate::modules::idempotency::{ConflictPolicy, IdempotencyRegistry};
use crate::modules::invoices::models::InvoiceStatus;
use crate::modules::invoices::repositories::InvoiceRepository;
use crate::modules::payments::models::{PaymentStatus, Refund, RefundStatus, RefundType};
use crate::modules::payments::repositories::{PaymentRepository, RefundRepository};
use crate::modules::payments::services::gateway_client::GatewayClient;

/// Refund entity as delivered inside a `refund.*` webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefundEvent {
    pub id: String,
    pub payment_id: Option<String>,
    pub status: String,
    pub amount: Option<i64>,
}

/// Partial and full refunds with cascading payment and invoice status.
///
/// A refund is created pending, sent to the gateway, and settled on webhook
/// confirmation; settlement accumulates `refund_amount` on the payment and
/// flips payment/invoice to refunded when the full amount has been returned.
pub struct RefundService {
    pool: PgPool,
    registry: Arc<IdempotencyRegistry>,
    payments: Arc<PaymentRepository>,
    invoices: Arc<InvoiceRepository>,
    refunds: Arc<RefundRepository>,
    gateway: Arc<GatewayClient>,
}

impl RefundService {
    pub fn new(
        pool: PgPool,
        registry: Arc<IdempotencyRegistry>,
        payments: Arc<PaymentRepository>,
        invoices: Arc<InvoiceRepository>,
        refunds: Arc<RefundRepository>,
        gateway: Arc<GatewayClient>,
    ) -> Self {
        Self {
            pool,
            registry,
            payments,
            invoices,
            refunds,
            gateway,
        }
    }

    /// Start a refund against a captured payment.
    ///
    /// Refuses amounts beyond what remains refundable and invoices that are
    /// not paid. The refund row is pending until the gateway confirms.
    pub async fn refund(
        &self,
        payment_id: Uuid,
        amount: Decimal,
        reason: Option<String>,
    ) -> Result<Uuid> {
        let payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment {} not found", payment_id)))?;

        if amount <= Decimal::ZERO {
            return Err(AppError::validation(format!(
                "refund amount must be positive, got {}",
                amount
            )));
        }
        if amount > payment.remaining_refundable() {
            return Err(AppError::validation(format!(
                "refund {} exceeds refundable balance {} on payment {}",
                amount,
                payment.remaining_refundable(),
                payment.number
            )));
        }

        let invoice_status = self.invoices.fetch_status(payment.invoice_id).await?;
        if invoice_status != Some(InvoiceStatus::Paid) {
            return Err(AppError::conflict(format!(
                "Invoice {} is {:?}; only paid invoices can be refunded",
                payment.invoice_id, invoice_status
            )));
        }

        let gateway_payment_id = payment.gateway_payment_id.clone().ok_or_else(|| {
            AppError::validation(format!(
                "Payment {} has no gateway payment id to refund against",
                payment.number
            ))
        })?;

        let refund_type = if amount == payment.amount {
            RefundType::Full
        } else {
            RefundType::Partial
        };

        let refund = Refund::new(
            payment.org_id,
            payment.invoice_id,
            payment.id,
            amount,
            payment.currency,
            refund_type,
            reason,
        )?;
        self.refunds.create(&refund).await?;

        let amount_minor = payment.currency.to_minor_units(amount).ok_or_else(|| {
            AppError::integrity(format!(
                "refund amount {} carries sub-minor-unit precision",
                amount
            ))
        })?;

        let gateway_refund = match self
            .gateway
            .create_refund(&gateway_payment_id, amount_minor)
            .await
        {
            Ok(gw) => gw,
            Err(e) => {
                // The gateway never saw the refund; close the local row.
                let mut tx = self.pool.begin().await?;
                self.refunds
                    .transition_with_tx(&mut tx, refund.id, RefundStatus::Failed, None)
                    .await?;
                AuditRecorder::record_with_tx(
                    &mut tx,
                    "refund",
                    refund.id,
                    "gateway_failed",
                    Some(serde_json::json!({ "error": e.to_string() })),
                )
                .await?;
                tx.commit().await?;
                return Err(e);
            }
        };

        self.refunds
            .set_gateway_refund_id(refund.id, &gateway_refund.id)
            .await?;

        tracing::info!(
            refund_id = %refund.id,
            payment_id = %payment.id,
            gateway_refund_id = %gateway_refund.id,
            amount = %amount,
            "Refund submitted to gateway"
        );

        // Some gateways settle small refunds synchronously; the webhook for
        // the same gateway refund id then becomes a no-op.
        if gateway_refund.status == "processed" {
            let mut tx = self.pool.begin().await?;
            self.settle_refund_with_tx(&mut tx, refund.id).await?;
            tx.commit().await?;
        }

        Ok(refund.id)
    }

    /// Apply one `refund.*` webhook event, single-flight per gateway refund
    /// id and reported status.
    pub async fn process_refund_webhook(&self, event: GatewayRefundEvent) -> Result<Uuid> {
        let key = format!("gateway-refund:{}:{}", event.id, event.status);

        // The settlement helper owns Arc clones so the closure moves it
        let settler = RefundSettler {
            payments: Arc::clone(&self.payments),
            invoices: Arc::clone(&self.invoices),
            refunds: Arc::clone(&self.refunds),
        };

        self.registry
            .register(
                &key,
                "refund",
                None,
                None,
                ConflictPolicy::ReturnExisting,
                move |tx| {
                    Box::pin(async move {
                        let refund =
                            RefundRepository::find_by_gateway_refund_for_update(tx, &event.id)
                                .await?
                                .ok_or_else(|| {
                                    AppError::not_found(format!(
                                        "No refund for gateway refund {}",
                                        event.id
                                    ))
                                })?;

                        match event.status.as_str() {
                            "processed" => settler.settle(tx, refund.id).await?,
                            "failed" => {
                                settler.fail(tx, refund.id).await?;
                            }
                            other => {
                                tracing::debug!(
                                    refund_id = %refund.id,
                                    status = %other,
                                    "Ignoring refund webhook status"
                                );
                            }
                        }

                        Ok(refund.id)
                    })
                },
            )
            .await
    }

    async fn settle_refund_with_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        refund_id: Uuid,
    ) -> Result<()> {
        RefundSettler {
            payments: Arc::clone(&self.payments),
            invoices: Arc::clone(&self.invoices),
            refunds: Arc::clone(&self.refunds),
        }
        .settle(tx, refund_id)
        .await
    }
}

/// The settlement core, shared by the webhook closure and the synchronous
/// path. All cascades run inside the caller's transaction.
struct RefundSettler {
    payments: Arc<PaymentRepository>,
    invoices: Arc<InvoiceRepository>,
    refunds: Arc<RefundRepository>,
}

impl RefundSettler {
    async fn settle(&self, tx: &mut Transaction<'static, Postgres>, refund_id: Uuid) -> Result<()> {
        let now = Utc::now();

        let refund = self
            .refunds
            .find_by_id(refund_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Refund {} not found", refund_id)))?;

        let transitioned = self
            .refunds
            .transition_with_tx(tx, refund_id, RefundStatus::Processed, Some(now))
            .await?;
        if !transitioned {
            // Already settled earlier; nothing to cascade
            return Ok(());
        }

        let applied = self
            .payments
            .apply_refund_with_tx(tx, refund.payment_id, refund.amount, now)
            .await?
            .ok_or_else(|| {
                AppError::integrity(format!(
                    "refund {} would exceed the refundable balance on payment {}",
                    refund.number, refund.payment_id
                ))
            })?;

        let (new_refund_amount, new_payment_status) = applied;

        AuditRecorder::record_with_tx(
            tx,
            "refund",
            refund.id,
            "processed",
            Some(serde_json::json!({
                "amount": refund.amount.to_string(),
                "payment_id": refund.payment_id,
            })),
        )
        .await?;

        AuditRecorder::record_with_tx(
            tx,
            "payment",
            refund.payment_id,
            "refund_applied",
            Some(serde_json::json!({
                "refund_id": refund.id,
                "refund_amount": new_refund_amount.to_string(),
                "status": new_payment_status.to_string(),
            })),
        )
        .await?;

        if new_payment_status == PaymentStatus::Refunded {
            let flipped = self.invoices.mark_refunded_with_tx(tx, refund.invoice_id).await?;
            if flipped {
                AuditRecorder::record_with_tx(
                    tx,
                    "invoice",
                    refund.invoice_id,
                    "refunded",
                    Some(serde_json::json!({ "refund_id": refund.id })),
                )
                .await?;
            }
        }

        tracing::info!(
            refund_id = %refund.id,
            payment_id = %refund.payment_id,
            payment_status = %new_payment_status,
            "Refund settled"
        );

        Ok(())
    }

    async fn fail(&self, tx: &mut Transaction<'static, Postgres>, refund_id: Uuid) -> Result<()> {
        let transitioned = self
            .refunds
            .transition_with_tx(tx, refund_id, RefundStatus::Failed, None)
            .await?;
        if transitioned {
            AuditRecorder::record_with_tx(tx, "refund", refund_id, "failed", None).await?;
        }
        Ok(())
    }
}
