use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

use crate::core::error::AppError;
use crate::modules::payments::services::{
    GatewayClient, GatewayPaymentEvent, GatewayRefundEvent, PaymentService, RefundService,
};

/// Envelope the gateway posts: an event name plus the affected entity
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    payment: Option<GatewayPaymentEvent>,
    refund: Option<GatewayRefundEvent>,
}

/// Controller for inbound gateway webhooks.
///
/// The signature is verified over the exact raw body before any JSON
/// parsing. Unknown event families acknowledge with 200 so the gateway
/// stops retrying them; processing failures answer 5xx so it retries.
pub struct WebhookController {
    gateway: Arc<GatewayClient>,
    payments: Arc<PaymentService>,
    refunds: Arc<RefundService>,
}

impl WebhookController {
    pub fn new(
        gateway: Arc<GatewayClient>,
        payments: Arc<PaymentService>,
        refunds: Arc<RefundService>,
    ) -> Self {
        Self {
            gateway,
            payments,
            refunds,
        }
    }

    /// POST /v1/payments/webhook
    pub async fn process_webhook(
        &self,
        req: HttpRequest,
        raw_body: web::Bytes,
    ) -> Result<HttpResponse, AppError> {
        let signature = req
            .headers()
            .get("X-Signature")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::validation("Missing X-Signature header"))?;

        self.gateway
            .verify_webhook_signature(&raw_body, signature)?;

        let envelope: WebhookEnvelope = serde_json::from_slice(&raw_body)
            .map_err(|e| AppError::validation(format!("Invalid webhook payload: {}", e)))?;

        tracing::info!(event = %envelope.event, "Gateway webhook received");

        if let Some(family) = envelope.event.strip_prefix("payment.") {
            let payment = envelope.payload.payment.ok_or_else(|| {
                AppError::validation(format!(
                    "payment.{} webhook without a payment entity",
                    family
                ))
            })?;
            self.payments.process_payment_webhook(payment).await?;
        } else if let Some(family) = envelope.event.strip_prefix("refund.") {
            let refund = envelope.payload.refund.ok_or_else(|| {
                AppError::validation(format!("refund.{} webhook without a refund entity", family))
            })?;
            self.refunds.process_refund_webhook(refund).await?;
        } else {
            tracing::debug!(event = %envelope.event, "Acknowledging unhandled webhook family");
        }

        Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "ok" })))
    }
}

/// Configure webhook routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/v1/payments/webhook", web::post().to(handle_webhook));
}

async fn handle_webhook(
    req: HttpRequest,
    raw_body: web::Bytes,
    controller: web::Data<WebhookController>,
) -> Result<HttpResponse, AppError> {
    controller.process_webhook(req, raw_body).await
}
