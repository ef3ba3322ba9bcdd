use hmac::{Hmac, Mac};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::GatewayConfig;
use crate::core::error::{AppError, Result};
use crate::core::Currency;

type HmacSha256 = Hmac<Sha256>;

/// The gateway settles everything in INR
pub const GATEWAY_CURRENCY: Currency = Currency::INR;

/// Tolerated difference between a posted amount and the gateway's echo,
/// in minor units
const AMOUNT_ECHO_TOLERANCE: i64 = 1;

/// Order as the gateway reports it
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub receipt: Option<String>,
}

/// Refund as the gateway reports it
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub amount: i64,
    pub status: String,
}

/// HTTP client for the payment gateway.
///
/// Outbound calls authenticate with HTTP basic (key id + secret) and ride a
/// retry middleware with jittered exponential backoff for transient
/// failures. Amounts cross the wire as minor-unit integers.
pub struct GatewayClient {
    client: ClientWithMiddleware,
    config: GatewayConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self { client, config }
    }

    /// Create a gateway order for `amount_minor` minor units.
    ///
    /// The gateway echoes the amount back; an echo off by more than one
    /// minor unit means the order must not be trusted and is refused.
    pub async fn create_order(&self, receipt: &str, amount_minor: i64) -> Result<GatewayOrder> {
        #[derive(Serialize)]
        struct CreateOrderRequest<'a> {
            amount: i64,
            currency: &'a str,
            receipt: &'a str,
        }

        if amount_minor <= 0 {
            return Err(AppError::validation(format!(
                "order amount must be positive, got {} minor units",
                amount_minor
            )));
        }

        let url = format!("{}/v1/orders", self.config.base_url);
        let request = CreateOrderRequest {
            amount: amount_minor,
            currency: "INR",
            receipt,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::payment(format!("Gateway order request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(AppError::payment(format!(
                "Gateway order creation failed {}: {}",
                status, error_body
            )));
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| AppError::payment(format!("Failed to parse gateway order: {}", e)))?;

        if (order.amount - amount_minor).abs() > AMOUNT_ECHO_TOLERANCE {
            return Err(AppError::payment(format!(
                "Gateway echoed amount {} for posted {} (order {})",
                order.amount, amount_minor, order.id
            )));
        }

        tracing::info!(
            order_id = %order.id,
            amount_minor = amount_minor,
            receipt = %receipt,
            "Gateway order created"
        );

        Ok(order)
    }

    /// Issue a refund against a captured gateway payment
    pub async fn create_refund(
        &self,
        gateway_payment_id: &str,
        amount_minor: i64,
    ) -> Result<GatewayRefund> {
        #[derive(Serialize)]
        struct CreateRefundRequest {
            amount: i64,
        }

        let url = format!(
            "{}/v1/payments/{}/refund",
            self.config.base_url, gateway_payment_id
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.secret))
            .json(&CreateRefundRequest {
                amount: amount_minor,
            })
            .send()
            .await
            .map_err(|e| AppError::payment(format!("Gateway refund request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(AppError::payment(format!(
                "Gateway refund failed {}: {}",
                status, error_body
            )));
        }

        let refund: GatewayRefund = response
            .json()
            .await
            .map_err(|e| AppError::payment(format!("Failed to parse gateway refund: {}", e)))?;

        tracing::info!(
            refund_id = %refund.id,
            gateway_payment_id = %gateway_payment_id,
            amount_minor = amount_minor,
            "Gateway refund created"
        );

        Ok(refund)
    }

    /// Verify the webhook signature over the exact raw request body.
    ///
    /// HMAC-SHA-256 with the shared webhook secret; the comparison runs in
    /// constant time inside `verify_slice`. The body must be the bytes as
    /// received, since re-serialised JSON changes field order and spacing
    /// and breaks the MAC.
    pub fn verify_webhook_signature(&self, raw_body: &[u8], signature_hex: &str) -> Result<()> {
        verify_signature(self.config.webhook_secret.as_bytes(), raw_body, signature_hex)
    }
}

/// Signature check, separated from the client so it is testable without one
pub fn verify_signature(secret: &[u8], raw_body: &[u8], signature_hex: &str) -> Result<()> {
    let supplied = hex::decode(signature_hex.trim())
        .map_err(|_| AppError::validation("Webhook signature is not valid hex"))?;

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::internal(format!("Invalid webhook secret: {}", e)))?;
    mac.update(raw_body);

    mac.verify_slice(&supplied)
        .map_err(|_| AppError::validation("Webhook signature mismatch"))
}

/// Sign a body the way the gateway does; used by tests and sandbox tooling
pub fn sign_body(secret: &[u8], raw_body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let secret = b"whsec_test";
        let body = br#"{"event":"payment.captured","payload":{}}"#;
        let signature = sign_body(secret, body);
        assert!(verify_signature(secret, body, &signature).is_ok());
    }

    #[test]
    fn test_signature_rejects_tampered_body() {
        let secret = b"whsec_test";
        let signature = sign_body(secret, b"original");
        assert!(verify_signature(secret, b"tampered", &signature).is_err());
    }

    #[test]
    fn test_signature_rejects_non_hex() {
        assert!(verify_signature(b"s", b"body", "not-hex!").is_err());
    }
}
