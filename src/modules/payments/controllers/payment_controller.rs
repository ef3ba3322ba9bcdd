use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::modules::payments::services::PaymentService;

/// Order creation request for a finalized invoice
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub invoice_id: Uuid,
    #[allow(dead_code)]
    pub customer_id: Option<String>,
}

/// Controller for payment order creation
pub struct PaymentController {
    payments: Arc<PaymentService>,
}

impl PaymentController {
    pub fn new(payments: Arc<PaymentService>) -> Self {
        Self { payments }
    }

    /// POST /v1/payments/orders
    pub async fn create_order(
        &self,
        body: web::Json<CreateOrderRequest>,
    ) -> Result<HttpResponse, AppError> {
        let order = self.payments.create_order(body.invoice_id).await?;

        Ok(HttpResponse::Created().json(serde_json::json!({
            "orderId": order.order_id,
            "paymentId": order.payment_id,
            "amount": order.amount,
            "currency": order.currency,
            "status": order.status,
            "receipt": order.receipt,
        })))
    }
}

/// Configure payment routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/v1/payments/orders", web::post().to(handle_create_order));
}

async fn handle_create_order(
    body: web::Json<CreateOrderRequest>,
    controller: web::Data<PaymentController>,
) -> Result<HttpResponse, AppError> {
    controller.create_order(body).await
}
