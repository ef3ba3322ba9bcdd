pub mod backoff;
pub mod gateway_client;
pub mod payment_service;
pub mod refund_service;
pub mod retry_scheduler;

pub use gateway_client::{GatewayClient, GatewayOrder, GatewayRefund, GATEWAY_CURRENCY};
pub use payment_service::{GatewayPaymentEvent, PaymentOrder, PaymentService};
pub use refund_service::{GatewayRefundEvent, RefundService};
pub use retry_scheduler::{RetryRunReport, RetryScheduler};
