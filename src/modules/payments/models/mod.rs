pub mod payment;
pub mod refund;

pub use payment::{Payment, PaymentStatus, RetryAttempt};
pub use refund::{Refund, RefundStatus, RefundType};
