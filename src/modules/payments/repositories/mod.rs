pub mod payment_repository;
pub mod refund_repository;

pub use payment_repository::PaymentRepository;
pub use refund_repository::RefundRepository;
