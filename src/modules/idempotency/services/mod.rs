pub mod idempotency_registry;

pub use idempotency_registry::{ConflictPolicy, IdempotencyRegistry};
