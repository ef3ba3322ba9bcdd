pub mod durable_event_repository;
pub mod hot_event_repository;

pub use durable_event_repository::{DurableEventRepository, InsertOutcome};
pub use hot_event_repository::{HotEventRepository, PutOutcome};
