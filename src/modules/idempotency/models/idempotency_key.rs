use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One registered idempotency key and the entity it produced.
///
/// `entity_id` is written in the same transaction as the producer's side
/// effects, so a committed row always carries the winner's entity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IdempotencyKey {
    pub key: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub request_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
