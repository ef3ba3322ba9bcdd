use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Result};

/// One metered usage event.
///
/// The same shape lives in both stores: the hot store holds it between
/// ingestion and migration, the durable store holds it forever. The
/// idempotency key is unique in each store, which is what makes ingestion
/// retries and re-migration safe.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageEvent {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Uuid,
    pub metric: String,
    pub value: Decimal,
    pub unit: String,
    pub ts: DateTime<Utc>,
    pub idempotency_key: String,
    pub metadata: Option<serde_json::Value>,
    pub ingested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl UsageEvent {
    /// Build a validated event at ingestion time.
    ///
    /// When the client supplies no idempotency key one is synthesised from
    /// the project and event id, so replays of the same submission still
    /// dedupe.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        org_id: Uuid,
        project_id: Uuid,
        metric: String,
        value: Decimal,
        unit: String,
        ts: Option<DateTime<Utc>>,
        metadata: Option<serde_json::Value>,
        idempotency_key: Option<String>,
    ) -> Result<Self> {
        if metric.trim().is_empty() {
            return Err(AppError::validation("metric_name cannot be empty"));
        }
        if unit.trim().is_empty() {
            return Err(AppError::validation("unit cannot be empty"));
        }
        if value < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "metric_value must be non-negative, got: {}",
                value
            )));
        }

        let now = Utc::now();
        let idempotency_key =
            idempotency_key.unwrap_or_else(|| format!("evt:{}:{}", project_id, id));

        if idempotency_key.len() > 255 {
            return Err(AppError::validation(
                "idempotency_key cannot exceed 255 characters",
            ));
        }

        Ok(Self {
            id,
            org_id,
            project_id,
            metric,
            value,
            unit,
            ts: ts.unwrap_or(now),
            idempotency_key,
            metadata,
            ingested_at: now,
            processed_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event_with_value(value: Decimal) -> Result<UsageEvent> {
        UsageEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "api_calls".to_string(),
            value,
            "count".to_string(),
            None,
            None,
            None,
        )
    }

    #[test]
    fn test_event_creation_valid() {
        let event = event_with_value(dec!(42)).unwrap();
        assert_eq!(event.metric, "api_calls");
        assert!(event.processed_at.is_none());
        assert!(event.idempotency_key.starts_with("evt:"));
    }

    #[test]
    fn test_event_rejects_negative_value() {
        assert!(event_with_value(dec!(-1)).is_err());
    }

    #[test]
    fn test_event_accepts_zero_value() {
        assert!(event_with_value(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_explicit_idempotency_key_is_kept() {
        let event = UsageEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "storage_gb".to_string(),
            dec!(1.5),
            "gigabyte".to_string(),
            None,
            None,
            Some("client-key-1".to_string()),
        )
        .unwrap();
        assert_eq!(event.idempotency_key, "client-key-1");
    }
}
