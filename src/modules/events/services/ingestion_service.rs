use std::sync::Arc;

use crate::core::Result;
use crate::modules::events::models::UsageEvent;
use crate::modules::events::repositories::{HotEventRepository, PutOutcome};

/// Accepts validated events into the hot store.
///
/// Ingestion only ever touches the hot store; durability and aggregation
/// happen asynchronously behind the migration worker. That keeps the write
/// path to one insert.
pub struct IngestionService {
    hot: Arc<HotEventRepository>,
}

impl IngestionService {
    pub fn new(hot: Arc<HotEventRepository>) -> Self {
        Self { hot }
    }

    pub async fn ingest(&self, event: &UsageEvent) -> Result<PutOutcome> {
        let outcome = self.hot.put(event).await?;

        match outcome {
            PutOutcome::New => {
                tracing::debug!(
                    event_id = %event.id,
                    org_id = %event.org_id,
                    project_id = %event.project_id,
                    metric = %event.metric,
                    "Usage event accepted"
                );
            }
            PutOutcome::Duplicate => {
                tracing::debug!(
                    idempotency_key = %event.idempotency_key,
                    "Duplicate usage event ignored"
                );
            }
        }

        Ok(outcome)
    }
}
