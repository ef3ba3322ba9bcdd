use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::middleware::ProjectIdentity;
use crate::modules::events::models::UsageEvent;
use crate::modules::events::repositories::PutOutcome;
use crate::modules::events::services::IngestionService;

/// Ingestion request body
///
/// `metric_value` arrives as an exact decimal string or JSON number; floats
/// are parsed through serde's arbitrary-precision path, never via f64.
#[derive(Debug, Deserialize)]
pub struct IngestEventRequest {
    pub event_id: Uuid,
    pub metric_name: String,
    pub metric_value: Decimal,
    pub unit: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub idempotency_key: Option<String>,
}

/// Controller for the authenticated event-ingestion surface
pub struct EventController {
    ingestion: Arc<IngestionService>,
}

impl EventController {
    pub fn new(ingestion: Arc<IngestionService>) -> Self {
        Self { ingestion }
    }

    /// POST /v1/events
    ///
    /// Persists to the hot store and returns 202-style acceptance as a 201;
    /// aggregation happens asynchronously. A replayed idempotency key
    /// answers 201 with `eventId: "duplicate"`.
    pub async fn ingest_event(
        &self,
        req: HttpRequest,
        body: web::Json<IngestEventRequest>,
    ) -> Result<HttpResponse, AppError> {
        let identity = req
            .extensions()
            .get::<ProjectIdentity>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Missing project identity"))?;

        let body = body.into_inner();
        let event = UsageEvent::new(
            body.event_id,
            identity.org_id,
            identity.project_id,
            body.metric_name,
            body.metric_value,
            body.unit,
            body.timestamp,
            body.metadata,
            body.idempotency_key,
        )?;

        let outcome = self.ingestion.ingest(&event).await?;

        let event_id = match outcome {
            PutOutcome::New => event.id.to_string(),
            PutOutcome::Duplicate => "duplicate".to_string(),
        };

        Ok(HttpResponse::Created().json(serde_json::json!({ "eventId": event_id })))
    }
}

/// Configure ingestion routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/v1/events", web::post().to(handle_ingest_event));
}

async fn handle_ingest_event(
    req: HttpRequest,
    body: web::Json<IngestEventRequest>,
    controller: web::Data<EventController>,
) -> Result<HttpResponse, AppError> {
    controller.ingest_event(req, body).await
}
