//! Append-only audit records.
//!
//! Rows name entities but never own them: deleting an invoice or payment
//! leaves its audit trail intact. Records are written inside the same
//! transaction as the mutation they describe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use crate::core::Result;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditRecord {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

pub struct AuditRecorder;

impl AuditRecorder {
    /// Append one record inside the caller's transaction
    pub async fn record_with_tx(
        tx: &mut Transaction<'static, Postgres>,
        entity_type: &str,
        entity_id: Uuid,
        action: &str,
        detail: Option<serde_json::Value>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, entity_type, entity_id, action, detail, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entity_type)
        .bind(entity_id)
        .bind(action)
        .bind(detail)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
