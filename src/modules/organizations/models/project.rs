use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Result};

/// Ingestion principal owned by exactly one organisation.
///
/// Only the SHA-256 digest of the API key is stored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(org_id: Uuid, name: String, api_key_hash: String) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(AppError::validation("Project name cannot be empty"));
        }
        // SHA-256 hex digest
        if api_key_hash.len() != 64 || !api_key_hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::validation("API key hash must be a SHA-256 hex digest"));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            org_id,
            name,
            api_key_hash,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::hash_api_key;

    #[test]
    fn test_project_accepts_sha256_digest() {
        let project = Project::new(
            Uuid::new_v4(),
            "ingest".to_string(),
            hash_api_key("mb_live_key"),
        );
        assert!(project.is_ok());
    }

    #[test]
    fn test_project_rejects_raw_key() {
        let result = Project::new(Uuid::new_v4(), "ingest".to_string(), "mb_live_key".to_string());
        assert!(result.is_err());
    }
}
