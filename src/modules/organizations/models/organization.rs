use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::{AppError, Currency, Result};

/// Root tenant entity. Soft-deleted via the `active` flag.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub preferred_currency: Currency,
    pub billing_email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: String, preferred_currency: Currency, billing_email: String) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(AppError::validation("Organization name cannot be empty"));
        }
        if !billing_email.contains('@') {
            return Err(AppError::validation(format!(
                "Invalid billing email: {}",
                billing_email
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            preferred_currency,
            billing_email,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_creation_valid() {
        let org = Organization::new(
            "Acme Corp".to_string(),
            Currency::INR,
            "billing@acme.example".to_string(),
        )
        .unwrap();
        assert!(org.active);
        assert_eq!(org.preferred_currency, Currency::INR);
    }

    #[test]
    fn test_organization_rejects_empty_name() {
        let result = Organization::new(
            "  ".to_string(),
            Currency::USD,
            "billing@acme.example".to_string(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_organization_rejects_bad_email() {
        let result = Organization::new("Acme".to_string(), Currency::USD, "nope".to_string());
        assert!(result.is_err());
    }
}
