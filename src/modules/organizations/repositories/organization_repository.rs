use sqlx::PgPool;
use uuid::Uuid;

use crate::core::Result;
use crate::modules::organizations::models::Organization;

/// Repository for organisation database operations
pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, org: &Organization) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations (
                id, name, preferred_currency, billing_email, active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(org.preferred_currency.to_string())
        .bind(&org.billing_email)
        .bind(org.active)
        .bind(org.created_at)
        .bind(org.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, preferred_currency, billing_email, active, created_at, updated_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(org)
    }

    /// Active organisations, the population for monthly invoice generation
    pub async fn list_active(&self) -> Result<Vec<Organization>> {
        let orgs = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, preferred_currency, billing_email, active, created_at, updated_at
            FROM organizations
            WHERE active = TRUE
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(orgs)
    }

    /// Soft delete; invoices and payments survive
    pub async fn deactivate(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET active = FALSE, updated_at = NOW()
            WHERE id = $1 AND active = TRUE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
