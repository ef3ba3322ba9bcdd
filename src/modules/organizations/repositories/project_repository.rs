use sqlx::PgPool;
use uuid::Uuid;

use crate::core::Result;
use crate::modules::organizations::models::Project;

/// Identity columns the ingestion middleware needs for one API key.
///
/// The owning organisation's active flag rides along so the caller can
/// refuse disabled tenants without a second round trip.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectAuthIdentity {
    pub project_id: Uuid,
    pub org_id: Uuid,
    pub project_active: bool,
    pub org_active: bool,
}

/// Repository for project database operations
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (
                id, org_id, name, api_key_hash, active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(project.id)
        .bind(project.org_id)
        .bind(&project.name)
        .bind(&project.api_key_hash)
        .bind(project.active)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, org_id, name, api_key_hash, active, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    /// Authentication lookup; the ingestion middleware queries by key digest
    pub async fn find_auth_identity(&self, key_hash: &str) -> Result<Option<ProjectAuthIdentity>> {
        let identity = sqlx::query_as::<_, ProjectAuthIdentity>(
            r#"
            SELECT p.id AS project_id, p.org_id,
                   p.active AS project_active, o.active AS org_active
            FROM projects p
            JOIN organizations o ON o.id = p.org_id
            WHERE p.api_key_hash = $1
            "#,
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE projects
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
