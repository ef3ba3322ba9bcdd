//! Single-flight idempotency registry.
//!
//! Replaces ad-hoc "check then insert" with one primitive: `register` claims
//! the key and runs the producer inside the same transaction, so the claim
//! and the producer's side effects commit or roll back together. Concurrent
//! first-time callers contend on the unique index; the loser blocks on the
//! in-flight row until the winner commits, then observes the winner's entity.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::idempotency::models::IdempotencyKey;

/// What a losing concurrent caller receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Return the winner's entity id transparently
    ReturnExisting,
    /// Surface a Conflict error carrying the winner's entity id
    Fail,
}

pub struct IdempotencyRegistry {
    pool: PgPool,
}

impl IdempotencyRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run `producer` exactly once for `key`.
    ///
    /// If the key is unseen, the producer runs inside a fresh transaction and
    /// the entity id it returns is stored with the key before commit. If the
    /// key is already registered, the producer is not invoked; the stored
    /// entity id is returned (or a Conflict raised, per `policy`).
    ///
    /// A `request_hash` stored on first registration detects payload drift:
    /// replaying the same key with a different hash is refused.
    pub async fn register<F>(
        &self,
        key: &str,
        entity_type: &str,
        request_hash: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
        policy: ConflictPolicy,
        producer: F,
    ) -> Result<Uuid>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'static, Postgres>) -> BoxFuture<'t, Result<Uuid>>,
    {
        // Fast path: a committed registration short-circuits without a
        // transaction or producer call.
        if let Some(existing) = self.find(key).await? {
            return self.resolve_existing(existing, request_hash, policy);
        }

        let mut tx = self.pool.begin().await?;

        // Claim the key. A concurrent claimer holding the in-flight unique
        // index entry makes this statement wait until that transaction
        // resolves; a committed winner turns the claim into a no-op.
        let claimed: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO idempotency_keys (key, entity_type, request_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (key) DO NOTHING
            RETURNING key
            "#,
        )
        .bind(key)
        .bind(entity_type)
        .bind(request_hash)
        .bind(expires_at)
        .fetch_optional(&mut *tx)
        .await?;

        if claimed.is_none() {
            // Lost the race; the winner has committed by the time the claim
            // statement returned.
            tx.rollback().await?;
            let existing = self.find(key).await?.ok_or_else(|| {
                AppError::internal(format!("idempotency key '{}' vanished after conflict", key))
            })?;
            return self.resolve_existing(existing, request_hash, policy);
        }

        let entity_id = match producer(&mut tx).await {
            Ok(id) => id,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET entity_id = $1
            WHERE key = $2
            "#,
        )
        .bind(entity_id)
        .bind(key)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(key = %key, entity_type = %entity_type, entity_id = %entity_id, "Idempotency key registered");

        Ok(entity_id)
    }

    /// Fetch a registered key, if any
    pub async fn find(&self, key: &str) -> Result<Option<IdempotencyKey>> {
        let row = sqlx::query_as::<_, IdempotencyKey>(
            r#"
            SELECT key, entity_type, entity_id, request_hash, expires_at, created_at
            FROM idempotency_keys
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Drop keys whose expiry has passed. Returns the number removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM idempotency_keys
            WHERE expires_at IS NOT NULL AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    fn resolve_existing(
        &self,
        existing: IdempotencyKey,
        request_hash: Option<&str>,
        policy: ConflictPolicy,
    ) -> Result<Uuid> {
        // Same key, different payload: the caller is replaying the key for a
        // new request and must not receive the old artifact.
        if let (Some(stored), Some(supplied)) = (existing.request_hash.as_deref(), request_hash) {
            if stored != supplied {
                return Err(AppError::validation(format!(
                    "Idempotency key '{}' was registered with a different payload",
                    existing.key
                )));
            }
        }

        let entity_id = existing.entity_id.ok_or_else(|| {
            AppError::internal(format!(
                "idempotency key '{}' committed without an entity id",
                existing.key
            ))
        })?;

        match policy {
            ConflictPolicy::ReturnExisting => Ok(entity_id),
            ConflictPolicy::Fail => Err(AppError::conflict(format!(
                "Idempotency key '{}' already produced entity {}",
                existing.key, entity_id
            ))),
        }
    }
}
