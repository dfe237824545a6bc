//! Local persistent role cache
//!
//! SQLite-backed key-value store recording the last authoritative role
//! seen per subject (`role_<subject id>` keys, matching what earlier
//! deployments kept in browser storage). Read optimistically as a
//! fast-path hint; written only after an authoritative success; never a
//! substitute for re-verification. Writes are last-writer-wins and reads
//! tolerate staleness, so no locking beyond the connection is needed.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use uuid::Uuid;

use skillspring_directory::Role;

fn cache_key(subject: Uuid) -> String {
    format!("role_{subject}")
}

/// SQLite-backed role cache, persistent across sessions on one device.
#[derive(Clone)]
pub struct RoleCache {
    /// Lazily-initialized pool; a single connection is plenty for a KV
    /// note and keeps `:memory:` databases coherent in tests.
    pool: Arc<Mutex<Option<SqlitePool>>>,
    path: String,
}

impl RoleCache {
    /// Create a cache handle (lazy initialization; the database is opened
    /// on first use). `:memory:` yields a non-persistent cache.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            pool: Arc::new(Mutex::new(None)),
            path: path.into(),
        }
    }

    async fn get_pool(&self) -> Result<SqlitePool, sqlx::Error> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        let db_url = if self.path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", self.path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&db_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS role_cache (
                subject_key TEXT PRIMARY KEY,
                role        TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Last authoritative role seen for `subject`, if any. Cache failures
    /// and unparseable values degrade to "no hint" — the authoritative
    /// path still runs either way.
    pub async fn get(&self, subject: Uuid) -> Option<Role> {
        let raw = match self.try_get(subject).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, subject = %subject, "Role cache read failed");
                return None;
            }
        };

        match Role::from_str(&raw) {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::warn!(subject = %subject, value = %raw, "Discarding unparseable cached role");
                None
            }
        }
    }

    async fn try_get(&self, subject: Uuid) -> Result<Option<String>, sqlx::Error> {
        let pool = self.get_pool().await?;
        sqlx::query_scalar("SELECT role FROM role_cache WHERE subject_key = ?1")
            .bind(cache_key(subject))
            .fetch_optional(&pool)
            .await
    }

    /// Record an authoritative role. Callers must only invoke this after
    /// an authoritative success; a failed or timed-out query leaves any
    /// prior entry untouched by never reaching this call.
    pub async fn put(&self, subject: Uuid, role: Role) {
        if let Err(e) = self.try_put(subject, role).await {
            tracing::warn!(error = %e, subject = %subject, "Role cache write failed");
        }
    }

    async fn try_put(&self, subject: Uuid, role: Role) -> Result<(), sqlx::Error> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            INSERT INTO role_cache (subject_key, role, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (subject_key) DO UPDATE SET
                role = excluded.role,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(cache_key(subject))
        .bind(role.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&pool)
        .await?;
        Ok(())
    }

    /// Drop the entry for one subject (admin role changes).
    pub async fn clear(&self, subject: Uuid) {
        let result: Result<(), sqlx::Error> = async {
            let pool = self.get_pool().await?;
            sqlx::query("DELETE FROM role_cache WHERE subject_key = ?1")
                .bind(cache_key(subject))
                .execute(&pool)
                .await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, subject = %subject, "Role cache clear failed");
        }
    }
}
