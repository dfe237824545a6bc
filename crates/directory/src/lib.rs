//! SkillSpring user-record store
//!
//! The authoritative user profile (id, name, email, role) lives in the
//! hosted relational store and is consumed over its JSON API. This crate
//! provides:
//! - The `Role` vocabulary shared by every front end
//! - A PostgREST-compatible client for production
//! - A mock store for testing and development
//!
//! Record creation is an idempotent, conflict-ignore upsert keyed by the
//! subject id: the hosted service may also insert the same record from a
//! sign-up trigger, and neither writer may fail because the other won.

pub mod mock;
pub mod postgrest;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Directory configuration error: {0}")]
    Configuration(String),

    #[error("Directory request error: {0}")]
    Request(String),

    #[error("Directory response error: {0}")]
    Response(String),
}

/// Authorization role governing which front end a subject belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Instructor => write!(f, "instructor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = DirectoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(DirectoryError::Response(format!("Unknown role: {other}"))),
        }
    }
}

/// Authoritative user profile row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Payload for sign-up record creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserRecord {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: Role,
}

/// User-record store configuration.
#[derive(Clone)]
pub struct DirectoryConfig {
    /// Store provider (postgrest, mock)
    pub provider: String,
    /// Base URL of the hosted backend (the `/rest/v1` prefix is appended)
    pub base_url: String,
    /// API key sent as both `apikey` and bearer credential
    pub api_key: String,
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl DirectoryConfig {
    /// Create directory config from environment variables.
    pub fn from_env() -> Result<Self, DirectoryError> {
        let provider = std::env::var("DIRECTORY_PROVIDER").unwrap_or_else(|_| "mock".to_string());

        let base_url = std::env::var("SUPABASE_URL").unwrap_or_default();
        let api_key = std::env::var("SUPABASE_ANON_KEY").unwrap_or_default();

        if provider != "mock" && (base_url.is_empty() || api_key.is_empty()) {
            return Err(DirectoryError::Configuration(
                "SUPABASE_URL and SUPABASE_ANON_KEY are required for the postgrest provider"
                    .to_string(),
            ));
        }

        Ok(Self {
            provider,
            base_url,
            api_key,
        })
    }
}

/// User-record store trait for different implementations.
///
/// `fetch_user` returning `Ok(None)` means the record does not exist *yet*
/// (the sign-up trigger may still be running) — callers must treat this as
/// "role still unknown", not as an error or a denial.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Look up the authoritative record by subject id.
    async fn fetch_user(&self, id: Uuid) -> Result<Option<UserRecord>, DirectoryError>;

    /// Create the sign-up record. Idempotent: a concurrent insert by the
    /// hosted trigger is ignored, not surfaced as a duplicate error.
    async fn create_user(&self, record: NewUserRecord) -> Result<(), DirectoryError>;

    /// Change a subject's role (admin action).
    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), DirectoryError>;

    /// Update profile fields.
    async fn update_profile(
        &self,
        id: Uuid,
        full_name: Option<String>,
    ) -> Result<(), DirectoryError>;
}

/// Factory for creating UserStore implementations.
pub struct UserStoreFactory;

impl UserStoreFactory {
    /// Create a UserStore based on configuration.
    pub fn create(config: DirectoryConfig) -> Result<Box<dyn UserStore>, DirectoryError> {
        match config.provider.as_str() {
            "postgrest" => {
                tracing::info!("Creating PostgREST user store");
                Ok(Box::new(postgrest::PostgrestDirectory::new(config)?))
            }
            "mock" => {
                tracing::info!("Creating mock user store");
                Ok(Box::new(mock::MockDirectory::new()))
            }
            provider => Err(DirectoryError::Configuration(format!(
                "Unknown directory provider: {}. Supported providers: postgrest, mock",
                provider
            ))),
        }
    }
}
