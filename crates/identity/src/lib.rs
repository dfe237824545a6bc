//! SkillSpring identity-provider consumer
//!
//! Authentication itself is owned by the hosted identity provider; this
//! crate only consumes its session API:
//! - obtain the current session (from the ambient stored credential)
//! - password sign-in and sign-out
//! - session lifecycle events (sign-in, sign-out, token refresh)
//!
//! Provides a GoTrue-compatible HTTP client for production and a mock
//! for testing and development.

pub mod gotrue;
pub mod mock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the session-change broadcast channel. Events are tiny and
/// consumers drain promptly; lagging receivers drop the oldest events.
pub(crate) const SESSION_EVENT_CAPACITY: usize = 16;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity configuration error: {0}")]
    Configuration(String),

    #[error("Identity request error: {0}")]
    Request(String),

    #[error("Identity response error: {0}")]
    Response(String),

    #[error("Invalid email or password")]
    InvalidCredentials,
}

/// Loosely-typed claims the provider embeds alongside the user.
///
/// `role` here is the *fast-path hint* — possibly stale, never
/// authoritative. The authoritative value lives in the user-record store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// The subject a session was issued for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Provider-issued proof of authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

impl Session {
    /// Subject identifier the session was issued for.
    pub fn subject(&self) -> Uuid {
        self.user.id
    }

    /// Embedded role claim, if the provider attached one.
    pub fn metadata_role(&self) -> Option<&str> {
        self.user.user_metadata.role.as_deref()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Session lifecycle event kinds, mirroring the provider's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEventKind {
    InitialSession,
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

impl fmt::Display for SessionEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEventKind::InitialSession => write!(f, "INITIAL_SESSION"),
            SessionEventKind::SignedIn => write!(f, "SIGNED_IN"),
            SessionEventKind::TokenRefreshed => write!(f, "TOKEN_REFRESHED"),
            SessionEventKind::SignedOut => write!(f, "SIGNED_OUT"),
        }
    }
}

/// A session lifecycle notification.
#[derive(Debug, Clone)]
pub struct SessionChange {
    pub event: SessionEventKind,
    pub session: Option<Session>,
}

/// Identity service configuration.
#[derive(Clone)]
pub struct IdentityConfig {
    /// Identity provider (gotrue, mock)
    pub provider: String,
    /// Base URL of the hosted backend (the `/auth/v1` prefix is appended)
    pub base_url: String,
    /// Project API key sent as the `apikey` header
    pub api_key: String,
    /// Ambient stored credential hydrating the first `current_session` call
    pub stored_refresh_token: Option<String>,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field(
                "stored_refresh_token",
                &self.stored_refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl IdentityConfig {
    /// Create identity config from environment variables.
    pub fn from_env() -> Result<Self, IdentityError> {
        let provider = std::env::var("IDENTITY_PROVIDER").unwrap_or_else(|_| "mock".to_string());

        let base_url = std::env::var("SUPABASE_URL").unwrap_or_default();
        let api_key = std::env::var("SUPABASE_ANON_KEY").unwrap_or_default();
        let stored_refresh_token = std::env::var("STORED_REFRESH_TOKEN").ok();

        if provider != "mock" && (base_url.is_empty() || api_key.is_empty()) {
            return Err(IdentityError::Configuration(
                "SUPABASE_URL and SUPABASE_ANON_KEY are required for the gotrue provider"
                    .to_string(),
            ));
        }

        Ok(Self {
            provider,
            base_url,
            api_key,
            stored_refresh_token,
        })
    }
}

/// Identity service trait for different implementations.
///
/// Pure consumer of the provider's session API — implementations never
/// mint credentials themselves.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    /// Current session from the ambient stored credential, refreshed if
    /// necessary. `Ok(None)` means unauthenticated.
    async fn current_session(&self) -> Result<Option<Session>, IdentityError>;

    /// Password sign-in through the provider.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError>;

    /// Create an account with the provider and return its first session.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Revoke the current session.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Subscribe to session lifecycle events emitted after subscription.
    fn on_session_change(&self) -> broadcast::Receiver<SessionChange>;
}

/// Factory for creating IdentityService implementations.
pub struct IdentityServiceFactory;

impl IdentityServiceFactory {
    /// Create an IdentityService based on configuration.
    pub fn create(config: IdentityConfig) -> Result<Box<dyn IdentityService>, IdentityError> {
        match config.provider.as_str() {
            "gotrue" => {
                tracing::info!("Creating GoTrue identity service");
                Ok(Box::new(gotrue::GoTrueIdentity::new(config)?))
            }
            "mock" => {
                tracing::info!("Creating mock identity service");
                Ok(Box::new(mock::MockIdentity::new()))
            }
            provider => Err(IdentityError::Configuration(format!(
                "Unknown identity provider: {}. Supported providers: gotrue, mock",
                provider
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session_with_role(role: Option<&str>) -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
            user: SessionUser {
                id: Uuid::new_v4(),
                email: Some("user@example.com".to_string()),
                user_metadata: UserMetadata {
                    role: role.map(str::to_string),
                    full_name: None,
                },
            },
        }
    }

    #[test]
    fn test_metadata_role_reads_embedded_claim() {
        assert_eq!(session_with_role(Some("student")).metadata_role(), Some("student"));
        assert_eq!(session_with_role(None).metadata_role(), None);
    }

    #[test]
    fn test_session_expiry() {
        let mut session = session_with_role(None);
        assert!(!session.is_expired());
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
    }

    #[test]
    fn test_session_user_tolerates_missing_metadata() {
        // Providers omit user_metadata entirely for some subjects.
        let json = serde_json::json!({
            "id": "8c7a1f9e-1111-4222-8333-444455556666",
            "email": "bare@example.com"
        });
        let user: SessionUser = serde_json::from_value(json).unwrap();
        assert!(user.user_metadata.role.is_none());
    }

    #[test]
    fn test_factory_mock_succeeds() {
        let config = IdentityConfig {
            provider: "mock".to_string(),
            base_url: String::new(),
            api_key: String::new(),
            stored_refresh_token: None,
        };
        assert!(IdentityServiceFactory::create(config).is_ok());
    }

    #[test]
    fn test_factory_unknown_provider() {
        let config = IdentityConfig {
            provider: "ldap".to_string(),
            base_url: String::new(),
            api_key: String::new(),
            stored_refresh_token: None,
        };
        let err = match IdentityServiceFactory::create(config) {
            Err(e) => e,
            Ok(_) => panic!("Expected error for unknown provider"),
        };
        assert!(err.to_string().contains("Unknown identity provider"));
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = IdentityConfig {
            provider: "gotrue".to_string(),
            base_url: "https://project.supabase.co".to_string(),
            api_key: "anon-secret".to_string(),
            stored_refresh_token: Some("refresh-secret".to_string()),
        };
        let printed = format!("{config:?}");
        assert!(printed.contains("[REDACTED]"));
        assert!(!printed.contains("anon-secret"));
        assert!(!printed.contains("refresh-secret"));
    }
}
