//! JWT claims types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use skillspring_directory::Role;
use skillspring_identity::{Session, SessionUser, UserMetadata};

use crate::error::AuthError;

/// JWT claims from the hosted identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email
    pub email: Option<String>,
    /// Issued at
    pub iat: u64,
    /// Expires at
    pub exp: u64,
    /// Audience
    pub aud: String,
    /// Provider-level role (`authenticated`), NOT the application role
    pub role: String,
    /// Application claims; `user_metadata.role` is the fast-path hint
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl SupabaseClaims {
    /// Subject identifier, parsed.
    pub fn subject(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::InvalidSubject)
    }

    /// Embedded application role, if present and well-formed. A malformed
    /// value is treated as no hint at all, never as an error.
    pub fn metadata_role(&self) -> Option<Role> {
        self.user_metadata.role.as_deref()?.parse().ok()
    }

    /// Rebuild the session the token was minted for.
    pub fn into_session(self, access_token: String) -> Result<Session, AuthError> {
        let id = self.subject()?;
        let expires_at: DateTime<Utc> = DateTime::from_timestamp(self.exp as i64, 0)
            .unwrap_or_else(Utc::now);
        Ok(Session {
            access_token,
            refresh_token: None,
            expires_at,
            user: SessionUser {
                id,
                email: self.email,
                user_metadata: self.user_metadata,
            },
        })
    }
}
