//! GoTrue identity-service implementation
//!
//! Talks to the hosted auth API at `{base_url}/auth/v1`. Holds the ambient
//! stored credential (refresh token) and the in-memory session, and emits
//! session lifecycle events on the broadcast channel.

use chrono::{Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use tokio::sync::{broadcast, RwLock};

use crate::{
    IdentityConfig, IdentityError, IdentityService, Session, SessionChange, SessionEventKind,
    SessionUser, SESSION_EVENT_CAPACITY,
};

/// Token-grant response shape shared by the password and refresh grants.
#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            user: self.user,
        }
    }
}

struct SessionState {
    session: Option<Session>,
    /// Refresh token restored from device storage, consumed on first use.
    stored_refresh_token: Option<String>,
}

/// Real GoTrue HTTP client.
pub struct GoTrueIdentity {
    http: reqwest::Client,
    auth_url: String,
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionChange>,
}

impl GoTrueIdentity {
    /// Create a new GoTrue client from configuration.
    pub fn new(config: IdentityConfig) -> Result<Self, IdentityError> {
        if config.base_url.is_empty() || config.api_key.is_empty() {
            return Err(IdentityError::Configuration(
                "base_url and api_key are required for the GoTrue provider".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| IdentityError::Configuration(format!("invalid api key: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert("apikey", api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| IdentityError::Configuration(e.to_string()))?;

        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        Ok(Self {
            http,
            auth_url: format!("{}/auth/v1", config.base_url.trim_end_matches('/')),
            state: RwLock::new(SessionState {
                session: None,
                stored_refresh_token: config.stored_refresh_token,
            }),
            events,
        })
    }

    fn emit(&self, event: SessionEventKind, session: Option<Session>) {
        // No receivers is fine; events are advisory.
        let _ = self.events.send(SessionChange { event, session });
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, IdentityError> {
        let response = self
            .http
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let token: TokenResponse = response.json().await.map_err(|e| {
                    IdentityError::Response(format!("Token response decode failed: {e}"))
                })?;
                Ok(token.into_session())
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(IdentityError::InvalidCredentials)
            }
            status => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Failed to read response body".to_string());
                Err(IdentityError::Response(format!(
                    "Token endpoint returned {status}: {body}"
                )))
            }
        }
    }

    async fn refresh(&self, refresh_token: String) -> Result<Option<Session>, IdentityError> {
        match self
            .token_grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await
        {
            Ok(session) => Ok(Some(session)),
            // A rejected refresh token means the stored credential is dead,
            // which is "unauthenticated", not a provider failure.
            Err(IdentityError::InvalidCredentials) => {
                tracing::info!("Stored refresh token rejected; treating as signed out");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl IdentityService for GoTrueIdentity {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError> {
        {
            let state = self.state.read().await;
            if let Some(session) = &state.session {
                if !session.is_expired() {
                    return Ok(Some(session.clone()));
                }
            }
        }

        let mut state = self.state.write().await;

        // Re-check under the write lock; another caller may have refreshed.
        if let Some(session) = &state.session {
            if !session.is_expired() {
                return Ok(Some(session.clone()));
            }
        }

        let refresh_token = state
            .session
            .take()
            .and_then(|s| s.refresh_token)
            .or_else(|| state.stored_refresh_token.take());

        let Some(refresh_token) = refresh_token else {
            return Ok(None);
        };

        match self.refresh(refresh_token).await? {
            Some(session) => {
                state.session = Some(session.clone());
                drop(state);
                self.emit(SessionEventKind::TokenRefreshed, Some(session.clone()));
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let session = self
            .token_grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        {
            let mut state = self.state.write().await;
            state.session = Some(session.clone());
        }

        tracing::info!(subject = %session.subject(), "Signed in");
        self.emit(SessionEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let response = self
            .http
            .post(format!("{}/signup", self.auth_url))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(IdentityError::Response(format!(
                "Sign-up endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Response(format!("Sign-up response decode failed: {e}")))?;
        let session = token.into_session();

        {
            let mut state = self.state.write().await;
            state.session = Some(session.clone());
        }

        tracing::info!(subject = %session.subject(), "Signed up");
        self.emit(SessionEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let session = {
            let mut state = self.state.write().await;
            state.stored_refresh_token = None;
            state.session.take()
        };

        self.emit(SessionEventKind::SignedOut, None);

        // Best effort: the local session is gone either way.
        if let Some(session) = session {
            let result = self
                .http
                .post(format!("{}/logout", self.auth_url))
                .bearer_auth(&session.access_token)
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(status = %response.status(), "Remote sign-out rejected");
                }
                Err(e) => tracing::warn!(error = %e, "Remote sign-out failed"),
                Ok(_) => {}
            }
        }

        Ok(())
    }

    fn on_session_change(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }
}
