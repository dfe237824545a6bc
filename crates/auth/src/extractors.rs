//! Axum extractors for the HTTP edge
//!
//! Generic over any state `S` where `AuthBackend: FromRef<S>` — axum's
//! idiomatic nested-state pattern. The edge is the server-side twin of
//! the client bootstrap: the bearer token supplies the session and the
//! fast-path claim, the record store is deep-verified per request, and
//! the guard decision maps onto HTTP (redirects for dispatch, 503 for
//! "still verifying").

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, header::RETRY_AFTER, request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use url::Url;
use uuid::Uuid;

use skillspring_directory::{Role, UserStore};
use skillspring_identity::Session;

use crate::bootstrap::AuthSnapshot;
use crate::cache::RoleCache;
use crate::config::{AuthConfig, ProtocolConfig};
use crate::error::AuthError;
use crate::guard::{AccessDecision, AccessGuard};
use crate::jwt::{extract_bearer_token, validate_jwt_token};
use crate::resolution::RoleResolution;
use crate::resolver::{AuthoritativeOutcome, RoleResolver};

/// Per-request authentication state at the edge.
#[derive(Debug, Clone)]
pub struct EdgeContext {
    pub session: Session,
    pub resolution: RoleResolution,
}

impl EdgeContext {
    pub fn subject(&self) -> Uuid {
        self.session.subject()
    }

    pub fn role(&self) -> Option<Role> {
        self.resolution.role()
    }

    fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            session: Some(self.session.clone()),
            resolution: self.resolution,
            loading: false,
        }
    }
}

/// Concrete edge authentication backend.
///
/// Wraps token validation, the role resolver, and the deployment's guard.
/// Domain states expose this via `FromRef`:
/// ```ignore
/// impl FromRef<AppState> for AuthBackend {
///     fn from_ref(state: &AppState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Clone)]
pub struct AuthBackend {
    config: AuthConfig,
    resolver: RoleResolver,
    guard: AccessGuard,
}

impl AuthBackend {
    pub fn new(
        config: AuthConfig,
        protocol: ProtocolConfig,
        store: Arc<dyn UserStore>,
        cache: RoleCache,
        guard: AccessGuard,
    ) -> Self {
        Self {
            config,
            resolver: RoleResolver::new(store, cache, protocol.resolve_timeout),
            guard,
        }
    }

    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }

    /// Validate a bearer token and resolve its role: fast path from the
    /// embedded claim, deep verification against the record store. Store
    /// trouble degrades the resolution, never the request.
    pub async fn authenticate_jwt(&self, token: &str) -> Result<EdgeContext, AuthError> {
        let claims = validate_jwt_token(token, &self.config)?;
        let session = claims.into_session(token.to_string())?;

        let fast = self.resolver.fast_hint(&session).await;
        let provisional = match fast {
            Some(role) => RoleResolution::Unresolved.apply_fast(role),
            None => RoleResolution::Unresolved,
        };

        let resolution = match self.resolver.authoritative_role(session.subject()).await {
            AuthoritativeOutcome::Role(role) => provisional.apply_authoritative(role),
            AuthoritativeOutcome::Missing => provisional,
            AuthoritativeOutcome::Failed => provisional.apply_timeout(),
        };

        Ok(EdgeContext {
            session,
            resolution,
        })
    }
}

/// Authenticated user extractor (valid bearer token required).
#[derive(Debug)]
pub struct AuthUser(pub EdgeContext);

impl<S> FromRequestParts<S> for AuthUser
where
    AuthBackend: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let backend = AuthBackend::from_ref(state);

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = extract_bearer_token(auth_header)?;
        let context = backend.authenticate_jwt(&token).await?;

        Ok(AuthUser(context))
    }
}

/// Rejection for `GuardedPage`: every non-`Allow` guard decision mapped
/// onto HTTP.
#[derive(Debug)]
pub enum GuardRejection {
    /// Role not determined yet: hold the page, ask the client to retry
    Wait,
    /// Dispatch elsewhere (sign-in portal or the role's canonical root)
    Redirect(Url),
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            GuardRejection::Wait => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(RETRY_AFTER, "1")],
                Json(json!({
                    "status": "verifying",
                    "message": "Access is still being verified",
                })),
            )
                .into_response(),
            GuardRejection::Redirect(url) => Redirect::temporary(url.as_str()).into_response(),
        }
    }
}

/// Route-guarding extractor: evaluates the deployment's access guard for
/// the requested path before the handler runs.
///
/// Carries the edge context when a valid session was presented; `None`
/// on public routes reached anonymously. A missing or invalid token is
/// "signed out", so protected routes dispatch to the sign-in portal
/// instead of answering 401.
#[derive(Debug)]
pub struct GuardedPage(pub Option<EdgeContext>);

impl<S> FromRequestParts<S> for GuardedPage
where
    AuthBackend: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GuardRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let backend = AuthBackend::from_ref(state);
        let path = parts.uri.path().to_string();

        let context = match parts.headers.get(AUTHORIZATION) {
            Some(header) => match extract_bearer_token(header) {
                Ok(token) => match backend.authenticate_jwt(&token).await {
                    Ok(context) => Some(context),
                    Err(e) => {
                        tracing::debug!(error = ?e, "Rejecting presented token; treating as signed out");
                        None
                    }
                },
                Err(_) => None,
            },
            None => None,
        };

        let snapshot = match &context {
            Some(context) => context.snapshot(),
            None => AuthSnapshot {
                session: None,
                resolution: RoleResolution::Unresolved,
                loading: false,
            },
        };

        match backend.guard().check(&path, &snapshot) {
            AccessDecision::Allow => Ok(GuardedPage(context)),
            AccessDecision::Wait => Err(GuardRejection::Wait),
            AccessDecision::RedirectToLogin { destination }
            | AccessDecision::RedirectForbidden { destination } => {
                Err(GuardRejection::Redirect(destination))
            }
        }
    }
}
