//! Request handlers shared by every deployment

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use skillspring_auth::{AuthUser, GuardedPage, RoleResolver};
use skillspring_common::{Error, Result, ValidatedJson};
use skillspring_directory::{NewUserRecord, Role};
use skillspring_identity::{IdentityError, Session};

use crate::AppState;

fn identity_error(e: IdentityError) -> Error {
    match e {
        IdentityError::InvalidCredentials => {
            Error::Authentication("Invalid email or password".to_string())
        }
        other => Error::Internal(other.to_string()),
    }
}

fn session_payload(state: &AppState, session: &Session, redirect: Option<String>) -> Json<serde_json::Value> {
    // The embedded claim is enough to pick a landing page; the resolver
    // reconciles against the record store behind the scenes.
    let role = RoleResolver::metadata_role(session);
    let redirect_to =
        redirect.unwrap_or_else(|| state.routes.destination_for(role).to_string());
    Json(json!({
        "access_token": session.access_token,
        "expires_at": session.expires_at,
        "subject": session.subject(),
        "redirect_to": redirect_to,
    }))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Landing page for this deployment's experience.
pub async fn root(State(state): State<AppState>, GuardedPage(context): GuardedPage) -> Response {
    Json(json!({
        "app": format!("SkillSpring {}", state.deployment),
        "subject": context.as_ref().map(|c| c.subject()),
        "role": context.as_ref().and_then(|c| c.role()),
    }))
    .into_response()
}

/// Role-guarded dashboard.
pub async fn dashboard(
    State(state): State<AppState>,
    GuardedPage(context): GuardedPage,
) -> Response {
    Json(json!({
        "app": format!("SkillSpring {}", state.deployment),
        "page": "dashboard",
        "subject": context.as_ref().map(|c| c.subject()),
        "role": context.as_ref().and_then(|c| c.role()),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub redirect: Option<String>,
}

/// Central sign-in portal (shell only). Hands the return target back to
/// the client so it rides along with the credential POST.
pub async fn login_portal(Query(query): Query<LoginQuery>) -> Response {
    Json(json!({
        "page": "login",
        "redirect": query.redirect,
    }))
    .into_response()
}

/// Satellite login gateway: forward to the central portal, preserving
/// the caller's return target (or this deployment's root).
pub async fn login_gateway(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let return_to = query
        .redirect
        .unwrap_or_else(|| state.routes.self_root(state.deployment).to_string());
    let target = state.routes.login_redirect(&return_to);
    Redirect::temporary(target.as_str()).into_response()
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    /// Return target from the portal's `redirect` parameter
    pub redirect: Option<String>,
}

/// Password sign-in through the identity provider (shell only).
///
/// On success the caller lands exactly on the `redirect` target it
/// arrived with, falling back to the resolved role's canonical root.
pub async fn sign_in(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SignInRequest>,
) -> Result<Json<serde_json::Value>> {
    let session = state
        .session
        .sign_in(&body.email, &body.password)
        .await
        .map_err(identity_error)?;

    Ok(session_payload(&state, &session, body.redirect))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(length(max = 120))]
    pub full_name: Option<String>,
    pub role: Role,
    pub redirect: Option<String>,
}

/// Account creation (shell only): provider account first, then the
/// user record. The record insert is an idempotent conflict-ignore
/// upsert — the hosted sign-up trigger may create the same row first,
/// and neither writer may fail because the other won.
pub async fn sign_up(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SignUpRequest>,
) -> Result<Json<serde_json::Value>> {
    let session = state
        .identity
        .sign_up(&body.email, &body.password)
        .await
        .map_err(identity_error)?;

    state
        .directory
        .create_user(NewUserRecord {
            id: session.subject(),
            email: body.email,
            full_name: body.full_name,
            role: body.role,
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    Ok(session_payload(&state, &session, body.redirect))
}

/// Sign out and clear the session; the client follows `redirect_to`.
pub async fn sign_out(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    state.session.sign_out().await.map_err(identity_error)?;
    Ok(Json(json!({ "redirect_to": "/login" })))
}

/// Current authenticated state for this request's bearer token.
pub async fn session_info(AuthUser(context): AuthUser) -> Json<serde_json::Value> {
    Json(json!({
        "subject": context.subject(),
        "email": context.session.user.email,
        "role": context.role(),
        "authoritative": context.resolution.is_authoritative(),
    }))
}

/// Authoritative profile for the authenticated subject.
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
) -> Result<Json<serde_json::Value>> {
    let record = state
        .directory
        .fetch_user(context.subject())
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
        // The sign-up trigger may still be running; this is retryable,
        // not a denial.
        .ok_or_else(|| Error::NotFound("Profile not created yet".to_string()))?;

    Ok(Json(json!({
        "id": record.id,
        "full_name": record.full_name,
        "email": record.email,
        "role": record.role,
        "created_at": record.created_at,
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 120))]
    pub full_name: Option<String>,
}

/// Profile edit for the authenticated subject.
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(context): AuthUser,
    ValidatedJson(body): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<serde_json::Value>> {
    state
        .directory
        .update_profile(context.subject(), body.full_name)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// Promote or demote a subject (admin deployment only; the route policy
/// already requires the admin role for every path here).
pub async fn set_user_role(
    State(state): State<AppState>,
    Path(subject): Path<Uuid>,
    GuardedPage(_context): GuardedPage,
    ValidatedJson(body): ValidatedJson<SetRoleRequest>,
) -> Result<Json<serde_json::Value>> {
    state
        .directory
        .update_role(subject, body.role)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    // Drop the local hint so the next fast path re-learns the new role.
    state.cache.clear(subject).await;

    tracing::info!(%subject, role = %body.role, "Role changed by admin");
    Ok(Json(json!({ "status": "ok", "role": body.role })))
}
