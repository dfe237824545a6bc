//! Common test utilities and fixtures for integration tests
//!
//! Builds a full per-deployment `AppState` over the mock identity and
//! directory providers, and mints provider-shaped JWTs for edge tests.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, request::Parts, Request};
use uuid::Uuid;

use skillspring_app::AppState;
use skillspring_auth::SupabaseClaims;
use skillspring_common::{Config, Deployment};
use skillspring_directory::mock::MockDirectory;
use skillspring_identity::{mock::MockIdentity, UserMetadata};

pub const JWT_SECRET: &str = "integration-test-secret";

pub const SHELL_ROOT: &str = "https://shop.skillspring.app/";
pub const LOGIN_URL: &str = "https://shop.skillspring.app/login";
pub const STUDENT_ROOT: &str = "https://learn.skillspring.app/";
pub const INSTRUCTOR_ROOT: &str = "https://teach.skillspring.app/";
pub const ADMIN_ROOT: &str = "https://admin.skillspring.app/";

pub fn test_config(deployment: Deployment) -> Config {
    Config {
        deployment,
        supabase_url: "https://project.supabase.co".to_string(),
        supabase_anon_key: "anon-key".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        public_landing_url: SHELL_ROOT.to_string(),
        login_url: LOGIN_URL.to_string(),
        student_root: STUDENT_ROOT.to_string(),
        instructor_root: INSTRUCTOR_ROOT.to_string(),
        admin_root: ADMIN_ROOT.to_string(),
        role_cache_path: ":memory:".to_string(),
        resolve_timeout_secs: 15,
        bootstrap_ceiling_secs: 8,
        log_level: "info".to_string(),
        port: 0,
    }
}

/// One deployment's full application state over mock providers.
pub struct TestApp {
    pub identity: MockIdentity,
    pub directory: MockDirectory,
    pub state: AppState,
}

impl TestApp {
    /// Must be called inside a tokio runtime: the bootstrap event loop
    /// starts immediately.
    pub fn new(deployment: Deployment) -> Self {
        let identity = MockIdentity::new();
        let directory = MockDirectory::new();
        let state = AppState::new(
            &test_config(deployment),
            Arc::new(identity.clone()),
            Arc::new(directory.clone()),
        )
        .expect("test app state should build");

        Self {
            identity,
            directory,
            state,
        }
    }

    /// Mint an access token shaped like the provider's, with an optional
    /// embedded role claim.
    pub fn jwt(&self, subject: Uuid, metadata_role: Option<&str>) -> String {
        let claims = SupabaseClaims {
            sub: subject.to_string(),
            email: Some(format!("{subject}@example.com")),
            iat: chrono::Utc::now().timestamp() as u64,
            exp: (chrono::Utc::now().timestamp() + 3600) as u64,
            aud: "authenticated".to_string(),
            role: "authenticated".to_string(),
            user_metadata: UserMetadata {
                role: metadata_role.map(str::to_string),
                full_name: None,
            },
        };

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        let key = jsonwebtoken::EncodingKey::from_secret(JWT_SECRET.as_ref());
        jsonwebtoken::encode(&header, &claims, &key).expect("Failed to encode JWT")
    }
}

/// Request parts for an extractor call, with an optional bearer token.
pub fn make_parts(path: &str, bearer: Option<&str>) -> Parts {
    let mut builder = Request::builder().uri(path);
    if let Some(token) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let (parts, _) = builder.body(()).unwrap().into_parts();
    parts
}
