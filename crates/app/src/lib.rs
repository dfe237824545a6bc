//! SkillSpring front-end composition root
//!
//! One binary serves any of the four deployments (shell, student,
//! instructor, admin); the deployment profile in `Config` selects the
//! route policy, the canonical redirect targets, and which auth routes
//! are hosted here. The shell carries the central sign-in portal; the
//! satellites forward to it, preserving the return location.

pub mod handlers;

use std::sync::Arc;

use axum::extract::FromRef;
use axum::routing::{get, post, put};
use axum::Router;

use skillspring_auth::{
    AccessGuard, AuthBackend, AuthConfig, AuthSession, ProtocolConfig, RoleCache, RoleResolver,
    RouteTable,
};
use skillspring_common::{Config, Deployment};
use skillspring_directory::UserStore;
use skillspring_identity::IdentityService;

/// Shared application state for one deployment.
#[derive(Clone)]
pub struct AppState {
    pub deployment: Deployment,
    pub auth: AuthBackend,
    pub session: AuthSession,
    pub routes: RouteTable,
    pub identity: Arc<dyn IdentityService>,
    pub directory: Arc<dyn UserStore>,
    pub cache: RoleCache,
}

impl FromRef<AppState> for AuthBackend {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    pub fn new(
        config: &Config,
        identity: Arc<dyn IdentityService>,
        directory: Arc<dyn UserStore>,
    ) -> anyhow::Result<Self> {
        let routes = RouteTable::from_config(config)?;
        let protocol = ProtocolConfig::from_config(config);
        let cache = RoleCache::new(config.role_cache_path.clone());

        let resolver = RoleResolver::new(
            Arc::clone(&directory),
            cache.clone(),
            protocol.resolve_timeout,
        );
        let session = AuthSession::start(Arc::clone(&identity), resolver, protocol);

        let guard = AccessGuard::for_deployment(config.deployment, routes.clone());
        let auth = AuthBackend::new(
            AuthConfig::from_config(config),
            protocol,
            Arc::clone(&directory),
            cache.clone(),
            guard,
        );

        Ok(Self {
            deployment: config.deployment,
            auth,
            session,
            routes,
            identity,
            directory,
            cache,
        })
    }
}

/// Create the deployment's router with all routes and middleware.
pub fn create_app(
    config: &Config,
    identity: Arc<dyn IdentityService>,
    directory: Arc<dyn UserStore>,
) -> anyhow::Result<Router> {
    let state = AppState::new(config, identity, directory)?;

    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::root))
        .route("/dashboard", get(handlers::dashboard))
        .route("/profile", get(handlers::get_profile).patch(handlers::update_profile))
        .route("/auth/session", get(handlers::session_info))
        .route("/auth/sign-out", post(handlers::sign_out));

    app = match state.deployment {
        // The shell hosts the central sign-in portal and sign-up.
        Deployment::Shell => app
            .route("/login", get(handlers::login_portal))
            .route("/auth/sign-in", post(handlers::sign_in))
            .route("/auth/sign-up", post(handlers::sign_up)),
        // Satellites forward to the portal, preserving the return target.
        _ => app.route("/login", get(handlers::login_gateway)),
    };

    if state.deployment == Deployment::Admin {
        app = app.route("/admin/users/{id}/role", put(handlers::set_user_role));
    }

    Ok(app.with_state(state))
}
