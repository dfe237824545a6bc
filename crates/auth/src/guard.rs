//! Access guard
//!
//! Pure decision function over the current route and auth snapshot. It is
//! re-evaluated on every relevant state change — session, resolution, or
//! route — and never throws: an indeterminate state always resolves to
//! the most restrictive applicable decision, never to `Allow`.

use url::Url;

use skillspring_common::Deployment;
use skillspring_directory::Role;

use crate::bootstrap::AuthSnapshot;
use crate::dispatch::RouteTable;

/// Outcome of one guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Render the route
    Allow,
    /// Session present but role not yet determined: hold the route,
    /// neither render protected content nor redirect
    Wait,
    /// No session: go sign in, carrying the current location
    RedirectToLogin { destination: Url },
    /// Role does not own this route: go to that role's canonical root
    RedirectForbidden { destination: Url },
}

/// Which role, if any, a path requires.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// Exact paths reachable without a session (sign-in, sign-up)
    public: Vec<String>,
    /// Prefix rules, most specific checked first
    rules: Vec<(String, Role)>,
}

impl RoutePolicy {
    pub fn new(public: Vec<String>, mut rules: Vec<(String, Role)>) -> Self {
        // Longest prefix first so "/admin/reports" beats "/".
        rules.sort_by_key(|(prefix, _)| std::cmp::Reverse(prefix.len()));
        Self { public, rules }
    }

    /// The policy a deployment ships with: its experience requires its
    /// role, and only the auth pages are public.
    pub fn for_deployment(deployment: Deployment) -> Self {
        match deployment {
            Deployment::Shell => Self::new(
                vec!["/".into(), "/login".into(), "/signup".into(), "/courses".into()],
                vec![],
            ),
            Deployment::Student => Self::new(
                vec!["/login".into(), "/signup".into()],
                vec![("/".into(), Role::Student)],
            ),
            Deployment::Instructor => Self::new(
                vec!["/login".into()],
                vec![("/".into(), Role::Instructor)],
            ),
            Deployment::Admin => Self::new(
                vec!["/login".into(), "/signup".into()],
                vec![("/".into(), Role::Admin)],
            ),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public.iter().any(|p| p == path)
    }

    /// Role required for a path, if any. Public paths require none.
    pub fn required_role(&self, path: &str) -> Option<Role> {
        if self.is_public(path) {
            return None;
        }
        self.rules
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, role)| *role)
    }
}

/// Guard for one deployment: the policy plus the dispatch table used to
/// build redirect destinations.
#[derive(Clone)]
pub struct AccessGuard {
    policy: RoutePolicy,
    routes: RouteTable,
    self_root: Url,
}

impl AccessGuard {
    pub fn new(policy: RoutePolicy, routes: RouteTable, self_root: Url) -> Self {
        Self {
            policy,
            routes,
            self_root,
        }
    }

    pub fn for_deployment(deployment: Deployment, routes: RouteTable) -> Self {
        let self_root = routes.self_root(deployment);
        Self::new(RoutePolicy::for_deployment(deployment), routes, self_root)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Absolute form of a local path on this deployment, used as the
    /// post-sign-in return target.
    fn absolute(&self, path: &str) -> Url {
        self.self_root
            .join(path)
            .unwrap_or_else(|_| self.self_root.clone())
    }

    /// Decide whether `path` may render under `snapshot`.
    pub fn check(&self, path: &str, snapshot: &AuthSnapshot) -> AccessDecision {
        let Some(required) = self.policy.required_role(path) else {
            return AccessDecision::Allow;
        };

        if !snapshot.session_present() {
            let return_to = self.absolute(path);
            return AccessDecision::RedirectToLogin {
                destination: self.routes.login_redirect(return_to.as_str()),
            };
        }

        match snapshot.resolution.role() {
            None => AccessDecision::Wait,
            Some(role) if role == required => AccessDecision::Allow,
            Some(role) => AccessDecision::RedirectForbidden {
                destination: self.routes.destination_for(Some(role)),
            },
        }
    }
}
