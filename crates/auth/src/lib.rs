//! Authentication protocol shared by every SkillSpring front end
//!
//! Each deployment (shell, student, instructor, admin) embeds the same
//! four pieces, parameterized by configuration:
//! - session bootstrap: obtain the ambient session, follow lifecycle
//!   events, and never hang past the safety ceiling
//! - role resolution: an immediate fast path (embedded claim or local
//!   cache) reconciled against the authoritative user record
//! - access guard: pure route decisions over the resolved state
//! - route dispatch: cross-deployment redirects with lossless return paths

mod bootstrap;
mod cache;
mod claims;
mod config;
mod dispatch;
mod error;
mod extractors;
mod guard;
mod jwt;
mod resolution;
mod resolver;

pub use bootstrap::{AuthSession, AuthSnapshot};
pub use cache::RoleCache;
pub use claims::SupabaseClaims;
pub use config::{AuthConfig, ProtocolConfig};
pub use dispatch::RouteTable;
pub use error::AuthError;
pub use extractors::{AuthBackend, AuthUser, EdgeContext, GuardRejection, GuardedPage};
pub use guard::{AccessDecision, AccessGuard, RoutePolicy};
pub use jwt::extract_bearer_token;
pub use resolution::RoleResolution;
pub use resolver::{AuthoritativeOutcome, RoleResolver};
