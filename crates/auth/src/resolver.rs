//! Two-tier role resolution
//!
//! The fast path (embedded claim, then local cache) unblocks dependent
//! state immediately; the authoritative path (a single user-record lookup
//! under a bounded timeout) always runs and wins. All failures here are
//! converted to outcomes — nothing propagates.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use skillspring_directory::{Role, UserStore};
use skillspring_identity::Session;

use crate::cache::RoleCache;

/// Result of one authoritative lookup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthoritativeOutcome {
    /// The record store answered with a role
    Role(Role),
    /// The record does not exist yet (sign-up trigger race): the role is
    /// still unknown, which is not an error and not a denial
    Missing,
    /// The lookup errored or exceeded its timeout
    Failed,
}

/// Resolves a session's role with minimum latency while guaranteeing
/// eventual authoritative correctness.
#[derive(Clone)]
pub struct RoleResolver {
    store: Arc<dyn UserStore>,
    cache: RoleCache,
    timeout: Duration,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn UserStore>, cache: RoleCache, timeout: Duration) -> Self {
        Self {
            store,
            cache,
            timeout,
        }
    }

    pub fn cache(&self) -> &RoleCache {
        &self.cache
    }

    /// Embedded claim from the session itself, if well-formed.
    pub fn metadata_role(session: &Session) -> Option<Role> {
        session.metadata_role()?.parse().ok()
    }

    /// Fast-path hint: the embedded claim wins over the cache; both are
    /// provisional until the authoritative path reconciles them.
    pub async fn fast_hint(&self, session: &Session) -> Option<Role> {
        if let Some(role) = Self::metadata_role(session) {
            tracing::debug!(subject = %session.subject(), %role, "Fast path: embedded claim");
            return Some(role);
        }
        let cached = self.cache.get(session.subject()).await;
        if let Some(role) = cached {
            tracing::debug!(subject = %session.subject(), %role, "Fast path: cached role");
        }
        cached
    }

    /// One authoritative lookup, bounded by the configured timeout. On
    /// success the cache is updated; on anything else it is left alone.
    pub async fn authoritative_role(&self, subject: Uuid) -> AuthoritativeOutcome {
        match tokio::time::timeout(self.timeout, self.store.fetch_user(subject)).await {
            Ok(Ok(Some(record))) => {
                tracing::debug!(subject = %subject, role = %record.role, "Authoritative role resolved");
                self.cache.put(subject, record.role).await;
                AuthoritativeOutcome::Role(record.role)
            }
            Ok(Ok(None)) => {
                tracing::warn!(subject = %subject, "User record not found; waiting for sign-up trigger");
                AuthoritativeOutcome::Missing
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, subject = %subject, "Authoritative role lookup failed");
                AuthoritativeOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(subject = %subject, timeout = ?self.timeout, "Authoritative role lookup timed out");
                AuthoritativeOutcome::Failed
            }
        }
    }
}
