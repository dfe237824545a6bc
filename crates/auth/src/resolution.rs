//! Role-resolution state machine
//!
//! The role believed to apply to the active session moves through named
//! states instead of ad hoc flags, so reconciliation and timeout behavior
//! are testable in isolation from any I/O:
//!
//! ```text
//! Unresolved ──fast──▶ FastResolved ──authoritative──▶ AuthoritativeResolved
//!     │                     │                                   ▲
//!     └──timeout──▶ TimedOut┴──────────authoritative────────────┘
//! ```
//!
//! Transition rules:
//! - the authoritative value supersedes everything, including a fast value
//!   and a prior timeout (a late success still lands)
//! - a fast value never downgrades an authoritative one
//! - a timeout never clears an already-set fast value

use skillspring_directory::Role;

/// The role currently believed to apply to the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleResolution {
    /// No source has produced a value yet
    Unresolved,
    /// Provisional value from the embedded claim or the local cache
    FastResolved(Role),
    /// Verified against the user-record store; wins over everything
    AuthoritativeResolved(Role),
    /// The authoritative attempt failed or timed out with no fast value
    TimedOut,
}

impl RoleResolution {
    /// The role to use for access decisions, if any.
    pub fn role(&self) -> Option<Role> {
        match self {
            RoleResolution::FastResolved(role) | RoleResolution::AuthoritativeResolved(role) => {
                Some(*role)
            }
            RoleResolution::Unresolved | RoleResolution::TimedOut => None,
        }
    }

    /// Whether the value has been verified against the record store.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, RoleResolution::AuthoritativeResolved(_))
    }

    /// Apply a fast-path hint. Provisional: it may replace an earlier hint
    /// but never an authoritative value, and a timed-out attempt stays
    /// timed out (the hint sources were already consulted before the
    /// authoritative attempt started).
    #[must_use]
    pub fn apply_fast(self, role: Role) -> RoleResolution {
        match self {
            RoleResolution::Unresolved | RoleResolution::FastResolved(_) => {
                RoleResolution::FastResolved(role)
            }
            RoleResolution::AuthoritativeResolved(_) | RoleResolution::TimedOut => self,
        }
    }

    /// Apply an authoritative result. Always wins.
    #[must_use]
    pub fn apply_authoritative(self, role: Role) -> RoleResolution {
        RoleResolution::AuthoritativeResolved(role)
    }

    /// Record a failed or timed-out authoritative attempt. Only a state
    /// with no value moves to `TimedOut`; an existing fast value survives.
    #[must_use]
    pub fn apply_timeout(self) -> RoleResolution {
        match self {
            RoleResolution::Unresolved => RoleResolution::TimedOut,
            other => other,
        }
    }
}
