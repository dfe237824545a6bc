//! Session bootstrap and lifecycle
//!
//! `AuthSession` owns the protocol's event loop: it obtains the ambient
//! session once at start, follows the provider's session-change events,
//! drives role resolution for every observation, and publishes the
//! resulting `AuthSnapshot` on a watch channel. Consumers re-evaluate
//! their access decisions on every snapshot change.
//!
//! Liveness rules:
//! - a provider failure during bootstrap is "signed out", never an error
//! - the loading state is bounded by the safety ceiling even when the
//!   authoritative query is still pending
//! - a result from a superseded session observation is discarded
//!   (observation epoch + subject id), but a late result for the
//!   *current* observation still lands after the ceiling has fired

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use skillspring_directory::Role;
use skillspring_identity::{IdentityError, IdentityService, Session, SessionEventKind};

use crate::config::ProtocolConfig;
use crate::resolution::RoleResolution;
use crate::resolver::{AuthoritativeOutcome, RoleResolver};

/// Client-held authentication state, recreated on every session change.
#[derive(Debug, Clone)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub resolution: RoleResolution,
    pub loading: bool,
}

impl AuthSnapshot {
    fn booting() -> Self {
        Self {
            session: None,
            resolution: RoleResolution::Unresolved,
            loading: true,
        }
    }

    pub fn session_present(&self) -> bool {
        self.session.is_some()
    }

    /// The role to use for access decisions, if one is resolved.
    pub fn role(&self) -> Option<Role> {
        self.resolution.role()
    }
}

struct Inner {
    identity: Arc<dyn IdentityService>,
    resolver: RoleResolver,
    snapshot_tx: watch::Sender<AuthSnapshot>,
    /// Monotonic session-observation counter; the stale-response guard.
    epoch: AtomicU64,
    config: ProtocolConfig,
}

impl Inner {
    /// Apply an authoritative outcome iff it still belongs to the current
    /// observation. Superseded results are discarded silently.
    fn apply_authoritative(&self, observed_epoch: u64, subject: Uuid, outcome: AuthoritativeOutcome) {
        if self.epoch.load(Ordering::SeqCst) != observed_epoch {
            tracing::debug!(subject = %subject, "Discarding authoritative result for superseded session");
            return;
        }

        self.snapshot_tx.send_modify(|snap| {
            if snap.session.as_ref().map(Session::subject) != Some(subject) {
                tracing::debug!(subject = %subject, "Discarding authoritative result for replaced subject");
                return;
            }
            snap.resolution = match outcome {
                AuthoritativeOutcome::Role(role) => snap.resolution.apply_authoritative(role),
                AuthoritativeOutcome::Missing => snap.resolution,
                AuthoritativeOutcome::Failed => snap.resolution.apply_timeout(),
            };
            snap.loading = false;
        });
    }

    async fn handle_observation(
        inner: &Arc<Inner>,
        event: SessionEventKind,
        session: Option<Session>,
    ) {
        let my_epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(event = %event, session_present = session.is_some(), "Session observation");

        let Some(session) = session else {
            inner.snapshot_tx.send_modify(|snap| {
                snap.session = None;
                snap.resolution = RoleResolution::Unresolved;
                snap.loading = false;
            });
            return;
        };

        let subject = session.subject();
        let fast = inner.resolver.fast_hint(&session).await;

        inner.snapshot_tx.send_modify(|snap| {
            snap.session = Some(session.clone());
            snap.resolution = match fast {
                Some(role) => RoleResolution::Unresolved.apply_fast(role),
                None => RoleResolution::Unresolved,
            };
            // A fast value releases consumers immediately; without one they
            // keep waiting, bounded below.
            snap.loading = fast.is_none();
        });

        // The authoritative lookup always runs, exactly once per observation.
        let mut worker: JoinHandle<()> = tokio::spawn({
            let inner = Arc::clone(inner);
            async move {
                let outcome = inner.resolver.authoritative_role(subject).await;
                inner.apply_authoritative(my_epoch, subject, outcome);
            }
        });

        if fast.is_some() {
            // Concurrent reconciliation; nothing to wait for here.
            return;
        }

        // No fast value: wait for the authoritative result, but never past
        // the safety ceiling. The worker keeps running after the ceiling so
        // a late success still lands (guarded by the epoch above).
        match tokio::time::timeout(inner.config.bootstrap_ceiling, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Role resolution task failed");
                inner.snapshot_tx.send_modify(|snap| snap.loading = false);
            }
            Err(_) => {
                tracing::warn!(
                    ceiling = ?inner.config.bootstrap_ceiling,
                    "Safety ceiling reached; releasing loading state with role unresolved"
                );
                inner.snapshot_tx.send_modify(|snap| snap.loading = false);
            }
        }
    }
}

struct Tasks {
    event_loop: JoinHandle<()>,
    ceiling: JoinHandle<()>,
}

impl Drop for Tasks {
    fn drop(&mut self) {
        self.event_loop.abort();
        self.ceiling.abort();
    }
}

/// Handle to the running bootstrap protocol. Cheap to clone; the event
/// loop stops when the last handle is dropped.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<Inner>,
    _tasks: Arc<Tasks>,
}

impl AuthSession {
    /// Start the protocol: fetch the ambient session, subscribe to
    /// lifecycle events, and arm the safety ceiling.
    pub fn start(
        identity: Arc<dyn IdentityService>,
        resolver: RoleResolver,
        config: ProtocolConfig,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(AuthSnapshot::booting());
        let inner = Arc::new(Inner {
            identity,
            resolver,
            snapshot_tx,
            epoch: AtomicU64::new(0),
            config,
        });

        // The ceiling covers the whole bootstrap, including the initial
        // session fetch itself hanging.
        let ceiling = tokio::spawn({
            let inner = Arc::clone(&inner);
            async move {
                tokio::time::sleep(inner.config.bootstrap_ceiling).await;
                inner.snapshot_tx.send_if_modified(|snap| {
                    if snap.loading {
                        tracing::warn!("Safety ceiling reached; forcing loading state off");
                        snap.loading = false;
                        true
                    } else {
                        false
                    }
                });
            }
        });

        let event_loop = tokio::spawn({
            let inner = Arc::clone(&inner);
            async move {
                // Subscribe before the initial fetch so no transition is missed.
                let mut events = inner.identity.on_session_change();

                let initial = match inner.identity.current_session().await {
                    Ok(session) => session,
                    Err(e) => {
                        tracing::error!(error = %e, "Session bootstrap failed; treating as signed out");
                        None
                    }
                };
                Inner::handle_observation(&inner, SessionEventKind::InitialSession, initial)
                    .await;

                loop {
                    match events.recv().await {
                        Ok(change) => {
                            Inner::handle_observation(&inner, change.event, change.session).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Session event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });

        Self {
            inner,
            _tasks: Arc::new(Tasks {
                event_loop,
                ceiling,
            }),
        }
    }

    /// Current state.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Watch state changes; guard decisions re-run on every change.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Wait until the loading state ends (bounded by the safety ceiling).
    pub async fn settled(&self) -> AuthSnapshot {
        let mut rx = self.subscribe();
        loop {
            {
                let snap = rx.borrow_and_update();
                if !snap.loading {
                    return snap.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    /// Sign in through the identity provider; resolution follows from the
    /// resulting session event.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        self.inner.identity.sign_in_with_password(email, password).await
    }

    /// Sign out; the session and resolution clear on the resulting event.
    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        self.inner.identity.sign_out().await
    }
}
