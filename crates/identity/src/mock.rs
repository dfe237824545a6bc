//! Mock identity-service implementation
//!
//! Scripted sessions and manually injected lifecycle events for tests.
//! Thread-safe via `Arc<Mutex<>>`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    IdentityError, IdentityService, Session, SessionChange, SessionEventKind, SessionUser,
    UserMetadata, SESSION_EVENT_CAPACITY,
};

#[derive(Default)]
struct MockState {
    current: Option<Session>,
    fail_current: bool,
    credentials: HashMap<String, (String, Session)>,
}

/// Mock identity service with scripted sessions and event injection.
#[derive(Clone)]
pub struct MockIdentity {
    state: Arc<Mutex<MockState>>,
    events: broadcast::Sender<SessionChange>,
}

impl MockIdentity {
    /// Create a new mock identity service with no ambient session.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            events,
        }
    }

    /// Build a session for `subject` with an optional embedded role claim.
    pub fn session_for(subject: Uuid, metadata_role: Option<&str>) -> Session {
        Session {
            access_token: format!("mock-access-{subject}"),
            refresh_token: Some(format!("mock-refresh-{subject}")),
            expires_at: Utc::now() + Duration::hours(1),
            user: SessionUser {
                id: subject,
                email: Some(format!("{subject}@example.com")),
                user_metadata: UserMetadata {
                    role: metadata_role.map(str::to_string),
                    full_name: None,
                },
            },
        }
    }

    /// Set the ambient session returned by `current_session`.
    pub fn set_session(&self, session: Option<Session>) {
        self.lock().current = session;
    }

    /// Make `current_session` fail with a request error.
    pub fn set_fail_current(&self, fail: bool) {
        self.lock().fail_current = fail;
    }

    /// Register credentials accepted by `sign_in_with_password`.
    pub fn register_credentials(&self, email: &str, password: &str, session: Session) {
        self.lock()
            .credentials
            .insert(email.to_string(), (password.to_string(), session));
    }

    /// Inject a session lifecycle event, updating the ambient session to
    /// match (as the real provider would).
    pub fn emit(&self, event: SessionEventKind, session: Option<Session>) {
        self.lock().current = session.clone();
        let _ = self.events.send(SessionChange { event, session });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state
            .lock()
            .expect("mock identity lock poisoned — prior test panicked")
    }
}

impl Default for MockIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IdentityService for MockIdentity {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError> {
        let state = self.lock();
        if state.fail_current {
            return Err(IdentityError::Request(
                "mock identity: session fetch failure injected".to_string(),
            ));
        }
        Ok(state.current.clone())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let session = {
            let state = self.lock();
            match state.credentials.get(email) {
                Some((expected, session)) if expected == password => session.clone(),
                _ => return Err(IdentityError::InvalidCredentials),
            }
        };

        self.lock().current = Some(session.clone());
        let _ = self.events.send(SessionChange {
            event: SessionEventKind::SignedIn,
            session: Some(session.clone()),
        });
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let session = Self::session_for(Uuid::new_v4(), None);
        {
            let mut state = self.lock();
            state
                .credentials
                .insert(email.to_string(), (password.to_string(), session.clone()));
            state.current = Some(session.clone());
        }
        let _ = self.events.send(SessionChange {
            event: SessionEventKind::SignedIn,
            session: Some(session.clone()),
        });
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.lock().current = None;
        let _ = self.events.send(SessionChange {
            event: SessionEventKind::SignedOut,
            session: None,
        });
        Ok(())
    }

    fn on_session_change(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }
}
