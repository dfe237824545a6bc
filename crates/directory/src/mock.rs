//! Mock user-store implementation
//!
//! In-memory records for test assertions, plus injectable latency and
//! failure so callers can exercise timeout and degraded-store paths.
//! Thread-safe via `Arc<Mutex<>>`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::{DirectoryError, NewUserRecord, Role, UserRecord, UserStore};

#[derive(Default)]
struct MockState {
    records: HashMap<Uuid, UserRecord>,
    delay: Option<Duration>,
    fail_fetch: bool,
    fetch_count: u64,
}

/// Mock user store that serves records from memory.
#[derive(Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<MockState>>,
}

impl MockDirectory {
    /// Create a new mock user store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a record directly, bypassing upsert semantics.
    pub fn put_record(&self, record: UserRecord) {
        self.lock().records.insert(record.id, record);
    }

    /// Convenience: insert a minimal record with the given role.
    pub fn put_role(&self, id: Uuid, role: Role) {
        self.put_record(UserRecord {
            id,
            full_name: None,
            email: format!("{id}@example.com"),
            role,
            created_at: Utc::now(),
        });
    }

    /// Delay every `fetch_user` call by `delay` (simulates a slow store;
    /// pair with a paused tokio clock to simulate a hang).
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    /// Make every `fetch_user` call fail with a request error.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.lock().fail_fetch = fail;
    }

    /// Number of `fetch_user` calls observed.
    pub fn fetch_count(&self) -> u64 {
        self.lock().fetch_count
    }

    /// Current role of a record, if any.
    pub fn role_of(&self, id: Uuid) -> Option<Role> {
        self.lock().records.get(&id).map(|r| r.role)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state
            .lock()
            .expect("mock directory lock poisoned — prior test panicked")
    }
}

#[async_trait::async_trait]
impl UserStore for MockDirectory {
    async fn fetch_user(&self, id: Uuid) -> Result<Option<UserRecord>, DirectoryError> {
        let delay = {
            let mut state = self.lock();
            state.fetch_count += 1;
            if state.fail_fetch {
                return Err(DirectoryError::Request(
                    "mock directory: fetch failure injected".to_string(),
                ));
            }
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self.lock().records.get(&id).cloned())
    }

    async fn create_user(&self, record: NewUserRecord) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        // Conflict-ignore: first writer wins, exactly like the hosted upsert.
        state
            .records
            .entry(record.id)
            .or_insert_with(|| UserRecord {
                id: record.id,
                full_name: record.full_name,
                email: record.email,
                role: record.role,
                created_at: Utc::now(),
            });
        Ok(())
    }

    async fn update_role(&self, id: Uuid, role: Role) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        match state.records.get_mut(&id) {
            Some(record) => {
                record.role = role;
                Ok(())
            }
            None => Err(DirectoryError::Response(format!(
                "mock directory: no record for {id}"
            ))),
        }
    }

    async fn update_profile(
        &self,
        id: Uuid,
        full_name: Option<String>,
    ) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        match state.records.get_mut(&id) {
            Some(record) => {
                record.full_name = full_name;
                Ok(())
            }
            None => Err(DirectoryError::Response(format!(
                "mock directory: no record for {id}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_user_is_conflict_ignore() {
        let store = MockDirectory::new();
        let id = Uuid::new_v4();

        store
            .create_user(NewUserRecord {
                id,
                email: "first@example.com".to_string(),
                full_name: None,
                role: Role::Student,
            })
            .await
            .unwrap();

        // A second insert for the same subject (the trigger race) is a no-op.
        store
            .create_user(NewUserRecord {
                id,
                email: "second@example.com".to_string(),
                full_name: None,
                role: Role::Instructor,
            })
            .await
            .unwrap();

        let record = store.fetch_user(id).await.unwrap().expect("record");
        assert_eq!(record.email, "first@example.com");
        assert_eq!(record.role, Role::Student);
    }

    #[tokio::test]
    async fn test_fetch_user_missing_is_none() {
        let store = MockDirectory::new();
        assert!(store.fetch_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_failure_surfaces_as_error() {
        let store = MockDirectory::new();
        store.set_fail_fetch(true);
        assert!(store.fetch_user(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_update_role_changes_record() {
        let store = MockDirectory::new();
        let id = Uuid::new_v4();
        store.put_role(id, Role::Student);

        store.update_role(id, Role::Admin).await.unwrap();
        assert_eq!(store.role_of(id), Some(Role::Admin));
    }
}
