//! In-memory register store with staged writes.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use super::models::RegisterUser;
use super::store::{RegisterStore, RegisterTx};
use crate::db::StoreError;

#[derive(Default)]
struct Shared {
    users: DashMap<String, RegisterUser>,
    fail_commit: AtomicBool,
}

#[derive(Clone, Default)]
pub struct MemoryRegisterStore {
    shared: Arc<Shared>,
}

impl MemoryRegisterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, username: &str) -> Option<RegisterUser> {
        self.shared.users.get(username).map(|u| u.value().clone())
    }

    /// Seed a committed user, bypassing transactions.
    pub fn insert(&self, user: RegisterUser) {
        self.shared.users.insert(user.username.clone(), user);
    }

    pub fn len(&self) -> usize {
        self.shared.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.users.is_empty()
    }

    #[cfg(test)]
    pub fn set_fail_commit(&self, fail: bool) {
        self.shared.fail_commit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegisterStore for MemoryRegisterStore {
    async fn begin(&self) -> Result<Box<dyn RegisterTx>, StoreError> {
        Ok(Box::new(MemoryRegisterTx {
            shared: Arc::clone(&self.shared),
            saved: HashMap::new(),
            created: HashMap::new(),
            committed: false,
        }))
    }
}

pub struct MemoryRegisterTx {
    shared: Arc<Shared>,
    saved: HashMap<String, RegisterUser>,
    created: HashMap<String, RegisterUser>,
    committed: bool,
}

#[async_trait]
impl RegisterTx for MemoryRegisterTx {
    async fn load_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<RegisterUser>, StoreError> {
        if let Some(user) = self.created.get(username).or_else(|| self.saved.get(username)) {
            return Ok(Some(user.clone()));
        }
        Ok(self.shared.users.get(username).map(|u| u.value().clone()))
    }

    async fn save_user(&mut self, user: &RegisterUser) -> Result<(), StoreError> {
        if let Some(staged) = self.created.get_mut(&user.username) {
            *staged = user.clone();
            return Ok(());
        }
        let exists = self
            .shared
            .users
            .get(&user.username)
            .is_some_and(|u| u.token == user.token);
        if !exists {
            return Err(StoreError::Corrupt(format!(
                "register user {} vanished during update",
                user.token
            )));
        }
        self.saved.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn create_user(&mut self, user: &RegisterUser) -> Result<(), StoreError> {
        if self.created.contains_key(&user.username)
            || self.shared.users.contains_key(&user.username)
        {
            return Err(StoreError::UniqueViolation(format!(
                "users.username {}",
                user.username
            )));
        }
        self.created.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.shared.fail_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "register store lost connection".to_string(),
            ));
        }

        let created = std::mem::take(&mut self.created);
        let mut applied = Vec::with_capacity(created.len());
        for (username, user) in created {
            let inserted = match self.shared.users.entry(username.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(user);
                    true
                }
            };
            if !inserted {
                for done in &applied {
                    self.shared.users.remove(done);
                }
                return Err(StoreError::UniqueViolation(format!(
                    "users.username {}",
                    username
                )));
            }
            applied.push(username);
        }
        for (username, user) in std::mem::take(&mut self.saved) {
            self.shared.users.insert(username, user);
        }
        self.committed = true;
        Ok(())
    }
}

impl Drop for MemoryRegisterTx {
    fn drop(&mut self) {
        if !self.committed {
            debug!(
                staged = self.saved.len() + self.created.len(),
                "Register transaction dropped without commit, rolling back"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::models::UserStatus;

    #[tokio::test]
    async fn test_save_applied_on_commit() {
        let store = MemoryRegisterStore::new();
        store.insert(RegisterUser::new("alice", "a@example.com"));

        let mut tx = store.begin().await.unwrap();
        let mut user = tx.load_user_by_username("alice").await.unwrap().unwrap();
        user.status = UserStatus::Verified;
        tx.save_user(&user).await.unwrap();

        // Staged write visible inside, not outside
        assert!(tx.load_user_by_username("alice").await.unwrap().unwrap().is_verified());
        assert!(!store.get("alice").unwrap().is_verified());

        tx.commit().await.unwrap();
        assert!(store.get("alice").unwrap().is_verified());
    }

    #[tokio::test]
    async fn test_drop_discards_saves() {
        let store = MemoryRegisterStore::new();
        store.insert(RegisterUser::new("alice", "a@example.com"));
        {
            let mut tx = store.begin().await.unwrap();
            let mut user = tx.load_user_by_username("alice").await.unwrap().unwrap();
            user.mint_token = Some("usr_x".to_string());
            tx.save_user(&user).await.unwrap();
        }
        assert!(store.get("alice").unwrap().mint_token.is_none());
    }

    #[tokio::test]
    async fn test_create_and_duplicate() {
        let store = MemoryRegisterStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_user(&RegisterUser::new("bob", "b@example.com"))
            .await
            .unwrap();
        let err = tx
            .create_user(&RegisterUser::new("bob", "b2@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        tx.commit().await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let store = MemoryRegisterStore::new();
        store.insert(RegisterUser::new("carol", "c@example.com"));
        store.set_fail_commit(true);

        let mut tx = store.begin().await.unwrap();
        let mut user = tx.load_user_by_username("carol").await.unwrap().unwrap();
        user.status = UserStatus::Verified;
        tx.save_user(&user).await.unwrap();

        assert!(tx.commit().await.is_err());
        assert!(!store.get("carol").unwrap().is_verified());
    }
}
