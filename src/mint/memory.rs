//! In-memory mint store.
//!
//! Writes are staged on the transaction and applied on `commit`; a dropped
//! transaction discards them. Username uniqueness is checked both when the
//! user is created and again when the creation is applied.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use super::models::MintUser;
use super::store::{MintStore, MintTx};
use crate::db::StoreError;

#[derive(Default)]
struct Shared {
    users: DashMap<String, MintUser>,
    fail_create: AtomicBool,
    create_calls: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryMintStore {
    shared: Arc<Shared>,
}

impl MemoryMintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed user by username.
    pub fn get(&self, username: &str) -> Option<MintUser> {
        self.shared.users.get(username).map(|u| u.value().clone())
    }

    /// Seed a committed user, bypassing transactions.
    pub fn insert(&self, user: MintUser) {
        self.shared.users.insert(user.username.clone(), user);
    }

    pub fn len(&self) -> usize {
        self.shared.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.users.is_empty()
    }

    pub fn create_calls(&self) -> usize {
        self.shared.create_calls.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn set_fail_create(&self, fail: bool) {
        self.shared.fail_create.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MintStore for MemoryMintStore {
    async fn begin(&self) -> Result<Box<dyn MintTx>, StoreError> {
        Ok(Box::new(MemoryMintTx {
            shared: Arc::clone(&self.shared),
            saved: HashMap::new(),
            created: HashMap::new(),
            committed: false,
        }))
    }
}

pub struct MemoryMintTx {
    shared: Arc<Shared>,
    saved: HashMap<String, MintUser>,
    created: HashMap<String, MintUser>,
    committed: bool,
}

#[async_trait]
impl MintTx for MemoryMintTx {
    async fn load_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<MintUser>, StoreError> {
        if let Some(user) = self.created.get(username).or_else(|| self.saved.get(username)) {
            return Ok(Some(user.clone()));
        }
        Ok(self.shared.users.get(username).map(|u| u.value().clone()))
    }

    async fn save_user(&mut self, user: &MintUser) -> Result<(), StoreError> {
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
                "mint user {} vanished during update",
                user.token
            )));
        }
        self.saved.insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn create_user(&mut self, user: &MintUser) -> Result<(), StoreError> {
        self.shared.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("mint store rejected insert".to_string()));
        }
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

impl Drop for MemoryMintTx {
    fn drop(&mut self) {
        if !self.committed {
            debug!(
                staged = self.saved.len() + self.created.len(),
                "Mint transaction dropped without commit, rolling back"
            );
        }
    }
}
