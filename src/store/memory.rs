//! In-process storage backend.
//!
//! Same stage/commit contract as the Postgres backend: `save` applies the whole
//! batch to a copy of the table and swaps it in only when every change succeeds.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Change, Committed, Entity, IdentityStore, Repository, StagedChanges, Store};
use crate::errors::PersistenceError;
use crate::models::client::Client;
use crate::models::identity::Identity;

#[derive(Debug, Clone)]
struct MemoryTable<T> {
    rows: BTreeMap<i32, T>,
    /// Last id handed out; ids start at 1 like a serial column.
    last_id: i32,
}

impl<T> Default for MemoryTable<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

pub struct MemoryRepository<T> {
    table: Arc<RwLock<MemoryTable<T>>>,
    staged: StagedChanges<T>,
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn get_by_id(&self, id: i32) -> Result<Option<T>, PersistenceError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<T>, PersistenceError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    fn add(&self, entity: T) {
        self.staged.push(Change::Insert(entity));
    }

    fn update(&self, entity: T) {
        self.staged.push(Change::Update(entity));
    }

    fn remove(&self, entity: T) {
        self.staged.push(Change::Remove(entity));
    }

    async fn save(&self) -> Result<Committed<T>, PersistenceError> {
        let changes = self.staged.take();
        let mut committed = Committed::default();
        if changes.is_empty() {
            return Ok(committed);
        }

        let mut table = self.table.write().await;
        let mut next = (*table).clone();

        for change in changes {
            match change {
                Change::Insert(mut entity) => {
                    next.last_id += 1;
                    entity.set_id(next.last_id);
                    next.rows.insert(entity.id(), entity.clone());
                    committed.inserted.push(entity);
                }
                Change::Update(entity) => {
                    let slot = next.rows.get_mut(&entity.id()).ok_or(
                        PersistenceError::MissingRow {
                            entity: T::NAME,
                            id: entity.id(),
                        },
                    )?;
                    *slot = entity.clone();
                    committed.updated.push(entity);
                }
                Change::Remove(entity) => {
                    next.rows
                        .remove(&entity.id())
                        .ok_or(PersistenceError::MissingRow {
                            entity: T::NAME,
                            id: entity.id(),
                        })?;
                    committed.removed += 1;
                }
            }
        }

        *table = next;
        Ok(committed)
    }

    fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    by_username: RwLock<HashMap<String, Identity>>,
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, PersistenceError> {
        Ok(self.by_username.read().await.get(username).cloned())
    }

    async fn insert(&self, identity: &Identity) -> Result<(), PersistenceError> {
        let mut map = self.by_username.write().await;
        if map.contains_key(&identity.username) {
            return Err(PersistenceError::Conflict(format!(
                "username '{}' already exists",
                identity.username
            )));
        }
        map.insert(identity.username.clone(), identity.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Identity>, PersistenceError> {
        let mut all: Vec<Identity> = self.by_username.read().await.values().cloned().collect();
        all.sort_by_key(|i| i.created_at);
        Ok(all)
    }
}

/// In-process [`Store`]. Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    clients: Arc<RwLock<MemoryTable<Client>>>,
    identities: Arc<MemoryIdentityStore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete repository, for callers that need more than the trait object.
    pub fn client_repository(&self) -> MemoryRepository<Client> {
        MemoryRepository {
            table: self.clients.clone(),
            staged: StagedChanges::default(),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn clients(&self) -> Box<dyn Repository<Client>> {
        Box::new(self.client_repository())
    }

    fn identities(&self) -> Arc<dyn IdentityStore> {
        self.identities.clone()
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}
