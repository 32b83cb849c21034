//! Persistence contracts shared by every storage backend.
//!
//! Mutations on a [`Repository`] are staged and only reach storage when
//! [`Repository::save`] commits them as one atomic unit. A repository instance
//! belongs to a single request; [`Store::clients`] hands out a fresh one each time.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::errors::PersistenceError;
use crate::models::client::Client;
use crate::models::identity::Identity;

pub mod memory;
pub mod postgres;

/// A persisted record with an integer primary key assigned by storage.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human-readable entity name used in errors and logs.
    const NAME: &'static str;

    fn id(&self) -> i32;
    fn set_id(&mut self, id: i32);
}

/// A mutation waiting for the next `save`.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Insert(T),
    Update(T),
    Remove(T),
}

/// Rows written by a successful `save`, in staging order.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    /// Inserted entities carrying their storage-assigned ids.
    pub inserted: Vec<T>,
    pub updated: Vec<T>,
    pub removed: usize,
}

impl<T> Default for Committed<T> {
    fn default() -> Self {
        Self {
            inserted: Vec::new(),
            updated: Vec::new(),
            removed: 0,
        }
    }
}

/// Pending changes of one repository instance.
#[derive(Debug)]
pub struct StagedChanges<T> {
    changes: Mutex<Vec<Change<T>>>,
}

impl<T> Default for StagedChanges<T> {
    fn default() -> Self {
        Self {
            changes: Mutex::new(Vec::new()),
        }
    }
}

impl<T> StagedChanges<T> {
    pub fn push(&self, change: Change<T>) {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(change);
    }

    /// Drain the batch. A save attempt consumes it whether or not it commits.
    pub fn take(&self) -> Vec<Change<T>> {
        std::mem::take(&mut *self.changes.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_empty(&self) -> bool {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

/// Uniform CRUD contract over a persisted entity type.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Lookup by primary key. Absent is not an error.
    async fn get_by_id(&self, id: i32) -> Result<Option<T>, PersistenceError>;

    /// Full scan ordered by id.
    async fn get_all(&self) -> Result<Vec<T>, PersistenceError>;

    /// Stage an insert. The caller validates the entity first.
    fn add(&self, entity: T);

    /// Stage a full-record replace by primary key.
    fn update(&self, entity: T);

    /// Stage a delete by primary key.
    fn remove(&self, entity: T);

    /// Commit every staged change atomically. On error nothing is written.
    async fn save(&self) -> Result<Committed<T>, PersistenceError>;

    /// Whether uncommitted changes are staged.
    fn has_changes(&self) -> bool;
}

/// Owner of identity records.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Exact, case-sensitive username match.
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, PersistenceError>;

    /// Persist a new identity. A taken username yields `PersistenceError::Conflict`.
    async fn insert(&self, identity: &Identity) -> Result<(), PersistenceError>;

    async fn list(&self) -> Result<Vec<Identity>, PersistenceError>;
}

/// Storage backend as seen by the HTTP layer.
#[async_trait]
pub trait Store: Send + Sync {
    /// A fresh client repository with its own staging area.
    fn clients(&self) -> Box<dyn Repository<Client>>;

    fn identities(&self) -> Arc<dyn IdentityStore>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), PersistenceError>;
}
