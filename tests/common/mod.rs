//! Shared fixtures: recording fakes over the in-memory store and a ready
//! `AppState` with cheap hashing parameters.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use http_body_util::BodyExt;

use pos_api::auth::{Argon2Hasher, CredentialHasher, PasswordVerification};
use pos_api::config::{self, Config};
use pos_api::errors::PersistenceError;
use pos_api::models::client::Client;
use pos_api::models::identity::Identity;
use pos_api::store::memory::MemoryStore;
use pos_api::store::{Committed, IdentityStore, Repository, Store};
use pos_api::AppState;

pub const SECRET: &str = "test-signing-key-that-is-long-enough-000";

#[derive(Debug, Default)]
pub struct Calls {
    pub get_by_id: AtomicUsize,
    pub get_all: AtomicUsize,
    pub add: AtomicUsize,
    pub update: AtomicUsize,
    pub remove: AtomicUsize,
    pub save: AtomicUsize,
    /// Makes `get_all` fail as if storage were down.
    pub fail_reads: AtomicBool,
    /// Makes `save` fail, discarding the staged batch.
    pub fail_saves: AtomicBool,
}

impl Calls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Delegates to an in-memory repository and counts every call.
pub struct RecordingRepository {
    inner: Box<dyn Repository<Client>>,
    calls: Arc<Calls>,
}

#[async_trait]
impl Repository<Client> for RecordingRepository {
    async fn get_by_id(&self, id: i32) -> Result<Option<Client>, PersistenceError> {
        bump(&self.calls.get_by_id);
        self.inner.get_by_id(id).await
    }

    async fn get_all(&self) -> Result<Vec<Client>, PersistenceError> {
        bump(&self.calls.get_all);
        if self.calls.fail_reads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("connection refused".into()));
        }
        self.inner.get_all().await
    }

    fn add(&self, entity: Client) {
        bump(&self.calls.add);
        self.inner.add(entity)
    }

    fn update(&self, entity: Client) {
        bump(&self.calls.update);
        self.inner.update(entity)
    }

    fn remove(&self, entity: Client) {
        bump(&self.calls.remove);
        self.inner.remove(entity)
    }

    async fn save(&self) -> Result<Committed<Client>, PersistenceError> {
        bump(&self.calls.save);
        if self.calls.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("connection reset".into()));
        }
        self.inner.save().await
    }

    fn has_changes(&self) -> bool {
        self.inner.has_changes()
    }
}

/// A [`MemoryStore`] whose client repositories report into shared counters.
#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub calls: Arc<Calls>,
}

#[async_trait]
impl Store for RecordingStore {
    fn clients(&self) -> Box<dyn Repository<Client>> {
        Box::new(RecordingRepository {
            inner: self.inner.clients(),
            calls: self.calls.clone(),
        })
    }

    fn identities(&self) -> Arc<dyn IdentityStore> {
        self.inner.identities()
    }

    async fn ping(&self) -> Result<(), PersistenceError> {
        self.inner.ping().await
    }
}

/// Argon2 with minimal costs, counting verifications.
pub struct CountingHasher {
    inner: Argon2Hasher,
    pub verifications: AtomicUsize,
}

impl CountingHasher {
    pub fn new() -> Self {
        Self {
            inner: cheap_hasher(),
            verifications: AtomicUsize::new(0),
        }
    }

    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialHasher for CountingHasher {
    async fn hash(&self, password: &str) -> anyhow::Result<String> {
        self.inner.hash(password).await
    }

    async fn verify(&self, hash: &str, password: &str) -> PasswordVerification {
        bump(&self.verifications);
        self.inner.verify(hash, password).await
    }
}

pub fn cheap_hasher() -> Argon2Hasher {
    Argon2Hasher::new(argon2::Params::new(1024, 1, 1, None).unwrap())
}

pub fn test_config(open_registration: bool) -> Config {
    let mut env: HashMap<&str, String> = HashMap::new();
    env.insert("POS_JWT_SECRET", SECRET.to_string());
    env.insert("POS_OPEN_REGISTRATION", open_registration.to_string());
    config::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub struct Harness {
    pub state: Arc<AppState>,
    pub store: RecordingStore,
    pub hasher: Arc<CountingHasher>,
}

impl Harness {
    pub fn new(open_registration: bool) -> Self {
        let store = RecordingStore::default();
        let hasher = Arc::new(CountingHasher::new());
        let state = AppState::new(
            test_config(open_registration),
            Arc::new(store.clone()),
            hasher.clone(),
        )
        .unwrap();
        Self {
            state: Arc::new(state),
            store,
            hasher,
        }
    }

    pub fn app(&self) -> axum::Router {
        pos_api::app(self.state.clone())
    }

    pub fn calls(&self) -> &Calls {
        &self.store.calls
    }

    /// Create an identity directly and return a bearer token for it.
    pub async fn token_for(&self, username: &str) -> String {
        let identity = self
            .state
            .auth
            .users()
            .create(username, &format!("{}@example.com", username), "Cashier1!")
            .await
            .unwrap();
        self.state.auth.tokens().issue(&identity).unwrap()
    }

    /// Seed clients through the store, bypassing the counters.
    pub async fn seed_clients(&self, names: &[&str]) -> Vec<Client> {
        let repo = self.store.inner.clients();
        for name in names {
            repo.add(Client::new(*name));
        }
        repo.save().await.unwrap().inserted
    }
}

pub fn identity(username: &str) -> Identity {
    Identity::new(username, &format!("{}@example.com", username), "hash".into())
}

pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
