//! Identity creation and lookup on top of an [`IdentityStore`].

use std::sync::Arc;

use thiserror::Error;

use super::password::{CredentialHasher, PasswordVerification};
use crate::errors::PersistenceError;
use crate::models::identity::{Identity, IdentityError};
use crate::store::IdentityStore;

const ALLOWED_USERNAME_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-._@+";

#[derive(Debug, Error)]
pub enum CreateIdentityError {
    #[error("identity rejected: {0:?}")]
    Rejected(Vec<IdentityError>),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("password hashing failed: {0}")]
    Hashing(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub required_length: usize,
    pub require_non_alphanumeric: bool,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            required_length: 6,
            require_non_alphanumeric: true,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
        }
    }
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> Vec<IdentityError> {
        let mut errors = Vec::new();
        if password.chars().count() < self.required_length {
            errors.push(IdentityError::new(
                "PasswordTooShort",
                format!("Passwords must be at least {} characters.", self.required_length),
            ));
        }
        if self.require_non_alphanumeric && password.chars().all(|c| c.is_alphanumeric()) {
            errors.push(IdentityError::new(
                "PasswordRequiresNonAlphanumeric",
                "Passwords must have at least one non alphanumeric character.",
            ));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push(IdentityError::new(
                "PasswordRequiresDigit",
                "Passwords must have at least one digit ('0'-'9').",
            ));
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            errors.push(IdentityError::new(
                "PasswordRequiresLower",
                "Passwords must have at least one lowercase ('a'-'z').",
            ));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            errors.push(IdentityError::new(
                "PasswordRequiresUpper",
                "Passwords must have at least one uppercase ('A'-'Z').",
            ));
        }
        errors
    }
}

fn check_username(username: &str) -> Option<IdentityError> {
    if username.is_empty() || !username.chars().all(|c| ALLOWED_USERNAME_CHARS.contains(c)) {
        return Some(IdentityError::new(
            "InvalidUserName",
            format!(
                "Username '{}' is invalid, can only contain letters or digits.",
                username
            ),
        ));
    }
    None
}

fn duplicate_username(username: &str) -> IdentityError {
    IdentityError::new(
        "DuplicateUserName",
        format!("Username '{}' is already taken.", username),
    )
}

pub struct UserManager {
    store: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
    policy: PasswordPolicy,
}

impl UserManager {
    pub fn new(store: Arc<dyn IdentityStore>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            store,
            hasher,
            policy: PasswordPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn find_by_name(&self, username: &str) -> Result<Option<Identity>, PersistenceError> {
        self.store.find_by_username(username).await
    }

    pub async fn check_password(&self, identity: &Identity, password: &str) -> PasswordVerification {
        self.hasher.verify(&identity.password_hash, password).await
    }

    pub async fn list(&self) -> Result<Vec<Identity>, PersistenceError> {
        self.store.list().await
    }

    /// Validate, hash and persist a new identity. All rule violations are reported together.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, CreateIdentityError> {
        let mut errors = Vec::new();
        if let Some(err) = check_username(username) {
            errors.push(err);
        } else if self.store.find_by_username(username).await?.is_some() {
            errors.push(duplicate_username(username));
        }
        errors.extend(self.policy.check(password));

        if !errors.is_empty() {
            return Err(CreateIdentityError::Rejected(errors));
        }

        self.persist(username, email, password).await
    }

    /// Create an identity without the password policy. Returns `false` when the
    /// username already exists.
    pub async fn seed(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<bool, CreateIdentityError> {
        if self.store.find_by_username(username).await?.is_some() {
            return Ok(false);
        }
        if let Some(err) = check_username(username) {
            return Err(CreateIdentityError::Rejected(vec![err]));
        }
        self.persist(username, email, password).await?;
        Ok(true)
    }

    async fn persist(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, CreateIdentityError> {
        let hash = self
            .hasher
            .hash(password)
            .await
            .map_err(CreateIdentityError::Hashing)?;
        let identity = Identity::new(username, email, hash);

        match self.store.insert(&identity).await {
            Ok(()) => {
                tracing::info!(username = %identity.username, id = %identity.id, "identity created");
                Ok(identity)
            }
            // Lost a race with a concurrent registration of the same name.
            Err(PersistenceError::Conflict(_)) => Err(CreateIdentityError::Rejected(vec![
                duplicate_username(username),
            ])),
            Err(e) => Err(e.into()),
        }
    }
}
