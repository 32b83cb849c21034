use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;

/// Outcome of checking a candidate password against a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordVerification {
    Failed,
    Success,
    /// Matches, but the stored hash uses outdated algorithm or cost settings.
    SuccessRehashNeeded,
}

impl PasswordVerification {
    pub fn is_match(self) -> bool {
        !matches!(self, PasswordVerification::Failed)
    }
}

/// Hashing/verification strategy used by the credential store.
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash(&self, password: &str) -> anyhow::Result<String>;

    async fn verify(&self, hash: &str, password: &str) -> PasswordVerification;
}

/// Argon2id with PHC-formatted hashes. CPU work runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2Hasher {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn hash_blocking(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut rand::rngs::OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
        Ok(hash.to_string())
    }

    fn verify_blocking(&self, hash: &str, password: &str) -> PasswordVerification {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("stored password hash is not a valid PHC string: {}", e);
                return PasswordVerification::Failed;
            }
        };

        // Verification reads algorithm and costs from the hash itself.
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return PasswordVerification::Failed;
        }

        if self.is_outdated(&parsed) {
            PasswordVerification::SuccessRehashNeeded
        } else {
            PasswordVerification::Success
        }
    }

    fn is_outdated(&self, parsed: &PasswordHash<'_>) -> bool {
        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }
        match Params::try_from(parsed) {
            Ok(stored) => {
                stored.m_cost() != self.params.m_cost()
                    || stored.t_cost() != self.params.t_cost()
                    || stored.p_cost() != self.params.p_cost()
            }
            Err(_) => true,
        }
    }
}

#[async_trait]
impl CredentialHasher for Argon2Hasher {
    async fn hash(&self, password: &str) -> anyhow::Result<String> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password)).await?
    }

    async fn verify(&self, hash: &str, password: &str) -> PasswordVerification {
        let hasher = self.clone();
        let hash = hash.to_string();
        let password = password.to_string();
        match tokio::task::spawn_blocking(move || hasher.verify_blocking(&hash, &password)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("password verification task failed: {}", e);
                PasswordVerification::Failed
            }
        }
    }
}
