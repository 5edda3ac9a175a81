//! Argon2 password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...`), so the salt and work
//! factor travel with the hash and verification needs no extra config.
//!
//! Hashing is CPU-bound; the async entry points run it on tokio's blocking
//! pool so a burst of signups cannot stall other requests.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("hashing task failed: {0}")]
    Task(String),
}

/// Salted adaptive password hashing with a fixed work factor.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl Default for PasswordService {
    /// Argon2id with the crate's production defaults
    /// (memory = 19456 KiB, iterations = 2, parallelism = 1).
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl core::fmt::Debug for PasswordService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordService").finish_non_exhaustive()
    }
}

impl PasswordService {
    /// Argon2id with explicit cost parameters.
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Cheap parameters for tests. MUST NOT be used in production.
    pub fn insecure_fast() -> Self {
        Self::with_params(1024, 1, 1).unwrap_or_default()
    }

    /// Hash synchronously (caller is responsible for being off the async path).
    pub fn hash_blocking(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    /// Verify synchronously. A malformed stored hash counts as a mismatch.
    pub fn verify_blocking(&self, plaintext: &str, stored_hash: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is not a valid PHC string");
                return false;
            }
        };
        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }

}

/// Async password hashing as the request path sees it.
#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash(&self, plaintext: String) -> Result<String, PasswordError>;

    /// `Ok(false)` on mismatch or an unparseable stored hash.
    async fn verify(&self, plaintext: String, stored_hash: String) -> Result<bool, PasswordError>;
}

#[async_trait::async_trait]
impl CredentialHasher for PasswordService {
    async fn hash(&self, plaintext: String) -> Result<String, PasswordError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.hash_blocking(&plaintext))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
    }

    async fn verify(&self, plaintext: String, stored_hash: String) -> Result<bool, PasswordError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.verify_blocking(&plaintext, &stored_hash))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))
    }
}
