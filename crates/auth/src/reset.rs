//! One-time password reset tokens.
//!
//! The plaintext token exists only long enough to be mailed to the account
//! owner. The store keeps its SHA-256 digest next to an absolute expiry, so a
//! leaked user table does not hand out working reset links.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Random bytes per token (160 bits).
pub const RESET_TOKEN_BYTES: usize = 20;

/// How long an issued token stays usable.
pub fn default_reset_ttl() -> Duration {
    Duration::hours(1)
}

/// Plaintext reset token (lowercase hex).
#[derive(Clone, PartialEq, Eq)]
pub struct ResetToken(String);

impl ResetToken {
    /// Generate a fresh token and the record to persist for it.
    pub fn issue(now: DateTime<Utc>, ttl: Duration) -> (Self, ResetTokenRecord) {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let token = Self(hex::encode(bytes));
        let record = ResetTokenRecord {
            digest: token.digest(),
            expires_at: now + ttl,
        };
        (token, record)
    }

    /// Wrap a token presented by a client.
    pub fn from_client(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn digest(&self) -> ResetTokenDigest {
        ResetTokenDigest::of(&self.0)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ResetToken([redacted])")
    }
}

/// SHA-256 digest of a reset token, hex encoded for storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResetTokenDigest(String);

impl ResetTokenDigest {
    pub fn of(token: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Persisted half of a reset token: digest + absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetTokenRecord {
    pub digest: ResetTokenDigest,
    pub expires_at: DateTime<Utc>,
}

impl ResetTokenRecord {
    pub fn matches(&self, digest: &ResetTokenDigest) -> bool {
        &self.digest == digest
    }

    /// A token is live strictly before its expiry instant.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
