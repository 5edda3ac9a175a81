//! User account record as held by the credential store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sickfits_core::{Email, Entity, UserId};

use crate::reset::{ResetTokenDigest, ResetTokenRecord};
use crate::PermissionSet;

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A storefront account.
///
/// # Invariants
/// - `email` is always in normalized (lowercase) form.
/// - A freshly created account holds exactly `{USER}`.
/// - Reset token digest and expiry live together in `reset`; one cannot be
///   present without the other.
///
/// `password_hash` and `reset` never leave the server: API responses are built
/// from [`User::profile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub password_hash: String,
    pub permissions: PermissionSet,
    pub reset: Option<ResetTokenRecord>,
}

impl User {
    /// Build the record for a new account (`{USER}` permissions, no reset token).
    pub fn create(id: UserId, new_user: NewUser) -> Self {
        Self {
            id,
            email: new_user.email,
            name: new_user.name,
            password_hash: new_user.password_hash,
            permissions: PermissionSet::signup_default(),
            reset: None,
        }
    }

    /// Client-visible projection of the account.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            permissions: self.permissions.clone(),
        }
    }

    /// True when this record carries a reset token matching `digest` that has
    /// not expired at `now`.
    pub fn has_live_reset_token(&self, digest: &ResetTokenDigest, now: DateTime<Utc>) -> bool {
        self.reset
            .as_ref()
            .is_some_and(|r| r.matches(digest) && r.is_live(now))
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(hash) = patch.password_hash {
            self.password_hash = hash;
        }
        if let Some(permissions) = patch.permissions {
            self.permissions = permissions;
        }
        if let Some(reset) = patch.reset {
            self.reset = reset;
        }
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Fields supplied on signup. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: String,
    pub password_hash: String,
}

/// Partial update. `None` leaves a field untouched; `reset: Some(None)` clears
/// the reset token.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub permissions: Option<PermissionSet>,
    pub reset: Option<Option<ResetTokenRecord>>,
}

impl UserPatch {
    pub fn permissions(permissions: PermissionSet) -> Self {
        Self {
            permissions: Some(permissions),
            ..Default::default()
        }
    }

    pub fn reset_token(record: ResetTokenRecord) -> Self {
        Self {
            reset: Some(Some(record)),
            ..Default::default()
        }
    }

    /// New password hash with the reset token cleared.
    pub fn password_reset(password_hash: String) -> Self {
        Self {
            password_hash: Some(password_hash),
            reset: Some(None),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

/// The `User` payload returned by every auth mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub permissions: PermissionSet,
}
