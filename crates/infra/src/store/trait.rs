use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use sickfits_auth::{NewUser, ResetTokenDigest, User, UserPatch};
use sickfits_core::{ItemId, UserId};

use crate::catalog::{Item, ItemPatch, NewItem};

/// Persistence failure.
///
/// These are **infrastructure errors**; the orchestrator decides which of
/// them become user-facing messages.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (duplicate email).
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// The record addressed by an update/delete does not exist.
    #[error("record not found")]
    NotFound,

    /// A stored row could not be mapped back into a domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Anything else the backend reported.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// User records keyed by id, unique by normalized email.
///
/// ## Reset tokens
///
/// `find_by_reset_token` and `consume_reset_token` both apply the expiry
/// filter themselves: a record whose expiry is not after `now` never matches.
/// `consume_reset_token` is a single conditional write, so two concurrent
/// consumers of the same token cannot both succeed.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Exact match on the stored (lowercase) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_reset_token(
        &self,
        digest: &ResetTokenDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Insert a new user with `{USER}` permissions. Duplicate email → `Conflict`.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Patch an existing user. Missing id → `NotFound`.
    async fn update(&self, id: UserId, patch: UserPatch) -> Result<User, StoreError>;

    /// Atomically: if a user holds a live token with `digest`, set
    /// `password_hash`, clear the token, and return the updated record.
    async fn consume_reset_token(
        &self,
        digest: &ResetTokenDigest,
        now: DateTime<Utc>,
        password_hash: String,
    ) -> Result<Option<User>, StoreError>;

    async fn list(&self) -> Result<Vec<User>, StoreError>;
}

#[async_trait::async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_reset_token(
        &self,
        digest: &ResetTokenDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        (**self).find_by_reset_token(digest, now).await
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        (**self).create(new_user).await
    }

    async fn update(&self, id: UserId, patch: UserPatch) -> Result<User, StoreError> {
        (**self).update(id, patch).await
    }

    async fn consume_reset_token(
        &self,
        digest: &ResetTokenDigest,
        now: DateTime<Utc>,
        password_hash: String,
    ) -> Result<Option<User>, StoreError> {
        (**self).consume_reset_token(digest, now, password_hash).await
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        (**self).list().await
    }
}

/// Catalog items (collaborator storage; CRUD only).
#[async_trait::async_trait]
pub trait ItemStore: Send + Sync {
    async fn create(&self, owner: Option<UserId>, new_item: NewItem) -> Result<Item, StoreError>;

    async fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    async fn list(&self) -> Result<Vec<Item>, StoreError>;

    /// Missing id → `NotFound`.
    async fn update(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError>;

    /// Returns the deleted record. Missing id → `NotFound`.
    async fn delete(&self, id: ItemId) -> Result<Item, StoreError>;
}
