use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use sickfits_auth::{NewUser, ResetTokenDigest, User, UserPatch};
use sickfits_core::{Entity, ItemId, UserId};

use super::r#trait::{ItemStore, StoreError, UserStore};
use crate::catalog::{Item, ItemPatch, NewItem};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// Index `entity` under its own id and hand back a copy.
fn insert_entity<E: Entity + Clone>(map: &mut HashMap<E::Id, E>, entity: E) -> E {
    map.insert(*entity.id(), entity.clone());
    entity
}

/// In-memory user store.
///
/// Intended for tests/dev. Every operation takes the lock once, so the
/// uniqueness check in `create` and the match-then-clear in
/// `consume_reset_token` are atomic.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().find(|u| u.email.as_str() == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_reset_token(
        &self,
        digest: &ResetTokenDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users
            .values()
            .find(|u| u.has_live_reset_token(digest, now))
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' is already registered",
                new_user.email
            )));
        }

        Ok(insert_entity(&mut *users, User::create(UserId::new(), new_user)))
    }

    async fn update(&self, id: UserId, patch: UserPatch) -> Result<User, StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.apply(patch);
        Ok(user.clone())
    }

    async fn consume_reset_token(
        &self,
        digest: &ResetTokenDigest,
        now: DateTime<Utc>,
        password_hash: String,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let Some(user) = users
            .values_mut()
            .find(|u| u.has_live_reset_token(digest, now))
        else {
            return Ok(None);
        };

        user.apply(UserPatch::password_reset(password_hash));
        Ok(Some(user.clone()))
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        let mut all: Vec<User> = users.values().cloned().collect();
        // UUIDv7 ids sort by creation time.
        all.sort_by_key(|u| *u.id.as_uuid());
        Ok(all)
    }
}

/// In-memory item store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    items: RwLock<HashMap<ItemId, Item>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ItemStore for InMemoryItemStore {
    async fn create(&self, owner: Option<UserId>, new_item: NewItem) -> Result<Item, StoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        Ok(insert_entity(&mut *items, Item::create(ItemId::new(), owner, new_item)))
    }

    async fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Item>, StoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        let mut all: Vec<Item> = items.values().cloned().collect();
        all.sort_by_key(|i| std::cmp::Reverse(*i.id.as_uuid()));
        Ok(all)
    }

    async fn update(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let item = items.get_mut(&id).ok_or(StoreError::NotFound)?;
        item.apply(patch);
        Ok(item.clone())
    }

    async fn delete(&self, id: ItemId) -> Result<Item, StoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        items.remove(&id).ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use sickfits_auth::{PermissionSet, ResetToken, ResetTokenRecord};
    use sickfits_core::Email;

    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: Email::parse(email).unwrap(),
            name: "Test".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn create_enforces_unique_email() {
        let store = InMemoryUserStore::new();
        store.create(new_user("a@example.com")).await.unwrap();
        let err = store.create(new_user("A@EXAMPLE.COM")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn created_user_has_default_permissions() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("a@example.com")).await.unwrap();
        assert_eq!(user.permissions, PermissionSet::signup_default());
        assert_eq!(store.find_by_id(user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn find_by_email_is_exact_match() {
        let store = InMemoryUserStore::new();
        store.create(new_user("a@example.com")).await.unwrap();
        assert!(store.find_by_email("a@example.com").await.unwrap().is_some());
        assert!(store.find_by_email("A@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let store = InMemoryUserStore::new();
        let err = store.update(UserId::new(), UserPatch::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn reset_token_lookup_applies_expiry() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("a@example.com")).await.unwrap();
        let now = Utc::now();
        let (token, record) = ResetToken::issue(now, Duration::hours(1));
        store.update(user.id, UserPatch::reset_token(record)).await.unwrap();

        let digest = token.digest();
        assert!(store.find_by_reset_token(&digest, now).await.unwrap().is_some());
        assert!(store
            .find_by_reset_token(&digest, now + Duration::hours(2))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn consume_is_exactly_once() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("a@example.com")).await.unwrap();
        let now = Utc::now();
        let (token, record) = ResetToken::issue(now, Duration::hours(1));
        store.update(user.id, UserPatch::reset_token(record)).await.unwrap();

        let first = store
            .consume_reset_token(&token.digest(), now, "new-hash".to_string())
            .await
            .unwrap()
            .expect("first consume succeeds");
        assert_eq!(first.password_hash, "new-hash");
        assert!(first.reset.is_none());

        let second = store
            .consume_reset_token(&token.digest(), now, "other-hash".to_string())
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(store.find_by_id(user.id).await.unwrap().unwrap().password_hash, "new-hash");
    }

    #[tokio::test]
    async fn expired_token_is_not_consumed() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("a@example.com")).await.unwrap();
        let token = ResetToken::from_client("deadbeef");
        let record = ResetTokenRecord {
            digest: token.digest(),
            expires_at: Utc::now() - Duration::seconds(1),
        };
        store.update(user.id, UserPatch::reset_token(record)).await.unwrap();

        let res = store
            .consume_reset_token(&token.digest(), Utc::now(), "x".to_string())
            .await
            .unwrap();
        assert!(res.is_none());
        assert_eq!(store.find_by_id(user.id).await.unwrap().unwrap().password_hash, "hash");
    }

    #[tokio::test]
    async fn item_crud() {
        let store = InMemoryItemStore::new();
        let owner = UserId::new();
        let item = store
            .create(
                Some(owner),
                NewItem {
                    title: "Shoes".to_string(),
                    description: "Red".to_string(),
                    price: 5000,
                    image: None,
                    large_image: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(item.owner, Some(owner));

        let updated = store
            .update(
                item.id,
                ItemPatch {
                    price: Some(4000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 4000);
        assert_eq!(updated.title, "Shoes");

        let deleted = store.delete(item.id).await.unwrap();
        assert_eq!(deleted.id, item.id);
        assert!(store.get(item.id).await.unwrap().is_none());
        assert!(matches!(store.delete(item.id).await, Err(StoreError::NotFound)));
    }
}
