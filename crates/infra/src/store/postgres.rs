//! Postgres-backed user and item stores.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |
//!
//! ## Reset tokens
//!
//! `consume_reset_token` is one `UPDATE ... WHERE reset_token_digest = $1 AND
//! reset_token_expiry > $2 RETURNING ...`; the row lock taken by the update
//! makes concurrent consumers of the same token serialize, and the loser
//! matches zero rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use sickfits_auth::{
    NewUser, PermissionSet, ResetTokenDigest, ResetTokenRecord, User, UserPatch,
};
use sickfits_core::{Email, ItemId, UserId};

use super::r#trait::{ItemStore, StoreError, UserStore};
use crate::catalog::{Item, ItemPatch, NewItem};

const SCHEMA: &str = include_str!("../../migrations/0001_users_items.sql");

const USER_COLUMNS: &str =
    "id, email, name, password_hash, permissions, reset_token_digest, reset_token_expiry";

const ITEM_COLUMNS: &str = "id, title, description, price, image, large_image, owner_id";

/// Create tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

/// Postgres-backed credential store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; every method is a
/// single statement.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self, email), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_email", e))?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    #[instrument(skip(self, digest), err)]
    async fn find_by_reset_token(
        &self,
        digest: &ResetTokenDigest,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE reset_token_digest = $1 AND reset_token_expiry > $2"
        ))
        .bind(digest.as_str())
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_reset_token", e))?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    #[instrument(skip(self, new_user), err)]
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = User::create(UserId::new(), new_user);
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, email, name, password_hash, permissions) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.permissions.labels())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;
        user_from_row(&row)
    }

    #[instrument(skip(self, patch), fields(user_id = %id), err)]
    async fn update(&self, id: UserId, patch: UserPatch) -> Result<User, StoreError> {
        let touch_reset = patch.reset.is_some();
        let reset = patch.reset.flatten();
        let row = sqlx::query(&format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                password_hash = COALESCE($3, password_hash), \
                permissions = COALESCE($4, permissions), \
                reset_token_digest = CASE WHEN $5 THEN $6 ELSE reset_token_digest END, \
                reset_token_expiry = CASE WHEN $5 THEN $7 ELSE reset_token_expiry END \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(patch.name)
        .bind(patch.password_hash)
        .bind(patch.permissions.map(|p| p.labels()))
        .bind(touch_reset)
        .bind(reset.as_ref().map(|r| r.digest.as_str().to_string()))
        .bind(reset.as_ref().map(|r| r.expires_at))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        match row {
            Some(row) => user_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip(self, digest, password_hash), err)]
    async fn consume_reset_token(
        &self,
        digest: &ResetTokenDigest,
        now: DateTime<Utc>,
        password_hash: String,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET \
                password_hash = $3, \
                reset_token_digest = NULL, \
                reset_token_expiry = NULL \
             WHERE reset_token_digest = $1 AND reset_token_expiry > $2 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(digest.as_str())
        .bind(now)
        .bind(password_hash)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("consume_reset_token", e))?;
        row.map(|r| user_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        rows.iter().map(user_from_row).collect()
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(format!("users row: {e}"));

    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let email: String = row.try_get("email").map_err(corrupt)?;
    let labels: Vec<String> = row.try_get("permissions").map_err(corrupt)?;
    let digest: Option<String> = row.try_get("reset_token_digest").map_err(corrupt)?;
    let expiry: Option<DateTime<Utc>> = row.try_get("reset_token_expiry").map_err(corrupt)?;

    let permissions = PermissionSet::from_labels(&labels)
        .map_err(|e| StoreError::Corrupt(format!("user {id}: {e}")))?;

    let reset = match (digest, expiry) {
        (Some(digest), Some(expires_at)) => Some(ResetTokenRecord {
            digest: ResetTokenDigest::from_stored(digest),
            expires_at,
        }),
        (None, None) => None,
        _ => {
            return Err(StoreError::Corrupt(format!(
                "user {id}: reset token digest and expiry must be set together"
            )));
        }
    };

    Ok(User {
        id: UserId::from_uuid(id),
        email: Email::from_stored(email),
        name: row.try_get("name").map_err(corrupt)?,
        password_hash: row.try_get("password_hash").map_err(corrupt)?,
        permissions,
        reset,
    })
}

/// Postgres-backed item store.
#[derive(Debug, Clone)]
pub struct PostgresItemStore {
    pool: Arc<PgPool>,
}

impl PostgresItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl ItemStore for PostgresItemStore {
    #[instrument(skip(self, new_item), err)]
    async fn create(&self, owner: Option<UserId>, new_item: NewItem) -> Result<Item, StoreError> {
        let item = Item::create(ItemId::new(), owner, new_item);
        let row = sqlx::query(&format!(
            "INSERT INTO items (id, title, description, price, image, large_image, owner_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item.id.as_uuid())
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.price)
        .bind(&item.image)
        .bind(&item.large_image)
        .bind(item.owner.map(Uuid::from))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_item", e))?;
        item_from_row(&row)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;
        row.map(|r| item_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at DESC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self, patch), fields(item_id = %id), err)]
    async fn update(&self, id: ItemId, patch: ItemPatch) -> Result<Item, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE items SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                price = COALESCE($4, price) \
             WHERE id = $1 \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.price)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        match row {
            Some(row) => item_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete(&self, id: ItemId) -> Result<Item, StoreError> {
        let row = sqlx::query(&format!("DELETE FROM items WHERE id = $1 RETURNING {ITEM_COLUMNS}"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;

        match row {
            Some(row) => item_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }
}

fn item_from_row(row: &sqlx::postgres::PgRow) -> Result<Item, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(format!("items row: {e}"));

    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let owner: Option<Uuid> = row.try_get("owner_id").map_err(corrupt)?;

    Ok(Item {
        id: ItemId::from_uuid(id),
        title: row.try_get("title").map_err(corrupt)?,
        description: row.try_get("description").map_err(corrupt)?,
        price: row.try_get("price").map_err(corrupt)?,
        image: row.try_get("image").map_err(corrupt)?,
        large_image: row.try_get("large_image").map_err(corrupt)?,
        owner: owner.map(UserId::from_uuid),
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
