//! Credential and catalog persistence boundary.
//!
//! The auth core only talks to [`UserStore`] and [`ItemStore`]; the in-memory
//! implementations back tests and local development, the Postgres ones back
//! deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryItemStore, InMemoryUserStore};
pub use postgres::{PostgresItemStore, PostgresUserStore};
pub use r#trait::{ItemStore, StoreError, UserStore};
