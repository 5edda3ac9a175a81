//! Infrastructure layer: persistence, mail transport, configuration.

pub mod catalog;
pub mod config;
pub mod mail;
pub mod store;

pub use catalog::{Item, ItemPatch, NewItem};
pub use config::{AppConfig, ConfigError, SmtpSettings};
pub use mail::{InMemoryOutbox, MailError, Mailer, OutgoingMail, SmtpMailer};
pub use store::{
    InMemoryItemStore, InMemoryUserStore, ItemStore, PostgresItemStore, PostgresUserStore,
    StoreError, UserStore,
};
