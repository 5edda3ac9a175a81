//! Process configuration, loaded once at startup.
//!
//! `APP_SECRET` and `FRONTEND_URL` are required; a missing or malformed value
//! is a startup failure, never a per-request error. Everything else has a
//! default.
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `APP_SECRET` | yes | |
//! | `FRONTEND_URL` | yes | |
//! | `BIND_ADDR` | no | `0.0.0.0:4444` |
//! | `DATABASE_URL` | no | in-memory store |
//! | `MAIL_HOST` | no | in-memory outbox |
//! | `MAIL_PORT` | no | `587` |
//! | `MAIL_USER` / `MAIL_PASS` | no | unauthenticated |
//! | `MAIL_FROM` | no | `Sick Fits <noreply@sickfits.dev>` |
//! | `MAIL_TLS` | no | `true` |
//! | `ENFORCE_ITEM_PERMISSIONS` | no | `false` |

use std::net::SocketAddr;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4444";
const DEFAULT_MAIL_PORT: u16 = 587;
const DEFAULT_MAIL_FROM: &str = "Sick Fits <noreply@sickfits.dev>";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// SMTP relay settings.
#[derive(Debug)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from: String,
    pub use_tls: bool,
}

#[derive(Debug)]
pub struct AppConfig {
    /// Session-token signing key. Never rotated at runtime.
    pub app_secret: SecretString,
    /// Storefront origin used to build reset links.
    pub frontend_url: Url,
    pub bind_addr: SocketAddr,
    pub database_url: Option<SecretString>,
    pub smtp: Option<SmtpSettings>,
    /// Require ITEMCREATE/ITEMUPDATE/ITEMDELETE on item mutations.
    pub enforce_item_permissions: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let app_secret = get("APP_SECRET")
            .map(SecretString::from)
            .ok_or(ConfigError::Missing("APP_SECRET"))?;

        let frontend_raw = get("FRONTEND_URL").ok_or(ConfigError::Missing("FRONTEND_URL"))?;
        let frontend_url = Url::parse(frontend_raw.trim()).map_err(|e| ConfigError::Invalid {
            name: "FRONTEND_URL",
            reason: e.to_string(),
        })?;

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let smtp = match get("MAIL_HOST") {
            Some(host) => {
                let port = match get("MAIL_PORT") {
                    Some(p) => p.parse().map_err(|_| ConfigError::Invalid {
                        name: "MAIL_PORT",
                        reason: format!("'{p}' is not a port number"),
                    })?,
                    None => DEFAULT_MAIL_PORT,
                };
                Some(SmtpSettings {
                    host,
                    port,
                    username: get("MAIL_USER"),
                    password: get("MAIL_PASS").map(SecretString::from),
                    from: get("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
                    use_tls: get("MAIL_TLS").map(|v| parse_flag(&v)).unwrap_or(true),
                })
            }
            None => None,
        };

        Ok(Self {
            app_secret,
            frontend_url,
            bind_addr,
            database_url: get("DATABASE_URL").map(SecretString::from),
            smtp,
            enforce_item_permissions: get("ENFORCE_ITEM_PERMISSIONS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        })
    }

    /// Mark the session cookie `Secure` when the storefront is served over https.
    pub fn cookie_secure(&self) -> bool {
        self.frontend_url.scheme() == "https"
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
