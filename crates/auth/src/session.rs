//! Signed session tokens and the cookie that carries them.
//!
//! The token is an HS256 JWT whose only identity claim is the user id. There
//! is no `exp` claim: a token stays valid for as long as the signing secret is
//! unchanged, and rotating the secret is the only revocation mechanism (it
//! signs everybody out at once). The browser forgets the cookie after one year.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sickfits_core::UserId;

/// Name of the cookie holding the session token.
pub const SESSION_COOKIE_NAME: &str = "token";

/// Client-side lifetime of the session cookie.
pub fn default_cookie_max_age() -> Duration {
    Duration::days(365)
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: UserId,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("failed to sign session token: {0}")]
    Sign(String),

    #[error("session token rejected: {0}")]
    Invalid(String),
}

/// Issues and verifies session tokens with the process-wide signing secret.
#[derive(Clone)]
pub struct SessionTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl core::fmt::Debug for SessionTokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionTokenService").finish_non_exhaustive()
    }
}

impl SessionTokenService {
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
        }
    }

    pub fn issue(&self, user_id: UserId) -> Result<String, SessionTokenError> {
        let claims = SessionClaims {
            user_id,
            iat: Utc::now().timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionTokenError::Sign(e.to_string()))
    }

    /// Check the signature and return the identity claim.
    pub fn verify(&self, token: &str) -> Result<UserId, SessionTokenError> {
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.user_id)
            .map_err(|e| SessionTokenError::Invalid(e.to_string()))
    }
}

/// Builds `Set-Cookie` values for the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    max_age: Duration,
    secure: bool,
}

impl Default for SessionCookie {
    fn default() -> Self {
        Self {
            max_age: default_cookie_max_age(),
            secure: false,
        }
    }
}

impl SessionCookie {
    pub fn new(max_age: Duration, secure: bool) -> Self {
        Self { max_age, secure }
    }

    /// HTTP-only cookie holding `token`, kept by the browser for `max_age`.
    pub fn attach(&self, token: &str) -> String {
        self.render(token, self.max_age.num_seconds())
    }

    /// Cookie that makes the browser drop the session immediately.
    pub fn clear(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age_secs: i64) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Find the session token in a `Cookie` request header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME)
            .then(|| value.trim())
            .filter(|v| !v.is_empty())
    })
}
