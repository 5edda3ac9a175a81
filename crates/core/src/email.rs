//! Normalized email address.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// An email address in its stored form: surrounding whitespace removed and
/// case-folded to lowercase.
///
/// Uniqueness and lookups in the credential store always operate on this form,
/// so `User@Example.com` and `USER@EXAMPLE.COM` name the same account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Normalize and minimally validate raw user input.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::validation("email must not be empty"));
        }
        match normalized.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(normalized))
            }
            _ => Err(DomainError::validation(format!(
                "'{normalized}' is not an email address"
            ))),
        }
    }

    /// Wrap a value already in stored form (e.g. read back from the database).
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
