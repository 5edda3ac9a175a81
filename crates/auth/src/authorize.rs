//! The permission gate.
//!
//! Every guarded mutation runs through [`authorize_command`]: first a session
//! must be present, then the caller must hold at least one of the labels the
//! command declares. Commands that only need a signed-in caller declare none.

use serde::Serialize;
use thiserror::Error;

use sickfits_core::UserId;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("You must be logged in to do that!")]
    Unauthenticated,

    #[error("You do not have sufficient permissions: {required}. You have: {held}")]
    Forbidden { required: String, held: String },
}

/// Command-side authorization contract.
///
/// Implement this on mutations that need more than "signed in". The check is
/// any-of: holding one listed label is enough.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Fail with `Unauthenticated` unless a session identity is present.
pub fn require_session(session: Option<UserId>) -> Result<UserId, AuthzError> {
    session.ok_or(AuthzError::Unauthenticated)
}

/// Pure policy check: does `principal` hold any of `required`?
///
/// An empty requirement list only needs the caller to exist.
pub fn authorize(principal: &Principal, required: &[Permission]) -> Result<(), AuthzError> {
    if required.is_empty() || principal.permissions.contains_any(required) {
        return Ok(());
    }

    Err(AuthzError::Forbidden {
        required: join(required.iter().copied()),
        held: join(principal.permissions.iter()),
    })
}

/// Gate a command for an optional caller.
pub fn authorize_command<C: CommandAuthorization>(
    principal: Option<&Principal>,
    command: &C,
) -> Result<UserId, AuthzError> {
    let principal = principal.ok_or(AuthzError::Unauthenticated)?;
    authorize(principal, command.required_permissions())?;
    Ok(principal.user_id)
}

fn join(perms: impl Iterator<Item = Permission>) -> String {
    perms.map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Why a request was (or would be) allowed or denied. Logged on denial.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_any_of: Vec<Permission>,
    pub held: Vec<Permission>,
    pub granted: bool,
    pub reason: String,
}

pub fn explain_authorization(principal: &Principal, required: &[Permission]) -> AuthorizationExplanation {
    let held: Vec<Permission> = principal.permissions.iter().collect();
    let granted = authorize(principal, required).is_ok();

    let reason = if required.is_empty() {
        "no permission label required; a signed-in caller suffices".to_string()
    } else if granted {
        let matched: Vec<&str> = required
            .iter()
            .filter(|p| principal.permissions.contains(**p))
            .map(|p| p.as_str())
            .collect();
        format!("caller holds {}", matched.join(", "))
    } else {
        format!(
            "caller holds none of {}; grant one via updatePermissions",
            join(required.iter().copied())
        )
    };

    AuthorizationExplanation {
        required_any_of: required.to_vec(),
        held,
        granted,
        reason,
    }
}

/// Labels that allow managing other users' permissions.
pub const PERMISSION_ADMINS: &[Permission] = &[Permission::Admin, Permission::PermissionsUpdate];

#[cfg(test)]
mod tests {
    use super::*;

    struct Guarded(Vec<Permission>);

    impl CommandAuthorization for Guarded {
        fn required_permissions(&self) -> &[Permission] {
            &self.0
        }
    }

    fn principal(perms: &[Permission]) -> Principal {
        Principal::new(UserId::new(), perms.iter().copied().collect())
    }

    #[test]
    fn missing_session_is_unauthenticated() {
        assert_eq!(require_session(None), Err(AuthzError::Unauthenticated));
        assert_eq!(
            authorize_command(None, &Guarded(vec![])),
            Err(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn session_only_commands_pass_for_any_user() {
        let p = principal(&[Permission::User]);
        assert_eq!(authorize_command(Some(&p), &Guarded(vec![])), Ok(p.user_id));
    }

    #[test]
    fn any_of_semantics() {
        let p = principal(&[Permission::User, Permission::PermissionsUpdate]);
        assert!(authorize(&p, PERMISSION_ADMINS).is_ok());

        let plain = principal(&[Permission::User]);
        let err = authorize(&plain, PERMISSION_ADMINS).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ADMIN, PERMISSIONSUPDATE"));
        assert!(msg.contains("You have: USER"));
    }

    #[test]
    fn explanation_matches_decision() {
        let plain = principal(&[Permission::User]);
        let denied = explain_authorization(&plain, &[Permission::ItemDelete]);
        assert!(!denied.granted);
        assert!(denied.reason.contains("ITEMDELETE"));

        let admin = principal(&[Permission::Admin]);
        let granted = explain_authorization(&admin, PERMISSION_ADMINS);
        assert!(granted.granted);
        assert_eq!(granted.reason, "caller holds ADMIN");
    }
}
