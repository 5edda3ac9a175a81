use sickfits_core::UserId;

use crate::{PermissionSet, User};

/// A signed-in caller, resolved from the session cookie and the store.
///
/// This is the authorization boundary object: it says *who* is acting and
/// which permission labels they hold right now (read fresh from the store on
/// each request, not from the token).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub permissions: PermissionSet,
}

impl Principal {
    pub fn new(user_id: UserId, permissions: PermissionSet) -> Self {
        Self {
            user_id,
            permissions,
        }
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.permissions.clone())
    }
}
