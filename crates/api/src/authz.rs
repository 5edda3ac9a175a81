//! API-side permission guard.
//!
//! Mutations are wrapped in [`Guarded`] with the labels they require, then
//! checked by the services layer before anything is written.

use sickfits_auth::{CommandAuthorization, Permission, PERMISSION_ADMINS};

/// A command paired with the labels that allow it (any-of).
#[derive(Debug)]
pub struct Guarded<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> Guarded<C> {
    /// Only a session is required.
    pub fn session_only(inner: C) -> Self {
        Self {
            inner,
            required: Vec::new(),
        }
    }

    pub fn any_of(inner: C, required: &[Permission]) -> Self {
        Self {
            inner,
            required: required.to_vec(),
        }
    }

    /// Managing users and their permissions.
    pub fn admin(inner: C) -> Self {
        Self::any_of(inner, PERMISSION_ADMINS)
    }
}

impl<C> CommandAuthorization for Guarded<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Item mutation policy.
///
/// Session presence is always required. Label checks are applied only when
/// enforcement is switched on.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemPolicy {
    pub enforce_labels: bool,
}

impl ItemPolicy {
    pub fn guard<C>(&self, inner: C, label: Permission) -> Guarded<C> {
        if self.enforce_labels {
            Guarded::any_of(inner, &[Permission::Admin, label])
        } else {
            Guarded::session_only(inner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_needs_only_a_session() {
        let cmd = ItemPolicy::default().guard((), Permission::ItemCreate);
        assert!(cmd.required_permissions().is_empty());
    }

    #[test]
    fn enforcing_policy_accepts_admin_or_label() {
        let cmd = ItemPolicy { enforce_labels: true }.guard((), Permission::ItemDelete);
        assert_eq!(
            cmd.required_permissions(),
            &[Permission::Admin, Permission::ItemDelete]
        );
    }

    #[test]
    fn admin_guard_lists_permission_managers() {
        let cmd = Guarded::admin(());
        assert!(cmd.required_permissions().contains(&Permission::PermissionsUpdate));
        assert!(cmd.required_permissions().contains(&Permission::Admin));
    }
}
