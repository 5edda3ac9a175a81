use core::str::FromStr;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use sickfits_core::DomainError;

/// Permission label from the fixed storefront vocabulary.
///
/// Variant order is the canonical display order; `PermissionSet` iterates in it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Admin,
    User,
    ItemCreate,
    ItemUpdate,
    ItemDelete,
    PermissionsUpdate,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::Admin,
        Permission::User,
        Permission::ItemCreate,
        Permission::ItemUpdate,
        Permission::ItemDelete,
        Permission::PermissionsUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Admin => "ADMIN",
            Permission::User => "USER",
            Permission::ItemCreate => "ITEMCREATE",
            Permission::ItemUpdate => "ITEMUPDATE",
            Permission::ItemDelete => "ITEMDELETE",
            Permission::PermissionsUpdate => "PERMISSIONSUPDATE",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::unknown_permission(s))
    }
}

/// Ordered, duplicate-free set of permission labels held by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set every freshly signed-up account starts with.
    pub fn signup_default() -> Self {
        [Permission::User].into_iter().collect()
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// True when at least one of `required` is held.
    pub fn contains_any(&self, required: &[Permission]) -> bool {
        required.iter().any(|p| self.0.contains(p))
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Labels in canonical order, as stored in the database.
    pub fn labels(&self) -> Vec<String> {
        self.iter().map(|p| p.as_str().to_string()).collect()
    }

    /// Parse stored labels; any label outside the vocabulary is an error.
    pub fn from_labels<I, S>(labels: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels
            .into_iter()
            .map(|l| l.as_ref().parse::<Permission>())
            .collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl core::fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.labels().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_exactly() {
        assert_eq!("ITEMDELETE".parse::<Permission>().unwrap(), Permission::ItemDelete);
        assert!("itemdelete".parse::<Permission>().is_err());
        assert!("SUPERUSER".parse::<Permission>().is_err());
    }

    #[test]
    fn serde_uses_uppercase_labels() {
        let json = serde_json::to_string(&Permission::PermissionsUpdate).unwrap();
        assert_eq!(json, "\"PERMISSIONSUPDATE\"");

        let set: PermissionSet = serde_json::from_str(r#"["USER","ADMIN","USER"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["ADMIN","USER"]"#);
    }

    #[test]
    fn unknown_label_fails_deserialization() {
        let res: Result<PermissionSet, _> = serde_json::from_str(r#"["USER","ROOT"]"#);
        assert!(res.is_err());
    }

    #[test]
    fn signup_default_is_user_only() {
        let set = PermissionSet::signup_default();
        assert_eq!(set.labels(), vec!["USER".to_string()]);
    }

    #[test]
    fn contains_any_semantics() {
        let set: PermissionSet = [Permission::User, Permission::ItemCreate].into_iter().collect();
        assert!(set.contains_any(&[Permission::Admin, Permission::ItemCreate]));
        assert!(!set.contains_any(&[Permission::Admin, Permission::PermissionsUpdate]));
        assert!(!set.contains_any(&[]));
    }

    #[test]
    fn from_labels_rejects_unknown() {
        let err = PermissionSet::from_labels(["USER", "nope"]).unwrap_err();
        assert_eq!(err, DomainError::unknown_permission("nope"));
    }
}
