//! Permissions and their aggregation.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

/// Opaque permission tag, e.g. `expenses.read`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Permission(String);

impl Permission {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Permission {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for Permission {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl Borrow<str> for Permission {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deduplicated union of role-derived and user-specific permissions.
///
/// Callers must treat it as a set; iteration order is lexical only because
/// of the backing collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectivePermissionSet(BTreeSet<Permission>);

impl EffectivePermissionSet {
    /// Merge role-derived and user-specific permissions.
    pub fn union(
        role_permissions: impl IntoIterator<Item = Permission>,
        user_permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self(
            role_permissions
                .into_iter()
                .chain(user_permissions)
                .collect(),
        )
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.contains(permission)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }
}

impl IntoIterator for EffectivePermissionSet {
    type Item = Permission;
    type IntoIter = std::collections::btree_set::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Permission> for EffectivePermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
