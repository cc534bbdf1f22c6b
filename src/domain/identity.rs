//! Principal identity logic.

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::error::{DomainError, Result};

const MAX_ID_LENGTH: usize = 128;

/// Value object of a valid principal identifier.
///
/// Identifiers are opaque: the service never interprets them beyond
/// checking they can safely travel inside a token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Converts a string into a valid [`PrincipalId`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the trimmed string is empty, longer than 128 bytes
    /// or contains control characters.
    pub fn parse(id: impl AsRef<str>) -> Result<Self> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() || trimmed.len() > MAX_ID_LENGTH {
            return Err(DomainError::InvalidIdFormat);
        }

        if trimmed.chars().any(char::is_control) {
            return Err(DomainError::InvalidIdFormat);
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PrincipalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of a role held by a principal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleName(String);

impl RoleName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoleName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account as read from the identity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: PrincipalId,
    /// Display name. Required to issue a token.
    pub username: Option<String>,
}

impl Account {
    pub fn new(id: PrincipalId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: Some(username.into()),
        }
    }
}

/// An account together with the roles it currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    account: Account,
    roles: BTreeSet<RoleName>,
}

impl Principal {
    pub fn new(account: Account, roles: BTreeSet<RoleName>) -> Self {
        Self { account, roles }
    }

    pub fn id(&self) -> &PrincipalId {
        &self.account.id
    }

    pub fn username(&self) -> Option<&str> {
        self.account.username.as_deref()
    }

    pub fn roles(&self) -> &BTreeSet<RoleName> {
        &self.roles
    }
}
