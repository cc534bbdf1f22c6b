//! Claim set embedded in access tokens.
//!
//! A [`ClaimSet`] is the authorization snapshot of a principal at issuance
//! time: identity, display name, roles and effective permissions. It is
//! assembled once per issuance and consumed by signing.

use crate::domain::error::{DomainError, Result};
use crate::domain::identity::{Principal, PrincipalId, RoleName};
use crate::domain::permission::{EffectivePermissionSet, Permission};

/// Immutable claims of an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    subject: PrincipalId,
    name: String,
    roles: Vec<RoleName>,
    permissions: Vec<Permission>,
}

impl ClaimSet {
    pub fn builder() -> ClaimSetBuilder {
        ClaimSetBuilder::default()
    }

    pub fn subject(&self) -> &PrincipalId {
        &self.subject
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles(&self) -> &[RoleName] {
        &self.roles
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }
}

/// Builder for creating claim sets step by step.
#[derive(Debug, Default)]
pub struct ClaimSetBuilder {
    principal: Option<Principal>,
    permissions: Option<EffectivePermissionSet>,
}

impl ClaimSetBuilder {
    pub fn principal(mut self, principal: &Principal) -> Self {
        self.principal = Some(principal.clone());
        self
    }

    pub fn permissions(mut self, permissions: EffectivePermissionSet) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Build the [`ClaimSet`].
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidPrincipal`] when the principal, its
    /// username or the permission set is missing. An empty username counts
    /// as missing.
    pub fn build(self) -> Result<ClaimSet> {
        let principal = self
            .principal
            .ok_or(DomainError::InvalidPrincipal { field: "principal" })?;
        let permissions = self.permissions.ok_or(
            DomainError::InvalidPrincipal {
                field: "permissions",
            },
        )?;

        let name = principal
            .username()
            .filter(|name| !name.trim().is_empty())
            .ok_or(DomainError::InvalidPrincipal { field: "username" })?
            .to_owned();

        Ok(ClaimSet {
            subject: principal.id().clone(),
            name,
            roles: principal.roles().iter().cloned().collect(),
            permissions: permissions.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::Account;

    fn principal(username: Option<&str>) -> Principal {
        let account = Account {
            id: PrincipalId::parse("12").unwrap(),
            username: username.map(str::to_owned),
        };
        let roles = ["Admin", "Clerk"].into_iter().map(RoleName::from).collect();
        Principal::new(account, roles)
    }

    fn permissions() -> EffectivePermissionSet {
        ["expenses.write", "expenses.read"]
            .into_iter()
            .map(Permission::from)
            .collect()
    }

    #[test]
    fn test_build_claims() {
        let claims = ClaimSet::builder()
            .principal(&principal(Some("alice")))
            .permissions(permissions())
            .build()
            .unwrap();

        assert_eq!(claims.subject().as_str(), "12");
        assert_eq!(claims.name(), "alice");
        assert_eq!(claims.roles().len(), 2);
        assert_eq!(claims.permissions().len(), 2);
    }

    #[test]
    fn test_build_is_deterministic() {
        let build = || {
            ClaimSet::builder()
                .principal(&principal(Some("alice")))
                .permissions(permissions())
                .build()
                .unwrap()
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn test_missing_username() {
        let err = ClaimSet::builder()
            .principal(&principal(None))
            .permissions(permissions())
            .build()
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidPrincipal { field: "username" });

        let err = ClaimSet::builder()
            .principal(&principal(Some("  ")))
            .permissions(permissions())
            .build()
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidPrincipal { field: "username" });
    }

    #[test]
    fn test_missing_parts() {
        let err = ClaimSet::builder().permissions(permissions()).build();
        assert!(matches!(err, Err(DomainError::InvalidPrincipal { .. })));

        let err = ClaimSet::builder()
            .principal(&principal(Some("alice")))
            .build();
        assert!(matches!(err, Err(DomainError::InvalidPrincipal { .. })));
    }
}
