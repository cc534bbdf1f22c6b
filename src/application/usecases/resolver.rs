//! Effective permission resolution.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::application::error::Result;
use crate::application::ports::outbound::PermissionStore;
use crate::application::usecases::{DEFAULT_STORE_TIMEOUT, bounded};
use crate::domain::identity::Principal;
use crate::domain::permission::EffectivePermissionSet;

/// Resolves the permissions a principal holds right now.
///
/// Results are never cached: every issuance reads the store again so that
/// a revoked role stops granting its permissions on the next token.
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn PermissionStore>,
    timeout: Duration,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Update the bound applied to each store call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Union of role-derived and user-specific permissions.
    pub async fn resolve(
        &self,
        principal: &Principal,
    ) -> Result<EffectivePermissionSet> {
        let role_permissions = async {
            if principal.roles().is_empty() {
                return Ok(BTreeSet::new());
            }

            bounded(
                self.timeout,
                self.store.permissions_for_roles(principal.roles()),
            )
            .await
        };
        let user_permissions = bounded(
            self.timeout,
            self.store.permissions_for_user(principal.id()),
        );

        let (role_permissions, user_permissions) =
            tokio::try_join!(role_permissions, user_permissions)?;

        Ok(EffectivePermissionSet::union(
            role_permissions,
            user_permissions,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::ApplicationError;
    use crate::application::usecases::fixtures::seeded_store;
    use crate::domain::identity::{Account, PrincipalId, RoleName};
    use crate::domain::permission::Permission;
    use async_trait::async_trait;

    fn principal(roles: &[&str]) -> Principal {
        Principal::new(
            Account::new(PrincipalId::parse("42").unwrap(), "alice"),
            roles.iter().copied().map(RoleName::from).collect(),
        )
    }

    struct UnreachableStore;

    #[async_trait]
    impl PermissionStore for UnreachableStore {
        async fn permissions_for_roles(
            &self,
            _roles: &BTreeSet<RoleName>,
        ) -> Result<BTreeSet<Permission>> {
            Ok(BTreeSet::from([Permission::from("expenses.read")]))
        }

        async fn permissions_for_user(
            &self,
            _id: &PrincipalId,
        ) -> Result<BTreeSet<Permission>> {
            Err(ApplicationError::unavailable(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )))
        }
    }

    struct StalledStore;

    #[async_trait]
    impl PermissionStore for StalledStore {
        async fn permissions_for_roles(
            &self,
            _roles: &BTreeSet<RoleName>,
        ) -> Result<BTreeSet<Permission>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(BTreeSet::new())
        }

        async fn permissions_for_user(
            &self,
            _id: &PrincipalId,
        ) -> Result<BTreeSet<Permission>> {
            Ok(BTreeSet::new())
        }
    }

    #[tokio::test]
    async fn test_resolve_union() {
        let resolver = PermissionResolver::new(Arc::new(seeded_store()));
        let permissions = resolver.resolve(&principal(&["Admin"])).await.unwrap();

        let expected: EffectivePermissionSet =
            ["expenses.read", "expenses.write", "reports.export"]
                .into_iter()
                .map(Permission::from)
                .collect();
        assert_eq!(permissions, expected);
    }

    #[tokio::test]
    async fn test_resolve_without_roles() {
        let resolver = PermissionResolver::new(Arc::new(seeded_store()));
        let permissions = resolver.resolve(&principal(&[])).await.unwrap();

        assert_eq!(permissions.len(), 1);
        assert!(permissions.contains("reports.export"));
    }

    #[tokio::test]
    async fn test_overlapping_sources_are_deduplicated() {
        let store = seeded_store();
        store.grant_user_permission("42", "expenses.read");
        let resolver = PermissionResolver::new(Arc::new(store));

        let permissions = resolver.resolve(&principal(&["Admin"])).await.unwrap();
        assert_eq!(permissions.len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_not_empty_set() {
        let resolver = PermissionResolver::new(Arc::new(UnreachableStore));
        let err = resolver.resolve(&principal(&["Admin"])).await.unwrap_err();

        assert!(matches!(err, ApplicationError::DependencyUnavailable(_)));
    }

    #[tokio::test]
    async fn test_stalled_store_times_out() {
        let resolver = PermissionResolver::new(Arc::new(StalledStore))
            .with_timeout(Duration::from_millis(20));
        let err = resolver.resolve(&principal(&["Admin"])).await.unwrap_err();

        assert!(matches!(err, ApplicationError::DependencyUnavailable(_)));
    }
}
