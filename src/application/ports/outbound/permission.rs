//! Permission store port.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::application::error::Result;
use crate::domain::identity::{PrincipalId, RoleName};
use crate::domain::permission::Permission;

/// Port for permission lookups.
///
/// Implementations must return [`ApplicationError::DependencyUnavailable`]
/// when the backing store cannot be reached, never an empty result.
///
/// [`ApplicationError::DependencyUnavailable`]: crate::application::error::ApplicationError::DependencyUnavailable
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Permissions granted by any of the given roles.
    async fn permissions_for_roles(
        &self,
        roles: &BTreeSet<RoleName>,
    ) -> Result<BTreeSet<Permission>>;

    /// Permissions attached directly to a principal.
    async fn permissions_for_user(
        &self,
        id: &PrincipalId,
    ) -> Result<BTreeSet<Permission>>;
}
