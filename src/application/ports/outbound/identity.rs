//! Identity store port, including the refresh token fields it owns.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::error::Result;
use crate::domain::identity::{Account, PrincipalId, RoleName};
use crate::domain::token::RefreshRecord;

/// Result of a conditional refresh token replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareAndSwapOutcome {
    /// Stored token matched and was overwritten.
    Updated,
    /// Stored token was absent or differed; nothing was written.
    Mismatch,
}

/// Port for account lookups and refresh token persistence.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find an account by identifier.
    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Account>>;

    /// Roles currently held by an account.
    async fn roles(&self, account: &Account) -> Result<BTreeSet<RoleName>>;

    /// Refresh token currently stored for a principal, if any.
    async fn refresh_record(
        &self,
        id: &PrincipalId,
    ) -> Result<Option<RefreshRecord>>;

    /// Overwrite the refresh token of a principal unconditionally.
    ///
    /// Returns [`ApplicationError::InvalidPrincipal`] when the principal does
    /// not exist.
    ///
    /// [`ApplicationError::InvalidPrincipal`]: crate::application::error::ApplicationError::InvalidPrincipal
    async fn persist_refresh_token(
        &self,
        id: &PrincipalId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Overwrite the refresh token only if the stored value still equals
    /// `expected`. Check and write are a single atomic step.
    async fn replace_refresh_token(
        &self,
        id: &PrincipalId,
        expected: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<CompareAndSwapOutcome>;
}
