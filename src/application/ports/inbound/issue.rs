//! Direct issuance port, used once a caller has authenticated a principal.

use async_trait::async_trait;

use crate::application::error::Result;
use crate::domain::identity::PrincipalId;
use crate::domain::token::TokenPair;

/// Inbound port for issuing a fresh token pair.
#[async_trait]
pub trait IssueSession: Send + Sync {
    /// Issue an access/refresh pair, replacing any stored refresh token.
    async fn issue(&self, id: &PrincipalId) -> Result<TokenPair>;
}
