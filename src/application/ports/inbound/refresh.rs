//! Token refresh use case port.

use async_trait::async_trait;

use crate::application::dto::RefreshRequestDto;
use crate::application::error::Result;
use crate::domain::token::TokenPair;

/// Inbound port for refreshing access tokens.
#[async_trait]
pub trait RefreshSession: Send + Sync {
    /// Exchange an access token (expired or not) and its refresh token for
    /// a new pair.
    async fn execute(&self, request: RefreshRequestDto) -> Result<TokenPair>;
}
