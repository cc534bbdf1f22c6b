//! Token pair issuance.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};

use crate::application::error::{ApplicationError, Result};
use crate::application::ports::inbound::IssueSession;
use crate::application::ports::outbound::{
    Clock, CompareAndSwapOutcome, IdentityStore, PermissionStore,
    SecureRandom, TokenSigner,
};
use crate::application::usecases::{
    DEFAULT_STORE_TIMEOUT, PermissionResolver, TokenLifetimes, bounded,
};
use crate::domain::claims::ClaimSet;
use crate::domain::identity::{Account, Principal, PrincipalId};
use crate::domain::token::TokenPair;

/// Number of random bytes behind a refresh token.
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// How the new refresh token is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation<'a> {
    /// Replace whatever is stored (login).
    Overwrite,
    /// Replace only if the stored token is still the given one (refresh).
    Replace(&'a str),
}

impl Rotation<'_> {
    fn path(&self) -> &'static str {
        match self {
            Rotation::Overwrite => "login",
            Rotation::Replace(_) => "refresh",
        }
    }
}

/// Issues access/refresh token pairs.
pub struct TokenIssuer {
    identity: Arc<dyn IdentityStore>,
    resolver: PermissionResolver,
    signer: Arc<dyn TokenSigner>,
    random: Arc<dyn SecureRandom>,
    clock: Arc<dyn Clock>,
    lifetimes: TokenLifetimes,
    timeout: Duration,
}

impl TokenIssuer {
    pub fn new(
        identity: Arc<dyn IdentityStore>,
        permissions: Arc<dyn PermissionStore>,
        signer: Arc<dyn TokenSigner>,
        random: Arc<dyn SecureRandom>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            resolver: PermissionResolver::new(permissions),
            signer,
            random,
            clock,
            lifetimes: TokenLifetimes::default(),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Update access and refresh token lifetimes.
    pub fn with_lifetimes(mut self, lifetimes: TokenLifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }

    /// Update the bound applied to each store call.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.resolver = self.resolver.with_timeout(timeout);
        self.timeout = timeout;
        self
    }

    pub(crate) fn identity(&self) -> &Arc<dyn IdentityStore> {
        &self.identity
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn store_timeout(&self) -> Duration {
        self.timeout
    }

    /// Sign a fresh access token for `account` and rotate its refresh
    /// token.
    ///
    /// Roles and permissions are read again on every call. The refresh token
    /// is written last, once signing succeeded.
    pub async fn issue_for(
        &self,
        account: &Account,
        rotation: Rotation<'_>,
    ) -> Result<TokenPair> {
        let roles = bounded(self.timeout, self.identity.roles(account)).await?;
        let principal = Principal::new(account.clone(), roles);
        let permissions = self.resolver.resolve(&principal).await?;

        let claims = ClaimSet::builder()
            .principal(&principal)
            .permissions(permissions)
            .build()?;

        let now = self.clock.now();
        let access_expires_at = expiry(now, self.lifetimes.access)?;
        let access_token = self.signer.sign(&claims, now, access_expires_at)?;

        let refresh_token = self.generate_refresh_token()?;
        let refresh_expires_at = expiry(now, self.lifetimes.refresh)?;

        match rotation {
            Rotation::Overwrite => {
                bounded(
                    self.timeout,
                    self.identity.persist_refresh_token(
                        &account.id,
                        &refresh_token,
                        refresh_expires_at,
                    ),
                )
                .await?;
            },
            Rotation::Replace(expected) => {
                let outcome = bounded(
                    self.timeout,
                    self.identity.replace_refresh_token(
                        &account.id,
                        expected,
                        &refresh_token,
                        refresh_expires_at,
                    ),
                )
                .await?;

                if outcome == CompareAndSwapOutcome::Mismatch {
                    tracing::debug!(
                        principal = %account.id,
                        "refresh token rotated concurrently"
                    );
                    return Err(ApplicationError::RefreshDenied);
                }
            },
        }

        metrics::counter!("session_tokens_issued_total", "path" => rotation.path())
            .increment(1);
        tracing::info!(
            principal = %account.id,
            roles = claims.roles().len(),
            permissions = claims.permissions().len(),
            path = rotation.path(),
            "issued token pair"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    fn generate_refresh_token(&self) -> Result<String> {
        let bytes = self.random.random_bytes(REFRESH_TOKEN_BYTES)?;
        Ok(STANDARD.encode(bytes))
    }
}

fn expiry(now: DateTime<Utc>, lifetime: TimeDelta) -> Result<DateTime<Utc>> {
    now.checked_add_signed(lifetime).ok_or_else(|| {
        ApplicationError::Internal("token expiry out of range".into())
    })
}

#[async_trait]
impl IssueSession for TokenIssuer {
    async fn issue(&self, id: &PrincipalId) -> Result<TokenPair> {
        let account = bounded(self.timeout, self.identity.find_by_id(id))
            .await?
            .ok_or(ApplicationError::InvalidPrincipal { field: "id" })?;

        self.issue_for(&account, Rotation::Overwrite).await
    }
}
