//! Token refresh use case implementation.
//!
//! A refresh walks through fixed stages and stops at the first one that
//! cannot be reached:
//!
//! `Presented → SignatureChecked → IdentityExtracted → PrincipalLoaded →
//! RefreshMatched → Reissued`
//!
//! Every stop is reported as [`ApplicationError::RefreshDenied`]. Which stage
//! failed only reaches the debug log and metrics.

use std::sync::Arc;

use async_trait::async_trait;
use constant_time_eq::constant_time_eq;

use crate::application::dto::RefreshRequestDto;
use crate::application::error::{ApplicationError, Result};
use crate::application::ports::inbound::RefreshSession;
use crate::application::ports::outbound::TokenVerifier;
use crate::application::usecases::{Rotation, TokenIssuer, bounded};
use crate::domain::identity::PrincipalId;
use crate::domain::token::TokenPair;

/// Stages of a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStage {
    Presented,
    SignatureChecked,
    IdentityExtracted,
    PrincipalLoaded,
    RefreshMatched,
    Reissued,
}

impl RefreshStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshStage::Presented => "presented",
            RefreshStage::SignatureChecked => "signature_checked",
            RefreshStage::IdentityExtracted => "identity_extracted",
            RefreshStage::PrincipalLoaded => "principal_loaded",
            RefreshStage::RefreshMatched => "refresh_matched",
            RefreshStage::Reissued => "reissued",
        }
    }
}

/// Stop a refresh that could not reach `stage`.
fn reject(stage: RefreshStage) -> ApplicationError {
    tracing::debug!(stage = stage.as_str(), "refresh rejected");
    metrics::counter!("session_refresh_rejected_total", "stage" => stage.as_str())
        .increment(1);
    ApplicationError::RefreshDenied
}

/// Orchestrates the refresh flow.
pub struct RefreshCoordinator {
    issuer: Arc<TokenIssuer>,
    verifier: Arc<dyn TokenVerifier>,
}

impl RefreshCoordinator {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self { issuer, verifier }
    }

    async fn refresh(&self, request: &RefreshRequestDto) -> Result<TokenPair> {
        let identity = self.issuer.identity();
        let timeout = self.issuer.store_timeout();

        let claims = self
            .verifier
            .validate_ignoring_expiry(&request.access_token)
            .require()
            .map_err(|_| reject(RefreshStage::SignatureChecked))?;

        let id = claims
            .subject
            .as_deref()
            .and_then(|subject| PrincipalId::parse(subject).ok())
            .ok_or_else(|| reject(RefreshStage::IdentityExtracted))?;

        let account = bounded(timeout, identity.find_by_id(&id))
            .await?
            .ok_or_else(|| reject(RefreshStage::PrincipalLoaded))?;

        let record = bounded(timeout, identity.refresh_record(&id))
            .await?
            .ok_or_else(|| reject(RefreshStage::RefreshMatched))?;

        let now = self.issuer.clock().now();
        let matches = constant_time_eq(
            record.token.as_bytes(),
            request.refresh_token.as_bytes(),
        );
        let live = record.is_live(now);
        if !(matches & live) {
            return Err(reject(RefreshStage::RefreshMatched));
        }

        self.issuer
            .issue_for(&account, Rotation::Replace(&request.refresh_token))
            .await
            .map_err(|err| match err {
                ApplicationError::RefreshDenied => {
                    reject(RefreshStage::Reissued)
                },
                err => err,
            })
    }
}

#[async_trait]
impl RefreshSession for RefreshCoordinator {
    async fn execute(&self, request: RefreshRequestDto) -> Result<TokenPair> {
        let result = self.refresh(&request).await;

        let outcome = match &result {
            Ok(_) => "reissued",
            Err(err) if err.is_rejection() => "rejected",
            Err(_) => "error",
        };
        metrics::counter!("session_refresh_total", "outcome" => outcome)
            .increment(1);

        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, Utc};

    use super::*;
    use crate::application::ports::inbound::IssueSession;
    use crate::adapters::outbound::crypto::random::OsRngRandom;
    use crate::adapters::outbound::persistence::memory::InMemoryStore;
    use crate::application::ports::outbound::{
        CompareAndSwapOutcome, IdentityStore,
    };
    use crate::application::usecases::DEFAULT_STORE_TIMEOUT;
    use crate::application::usecases::fixtures::{
        Harness, epoch, harness, seeded_store,
    };
    use crate::domain::identity::{Account, RoleName};
    use crate::domain::token::RefreshRecord;

    fn id() -> PrincipalId {
        PrincipalId::parse("42").unwrap()
    }

    async fn login(h: &Harness) -> TokenPair {
        h.issuer.issue(&id()).await.unwrap()
    }

    fn request(pair: &TokenPair) -> RefreshRequestDto {
        RefreshRequestDto {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
        }
    }

    #[tokio::test]
    async fn test_refresh_with_expired_access_token() {
        let h = harness(seeded_store());
        let pair = login(&h).await;

        h.clock.advance(TimeDelta::minutes(10));
        let refreshed = h.coordinator.execute(request(&pair)).await.unwrap();

        assert_ne!(refreshed.refresh_token, pair.refresh_token);
        assert_eq!(
            refreshed.access_expires_at,
            epoch() + TimeDelta::minutes(12)
        );

        let record = h.store.refresh_record_of("42").unwrap();
        assert_eq!(record.token, refreshed.refresh_token);
    }

    #[tokio::test]
    async fn test_refresh_token_is_single_use() {
        let h = harness(seeded_store());
        let pair = login(&h).await;

        assert!(h.coordinator.execute(request(&pair)).await.is_ok());
        let err = h.coordinator.execute(request(&pair)).await.unwrap_err();

        assert!(matches!(err, ApplicationError::RefreshDenied));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_succeeds_once() {
        let h = harness(seeded_store());
        let pair = login(&h).await;

        let (first, second) = tokio::join!(
            h.coordinator.execute(request(&pair)),
            h.coordinator.execute(request(&pair)),
        );

        assert_eq!(
            [first.is_ok(), second.is_ok()]
                .into_iter()
                .filter(|ok| *ok)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_refresh_token_one_character_off() {
        let h = harness(seeded_store());
        let pair = login(&h).await;

        let mut tampered = pair.refresh_token.clone().into_bytes();
        tampered[10] = if tampered[10] == b'A' { b'B' } else { b'A' };
        let req = RefreshRequestDto {
            access_token: pair.access_token.clone(),
            refresh_token: String::from_utf8(tampered).unwrap(),
        };

        let err = h.coordinator.execute(req).await.unwrap_err();
        assert!(matches!(err, ApplicationError::RefreshDenied));

        // The genuine token still works afterwards.
        assert!(h.coordinator.execute(request(&pair)).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_refresh_token() {
        let h = harness(seeded_store());
        let pair = login(&h).await;

        h.clock.advance(TimeDelta::days(7));
        let err = h.coordinator.execute(request(&pair)).await.unwrap_err();

        assert!(matches!(err, ApplicationError::RefreshDenied));
    }

    #[tokio::test]
    async fn test_tampered_access_token() {
        let h = harness(seeded_store());
        let pair = login(&h).await;

        let mut req = request(&pair);
        req.access_token.push('x');

        let err = h.coordinator.execute(req).await.unwrap_err();
        assert!(matches!(err, ApplicationError::RefreshDenied));
    }

    #[tokio::test]
    async fn test_access_token_of_another_principal() {
        let store = seeded_store();
        store.insert_account("7", Some("bob"));
        let h = harness(store);

        let alice = login(&h).await;
        let bob = h
            .issuer
            .issue(&PrincipalId::parse("7").unwrap())
            .await
            .unwrap();

        let req = RefreshRequestDto {
            access_token: bob.access_token,
            refresh_token: alice.refresh_token,
        };
        let err = h.coordinator.execute(req).await.unwrap_err();
        assert!(matches!(err, ApplicationError::RefreshDenied));
    }

    #[tokio::test]
    async fn test_deleted_principal() {
        let h = harness(seeded_store());
        let pair = login(&h).await;

        h.store.remove_account("42");
        let err = h.coordinator.execute(request(&pair)).await.unwrap_err();
        assert!(matches!(err, ApplicationError::RefreshDenied));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_permissions() {
        let h = harness(seeded_store());
        let pair = login(&h).await;

        h.store.grant_role_permission("Admin", "expenses.approve");
        let refreshed = h.coordinator.execute(request(&pair)).await.unwrap();

        let claims = h
            .jwt
            .validate_ignoring_expiry(&refreshed.access_token)
            .into_claims()
            .unwrap();
        assert_eq!(claims.permissions.len(), 4);
    }

    struct DownStore;

    fn down() -> ApplicationError {
        ApplicationError::unavailable(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "identity store down",
        ))
    }

    #[async_trait]
    impl IdentityStore for DownStore {
        async fn find_by_id(&self, _id: &PrincipalId) -> Result<Option<Account>> {
            Err(down())
        }

        async fn roles(&self, _account: &Account) -> Result<BTreeSet<RoleName>> {
            Err(down())
        }

        async fn refresh_record(
            &self,
            _id: &PrincipalId,
        ) -> Result<Option<RefreshRecord>> {
            Err(down())
        }

        async fn persist_refresh_token(
            &self,
            _id: &PrincipalId,
            _token: &str,
            _expires_at: DateTime<Utc>,
        ) -> Result<()> {
            Err(down())
        }

        async fn replace_refresh_token(
            &self,
            _id: &PrincipalId,
            _expected: &str,
            _token: &str,
            _expires_at: DateTime<Utc>,
        ) -> Result<CompareAndSwapOutcome> {
            Err(down())
        }
    }

    #[tokio::test]
    async fn test_store_outage_is_not_a_rejection() {
        let h = harness(seeded_store());
        let pair = login(&h).await;

        let issuer = Arc::new(TokenIssuer::new(
            Arc::new(DownStore),
            h.store.clone(),
            h.jwt.clone(),
            Arc::new(OsRngRandom::new()),
            h.clock.clone(),
        ));
        let coordinator = RefreshCoordinator::new(issuer, h.jwt.clone());

        let err = coordinator.execute(request(&pair)).await.unwrap_err();
        assert!(matches!(err, ApplicationError::DependencyUnavailable(_)));
        assert!(!err.is_rejection());
    }

    #[derive(Clone, Copy)]
    enum Stall {
        Lookup,
        Replace,
    }

    /// Delegates to an in-memory store, hanging on one call.
    struct StallingStore {
        inner: Arc<InMemoryStore>,
        stall: Stall,
    }

    async fn hang() {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    #[async_trait]
    impl IdentityStore for StallingStore {
        async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Account>> {
            if let Stall::Lookup = self.stall {
                hang().await;
            }
            self.inner.find_by_id(id).await
        }

        async fn roles(&self, account: &Account) -> Result<BTreeSet<RoleName>> {
            self.inner.roles(account).await
        }

        async fn refresh_record(
            &self,
            id: &PrincipalId,
        ) -> Result<Option<RefreshRecord>> {
            self.inner.refresh_record(id).await
        }

        async fn persist_refresh_token(
            &self,
            id: &PrincipalId,
            token: &str,
            expires_at: DateTime<Utc>,
        ) -> Result<()> {
            self.inner.persist_refresh_token(id, token, expires_at).await
        }

        async fn replace_refresh_token(
            &self,
            id: &PrincipalId,
            expected: &str,
            token: &str,
            expires_at: DateTime<Utc>,
        ) -> Result<CompareAndSwapOutcome> {
            if let Stall::Replace = self.stall {
                hang().await;
            }
            self.inner
                .replace_refresh_token(id, expected, token, expires_at)
                .await
        }
    }

    fn stalling(h: &Harness, stall: Stall, timeout: Duration) -> RefreshCoordinator {
        let store = Arc::new(StallingStore {
            inner: h.store.clone(),
            stall,
        });
        let issuer = Arc::new(
            TokenIssuer::new(
                store,
                h.store.clone(),
                h.jwt.clone(),
                Arc::new(OsRngRandom::new()),
                h.clock.clone(),
            )
            .with_store_timeout(timeout),
        );
        RefreshCoordinator::new(issuer, h.jwt.clone())
    }

    #[tokio::test]
    async fn test_stalled_store_times_out() {
        for stall in [Stall::Lookup, Stall::Replace] {
            let h = harness(seeded_store());
            let pair = login(&h).await;
            let coordinator = stalling(&h, stall, Duration::from_millis(20));

            let err = coordinator.execute(request(&pair)).await.unwrap_err();
            assert!(matches!(err, ApplicationError::DependencyUnavailable(_)));
            assert!(!err.is_rejection());

            let record = h.store.refresh_record_of("42").unwrap();
            assert_eq!(record.token, pair.refresh_token);
        }
    }

    #[tokio::test]
    async fn test_abandoned_refresh_keeps_token() {
        let h = harness(seeded_store());
        let pair = login(&h).await;
        let coordinator = stalling(&h, Stall::Replace, DEFAULT_STORE_TIMEOUT);

        // The caller gives up while the rotation is in flight.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            coordinator.execute(request(&pair)),
        )
        .await;
        assert!(abandoned.is_err());

        let record = h.store.refresh_record_of("42").unwrap();
        assert_eq!(record.token, pair.refresh_token);

        let refreshed = h.coordinator.execute(request(&pair)).await.unwrap();
        assert_ne!(refreshed.refresh_token, pair.refresh_token);
    }
}
