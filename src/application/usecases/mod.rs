//! Application services implementing business logic.

use std::future::Future;
use std::time::Duration;

use chrono::TimeDelta;

use crate::application::error::{Result, ToUnavailable};

pub const TOKEN_TYPE: &str = "Bearer";
/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

pub mod issue;
pub mod refresh;
pub mod resolver;

pub use issue::*;
pub use refresh::*;
pub use resolver::*;

/// Lifetimes of issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: TimeDelta,
    pub refresh: TimeDelta,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: TimeDelta::minutes(2),
            refresh: TimeDelta::days(7),
        }
    }
}

/// Run a store call, turning an elapsed deadline into
/// [`DependencyUnavailable`](crate::application::error::ApplicationError::DependencyUnavailable).
pub(crate) async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, call).await.unavailable()?
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Wiring shared by use case tests.

    use std::sync::Arc;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::adapters::outbound::clock::FixedClock;
    use crate::adapters::outbound::crypto::random::OsRngRandom;
    use crate::adapters::outbound::jwt::JwtSigner;
    use crate::adapters::outbound::persistence::memory::InMemoryStore;
    use crate::domain::key::SigningKey;

    pub const KEY: &[u8; 64] =
        b"0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    /// 2023-11-14T22:13:20Z.
    pub fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    pub struct Harness {
        pub store: Arc<InMemoryStore>,
        pub clock: Arc<FixedClock>,
        pub jwt: Arc<JwtSigner>,
        pub issuer: Arc<TokenIssuer>,
        pub coordinator: RefreshCoordinator,
    }

    /// Store with principal `42` ("alice", role Admin) and the permissions
    /// of the reference scenario.
    pub fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::default();
        store.insert_account("42", Some("alice"));
        store.grant_role("42", "Admin");
        store.grant_role_permission("Admin", "expenses.read");
        store.grant_role_permission("Admin", "expenses.write");
        store.grant_user_permission("42", "reports.export");
        store
    }

    pub fn harness(store: InMemoryStore) -> Harness {
        let store = Arc::new(store);
        let clock = Arc::new(FixedClock::new(epoch()));
        let jwt = Arc::new(JwtSigner::new(SigningKey::new(KEY).unwrap()));

        let issuer = Arc::new(TokenIssuer::new(
            store.clone(),
            store.clone(),
            jwt.clone(),
            Arc::new(OsRngRandom::new()),
            clock.clone(),
        ));
        let coordinator = RefreshCoordinator::new(issuer.clone(), jwt.clone());

        Harness {
            store,
            clock,
            jwt,
            issuer,
            coordinator,
        }
    }
}
