//! passage issues short-lived signed access tokens and rotates long-lived
//! refresh tokens.

#![forbid(unsafe_code)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
mod router;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::adapters::outbound::clock::SystemClock;
use crate::adapters::outbound::crypto::random::OsRngRandom;
use crate::adapters::outbound::jwt::JwtSigner;
use crate::adapters::outbound::persistence::{InMemoryStore, PgStore, postgres};
use crate::application::ports::inbound::RefreshSession;
use crate::application::ports::outbound::{IdentityStore, PermissionStore};
use crate::application::usecases::{RefreshCoordinator, TokenIssuer};
use crate::config::Configuration;
use crate::domain::key::SigningKey;

pub use error::ServerError;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State over an in-memory store seeded with principal `42`.
#[cfg(test)]
pub fn test_state() -> (AppState, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::default());
    store.insert_account("42", Some("alice"));
    store.grant_role("42", "Admin");
    store.grant_role_permission("Admin", "expenses.read");
    store.grant_user_permission("42", "reports.export");

    let key = SigningKey::new([7u8; 64]).unwrap();
    let state = AppState::new(
        Arc::new(Configuration::default()),
        store.clone(),
        store.clone(),
        key,
    )
    .unwrap();

    (state, store)
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Configuration>,
    pub issuer: Arc<TokenIssuer>,
    pub refresh: Arc<dyn RefreshSession>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire use cases over the given stores.
    ///
    /// Fails when the configured token lifetimes are out of range.
    pub fn new(
        config: Arc<Configuration>,
        identity: Arc<dyn IdentityStore>,
        permissions: Arc<dyn PermissionStore>,
        key: SigningKey,
    ) -> application::error::Result<Self> {
        let jwt = Arc::new(JwtSigner::new(key));
        let issuer = Arc::new(
            TokenIssuer::new(
                identity,
                permissions,
                jwt.clone(),
                Arc::new(OsRngRandom::new()),
                Arc::new(SystemClock),
            )
            .with_lifetimes(config.token.lifetimes()?)
            .with_store_timeout(config.token.store_timeout()),
        );
        let refresh = Arc::new(RefreshCoordinator::new(issuer.clone(), jwt));

        Ok(Self {
            config,
            issuer,
            refresh,
            metrics: None,
        })
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove sensitive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        // `POST /oauth/token` goes to `token`.
        .route("/oauth/token", post(router::token::handler))
        .route("/metrics", get(router::metrics::handler))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
///
/// Fails on out-of-range token lifetimes, a missing or weak signing key, or
/// an unreachable database.
pub async fn initialize_state(
    config: Configuration,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    config.token.lifetimes()?;
    let key = config.signing_key()?;

    let (identity, permissions): (Arc<dyn IdentityStore>, Arc<dyn PermissionStore>) =
        match config.postgres {
            Some(ref pg) => {
                let store = PgStore::connect(
                    &pg.address,
                    pg.username.as_deref().unwrap_or(postgres::DEFAULT_CREDENTIALS),
                    pg.password.as_deref().unwrap_or(postgres::DEFAULT_CREDENTIALS),
                    pg.database.as_deref().unwrap_or(postgres::DEFAULT_DATABASE_NAME),
                    pg.pool_size.unwrap_or(postgres::DEFAULT_POOL_SIZE),
                )
                .await?;

                // execute migrations scripts on start.
                store.migrate().await?;

                let store = Arc::new(store);
                (store.clone(), store)
            },
            None => {
                tracing::warn!(
                    "missing `postgres` entry on `config.yaml` file, sessions are kept in memory"
                );
                let store = Arc::new(InMemoryStore::default());
                (store.clone(), store)
            },
        };

    let mut state = AppState::new(Arc::new(config), identity, permissions, key)?;
    state.metrics = Some(telemetry::setup_metrics_recorder()?);

    Ok(state)
}
