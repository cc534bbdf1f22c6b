//! PostgreSQL identity and permission store.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::application::error::{ApplicationError, Result, ToUnavailable};
use crate::application::ports::outbound::{
    CompareAndSwapOutcome, IdentityStore, PermissionStore,
};
use crate::domain::identity::{Account, PrincipalId, RoleName};
use crate::domain::permission::Permission;
use crate::domain::token::RefreshRecord;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "passage";
pub const DEFAULT_POOL_SIZE: u32 = 10;

fn connection_url(
    hostname: &str,
    username: &str,
    password: &str,
    database: &str,
) -> String {
    format!("postgres://{username}:{password}@{hostname}/{database}")
}

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a connection pool.
    pub async fn connect(
        hostname: &str,
        username: &str,
        password: &str,
        database: &str,
        pool_size: u32,
    ) -> std::result::Result<Self, sqlx::Error> {
        let url = connection_url(hostname, username, password, database);
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(&url)
            .await?;

        tracing::info!(%hostname, %database, "postgres connected");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Account>> {
        let username: Option<Option<String>> =
            sqlx::query_scalar("SELECT username FROM principals WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .unavailable()?;

        Ok(username.map(|username| Account {
            id: id.clone(),
            username,
        }))
    }

    async fn roles(&self, account: &Account) -> Result<BTreeSet<RoleName>> {
        let roles: Vec<String> = sqlx::query_scalar(
            "SELECT role FROM principal_roles WHERE principal_id = $1",
        )
        .bind(account.id.as_str())
        .fetch_all(&self.pool)
        .await
        .unavailable()?;

        Ok(roles.into_iter().map(RoleName::new).collect())
    }

    async fn refresh_record(
        &self,
        id: &PrincipalId,
    ) -> Result<Option<RefreshRecord>> {
        let row: Option<(Option<String>, Option<DateTime<Utc>>)> =
            sqlx::query_as(
                "SELECT refresh_token, refresh_token_expires_at FROM principals WHERE id = $1",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .unavailable()?;

        Ok(match row {
            Some((Some(token), Some(expires_at))) => {
                Some(RefreshRecord { token, expires_at })
            },
            _ => None,
        })
    }

    async fn persist_refresh_token(
        &self,
        id: &PrincipalId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE principals SET refresh_token = $2, refresh_token_expires_at = $3 WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .unavailable()?;

        if result.rows_affected() == 0 {
            return Err(ApplicationError::InvalidPrincipal { field: "id" });
        }

        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: &PrincipalId,
        expected: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<CompareAndSwapOutcome> {
        let result = sqlx::query(
            "UPDATE principals SET refresh_token = $2, refresh_token_expires_at = $3 WHERE id = $1 AND refresh_token = $4",
        )
        .bind(id.as_str())
        .bind(token)
        .bind(expires_at)
        .bind(expected)
        .execute(&self.pool)
        .await
        .unavailable()?;

        Ok(if result.rows_affected() == 1 {
            CompareAndSwapOutcome::Updated
        } else {
            CompareAndSwapOutcome::Mismatch
        })
    }
}

#[async_trait]
impl PermissionStore for PgStore {
    async fn permissions_for_roles(
        &self,
        roles: &BTreeSet<RoleName>,
    ) -> Result<BTreeSet<Permission>> {
        let roles: Vec<String> =
            roles.iter().map(|role| role.as_str().to_owned()).collect();

        let permissions: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT permission FROM role_permissions WHERE role = ANY($1)",
        )
        .bind(roles)
        .fetch_all(&self.pool)
        .await
        .unavailable()?;

        Ok(permissions.into_iter().map(Permission::from).collect())
    }

    async fn permissions_for_user(
        &self,
        id: &PrincipalId,
    ) -> Result<BTreeSet<Permission>> {
        let permissions: Vec<String> = sqlx::query_scalar(
            "SELECT permission FROM principal_permissions WHERE principal_id = $1",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .unavailable()?;

        Ok(permissions.into_iter().map(Permission::from).collect())
    }
}
