//! In-memory identity and permission store.
//!
//! Suited to tests and embedding. Every operation takes the table lock for
//! its whole duration, so the refresh token compare-and-overwrite is atomic.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::error::{ApplicationError, Result};
use crate::application::ports::outbound::{
    CompareAndSwapOutcome, IdentityStore, PermissionStore,
};
use crate::domain::identity::{Account, PrincipalId, RoleName};
use crate::domain::permission::Permission;
use crate::domain::token::RefreshRecord;

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<String, Option<String>>,
    user_roles: HashMap<String, BTreeSet<RoleName>>,
    role_permissions: HashMap<RoleName, BTreeSet<Permission>>,
    user_permissions: HashMap<String, BTreeSet<Permission>>,
    refresh_tokens: HashMap<String, RefreshRecord>,
}

/// Identity and permission store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace an account.
    pub fn insert_account(&self, id: &str, username: Option<&str>) {
        self.write()
            .accounts
            .insert(id.to_owned(), username.map(str::to_owned));
    }

    /// Remove an account and everything attached to it.
    pub fn remove_account(&self, id: &str) {
        let mut tables = self.write();
        tables.accounts.remove(id);
        tables.user_roles.remove(id);
        tables.user_permissions.remove(id);
        tables.refresh_tokens.remove(id);
    }

    pub fn grant_role(&self, id: &str, role: &str) {
        self.write()
            .user_roles
            .entry(id.to_owned())
            .or_default()
            .insert(RoleName::from(role));
    }

    pub fn revoke_role(&self, id: &str, role: &str) {
        if let Some(roles) = self.write().user_roles.get_mut(id) {
            roles.remove(&RoleName::from(role));
        }
    }

    pub fn grant_role_permission(&self, role: &str, permission: &str) {
        self.write()
            .role_permissions
            .entry(RoleName::from(role))
            .or_default()
            .insert(Permission::from(permission));
    }

    pub fn grant_user_permission(&self, id: &str, permission: &str) {
        self.write()
            .user_permissions
            .entry(id.to_owned())
            .or_default()
            .insert(Permission::from(permission));
    }

    /// Refresh token stored for `id`, if any.
    pub fn refresh_record_of(&self, id: &str) -> Option<RefreshRecord> {
        self.read().refresh_tokens.get(id).cloned()
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Account>> {
        Ok(self.read().accounts.get(id.as_str()).map(|username| Account {
            id: id.clone(),
            username: username.clone(),
        }))
    }

    async fn roles(&self, account: &Account) -> Result<BTreeSet<RoleName>> {
        Ok(self
            .read()
            .user_roles
            .get(account.id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn refresh_record(
        &self,
        id: &PrincipalId,
    ) -> Result<Option<RefreshRecord>> {
        Ok(self.refresh_record_of(id.as_str()))
    }

    async fn persist_refresh_token(
        &self,
        id: &PrincipalId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.write();
        if !tables.accounts.contains_key(id.as_str()) {
            return Err(ApplicationError::InvalidPrincipal { field: "id" });
        }

        tables.refresh_tokens.insert(
            id.as_str().to_owned(),
            RefreshRecord {
                token: token.to_owned(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        id: &PrincipalId,
        expected: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<CompareAndSwapOutcome> {
        let mut tables = self.write();

        match tables.refresh_tokens.get_mut(id.as_str()) {
            Some(record) if record.token == expected => {
                *record = RefreshRecord {
                    token: token.to_owned(),
                    expires_at,
                };
                Ok(CompareAndSwapOutcome::Updated)
            },
            _ => Ok(CompareAndSwapOutcome::Mismatch),
        }
    }
}

#[async_trait]
impl PermissionStore for InMemoryStore {
    async fn permissions_for_roles(
        &self,
        roles: &BTreeSet<RoleName>,
    ) -> Result<BTreeSet<Permission>> {
        let tables = self.read();

        Ok(roles
            .iter()
            .filter_map(|role| tables.role_permissions.get(role))
            .flatten()
            .cloned()
            .collect())
    }

    async fn permissions_for_user(
        &self,
        id: &PrincipalId,
    ) -> Result<BTreeSet<Permission>> {
        Ok(self
            .read()
            .user_permissions
            .get(id.as_str())
            .cloned()
            .unwrap_or_default())
    }
}
