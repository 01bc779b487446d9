//! In-process [`UserStore`] and [`SessionStore`] implementations.
//!
//! They follow the same contracts as the Postgres stores, including the
//! email uniqueness constraint and the conditional session update, and are
//! what the integration tests run the identity service against.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use haggle_core::types::DbId;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::session::{RefreshSession, SessionStatus};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::store::{SessionStore, StoreError, UserStore};

/// Constraint name reported for duplicate emails, matching the migration.
const EMAIL_CONSTRAINT: &str = "uq_users_email";

#[derive(Default)]
struct UserTable {
    next_id: DbId,
    rows: BTreeMap<DbId, User>,
}

/// Users kept in a map keyed by id.
#[derive(Default)]
pub struct MemoryUserStore {
    table: RwLock<UserTable>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, input: &CreateUser) -> Result<DbId, StoreError> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|u| u.email == input.email) {
            return Err(StoreError::UniqueViolation(EMAIL_CONSTRAINT.to_string()));
        }

        table.next_id += 1;
        let id = table.next_id;
        let now = Utc::now();
        table.rows.insert(
            id,
            User {
                id,
                name: input.name.clone(),
                email: input.email.clone(),
                phone: input.phone.clone(),
                password_hash: input.password_hash.clone(),
                is_store: input.is_store,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.values().find(|u| u.email == email).cloned())
    }

    async fn get_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn update(&self, id: DbId, input: &UpdateUser) -> Result<Option<User>, StoreError> {
        let mut table = self.table.write().await;
        if let Some(email) = &input.email {
            if table.rows.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::UniqueViolation(EMAIL_CONSTRAINT.to_string()));
            }
        }

        let Some(user) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            user.name = name.clone();
        }
        if let Some(email) = &input.email {
            user.email = email.clone();
        }
        if let Some(phone) = &input.phone {
            user.phone = phone.clone();
        }
        if let Some(hash) = &input.password_hash {
            user.password_hash = hash.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

/// Refresh sessions kept in a map keyed by session id. Nothing is ever removed.
#[derive(Default)]
pub struct MemorySessionStore {
    rows: RwLock<HashMap<Uuid, RefreshSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every session ever stored for `user_id`, in no particular order.
    pub async fn all_for_user(&self, user_id: DbId) -> Vec<RefreshSession> {
        self.rows
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &RefreshSession) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&session.id) {
            return Err(StoreError::UniqueViolation("refresh_sessions_pkey".to_string()));
        }
        rows.insert(session.id, session.clone());
        Ok(())
    }

    async fn list_active_by_user(&self, user_id: DbId) -> Result<Vec<RefreshSession>, StoreError> {
        let now = Utc::now();
        let mut active: Vec<RefreshSession> = self
            .rows
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id && s.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by_key(|s| s.created_at);
        Ok(active)
    }

    async fn revoke_all_active_by_user(&self, user_id: DbId) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut revoked = 0;
        for session in self.rows.write().await.values_mut() {
            if session.user_id == user_id && session.is_active_at(now) {
                session.revoke(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<RefreshSession>, StoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn update(&self, session: &RefreshSession) -> Result<Option<RefreshSession>, StoreError> {
        let SessionStatus::Revoked { at } = session.status else {
            return Err(StoreError::IllegalTransition);
        };

        let mut rows = self.rows.write().await;
        match rows.get_mut(&session.id) {
            Some(stored) if !stored.is_revoked_at(Utc::now()) => {
                stored.revoke(at);
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }
}
