//! Store contracts consumed by the identity service.
//!
//! The service only ever talks to `dyn UserStore` / `dyn SessionStore`;
//! [`PgUserStore`] and [`PgSessionStore`] back them with the sqlx
//! repositories, [`crate::memory`] backs them with in-process maps.

use async_trait::async_trait;
use haggle_core::error::CoreError;
use haggle_core::types::DbId;
use uuid::Uuid;

use crate::models::session::{RefreshSession, SessionStatus};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::repositories::{SessionRepo, UserRepo};
use crate::DbPool;

/// PostgreSQL `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors reported by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (e.g. duplicate email).
    #[error("Duplicate value violates unique constraint: {0}")]
    UniqueViolation(String),

    /// Sessions may only move from active to revoked.
    #[error("Refresh sessions can only transition from active to revoked")]
    IllegalTransition,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Split unique violations out of a raw sqlx error.
    fn classify(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return StoreError::UniqueViolation(constraint);
            }
        }
        StoreError::Database(err)
    }
}

impl From<StoreError> for CoreError {
    /// Store failures pass through uninterpreted. Callers that know a
    /// unique violation means something specific map it before this.
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Store operation failed");
        CoreError::StorageFailure(err.to_string())
    }
}

/// Persistence contract for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user and return its id. Reports
    /// [`StoreError::UniqueViolation`] when the email is taken.
    async fn insert(&self, input: &CreateUser) -> Result<DbId, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn get_by_id(&self, id: DbId) -> Result<Option<User>, StoreError>;

    /// Apply the non-`None` fields. `None` when the user does not exist.
    async fn update(&self, id: DbId, input: &UpdateUser) -> Result<Option<User>, StoreError>;
}

/// Persistence contract for refresh sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &RefreshSession) -> Result<(), StoreError>;

    /// Sessions of `user_id` that are neither revoked nor expired right now.
    async fn list_active_by_user(&self, user_id: DbId) -> Result<Vec<RefreshSession>, StoreError>;

    /// Revoke every active session of `user_id`; returns how many were revoked.
    async fn revoke_all_active_by_user(&self, user_id: DbId) -> Result<u64, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<RefreshSession>, StoreError>;

    /// Persist the revocation carried by `session`.
    ///
    /// Conditional on the stored row not being revoked yet: returns `None`
    /// when another writer got there first (or the row does not exist), so
    /// two racers on one session never both succeed.
    async fn update(&self, session: &RefreshSession) -> Result<Option<RefreshSession>, StoreError>;
}

/// [`UserStore`] backed by the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, input: &CreateUser) -> Result<DbId, StoreError> {
        let user = UserRepo::create(&self.pool, input)
            .await
            .map_err(StoreError::classify)?;
        Ok(user.id)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }

    async fn get_by_id(&self, id: DbId) -> Result<Option<User>, StoreError> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn update(&self, id: DbId, input: &UpdateUser) -> Result<Option<User>, StoreError> {
        UserRepo::update(&self.pool, id, input)
            .await
            .map_err(StoreError::classify)
    }
}

/// [`SessionStore`] backed by the `refresh_sessions` table.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: DbPool,
}

impl PgSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &RefreshSession) -> Result<(), StoreError> {
        SessionRepo::create(&self.pool, session)
            .await
            .map_err(StoreError::classify)
    }

    async fn list_active_by_user(&self, user_id: DbId) -> Result<Vec<RefreshSession>, StoreError> {
        Ok(SessionRepo::list_active_for_user(&self.pool, user_id).await?)
    }

    async fn revoke_all_active_by_user(&self, user_id: DbId) -> Result<u64, StoreError> {
        Ok(SessionRepo::revoke_all_active_for_user(&self.pool, user_id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<RefreshSession>, StoreError> {
        Ok(SessionRepo::find_by_id(&self.pool, id).await?)
    }

    async fn update(&self, session: &RefreshSession) -> Result<Option<RefreshSession>, StoreError> {
        match session.status {
            SessionStatus::Revoked { at } => {
                Ok(SessionRepo::revoke(&self.pool, session.id, at).await?)
            }
            SessionStatus::Active => Err(StoreError::IllegalTransition),
        }
    }
}
