//! Refresh session model.
//!
//! A session is persisted with a nullable `revoked_at` column but handled in
//! code through [`SessionStatus`], so every transition is an explicit match.
//! Expiry is never stored: it is derived from `expires_at` at check time.

use haggle_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `refresh_sessions` table, exactly as stored.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshSessionRow {
    pub id: Uuid,
    pub user_id: DbId,
    pub fingerprint: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

/// Revocation state of a refresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    /// Revoked by logout, rotation, or the session cap. A timestamp in the
    /// future is a revocation that has not taken effect yet.
    Revoked { at: Timestamp },
}

/// A long-lived refresh credential bound to one user and one client fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSession {
    /// Opaque random identifier handed to the client as the refresh token.
    pub id: Uuid,
    pub user_id: DbId,
    pub fingerprint: String,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub status: SessionStatus,
}

impl RefreshSession {
    /// The persisted form of [`RefreshSession::status`].
    pub fn revoked_at(&self) -> Option<Timestamp> {
        match self.status {
            SessionStatus::Active => None,
            SessionStatus::Revoked { at } => Some(at),
        }
    }

    /// Whether a revocation has taken effect as of `now`.
    pub fn is_revoked_at(&self, now: Timestamp) -> bool {
        match self.status {
            SessionStatus::Active => false,
            SessionStatus::Revoked { at } => at <= now,
        }
    }

    /// Whether the session has passed its expiry as of `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// A session is usable iff it is neither revoked nor expired.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        !self.is_revoked_at(now) && !self.is_expired_at(now)
    }

    /// Exact comparison against the fingerprint bound at creation.
    pub fn matches_fingerprint(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }

    /// Mark the session revoked at `at`. Does not persist anything.
    pub fn revoke(&mut self, at: Timestamp) {
        self.status = SessionStatus::Revoked { at };
    }
}

impl From<RefreshSessionRow> for RefreshSession {
    fn from(row: RefreshSessionRow) -> Self {
        let status = match row.revoked_at {
            Some(at) => SessionStatus::Revoked { at },
            None => SessionStatus::Active,
        };
        Self {
            id: row.id,
            user_id: row.user_id,
            fingerprint: row.fingerprint,
            created_at: row.created_at,
            expires_at: row.expires_at,
            status,
        }
    }
}
