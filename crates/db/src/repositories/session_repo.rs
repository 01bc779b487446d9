//! Repository for the `refresh_sessions` table.
//!
//! Rows are never deleted. "Active" in every query below means the
//! revocation (if any) has not taken effect yet and the row has not expired.

use haggle_core::types::{DbId, Timestamp};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::session::{RefreshSession, RefreshSessionRow};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, fingerprint, created_at, expires_at, revoked_at";

/// Predicate selecting rows whose revocation has not taken effect.
const NOT_REVOKED: &str = "(revoked_at IS NULL OR revoked_at > NOW())";

/// Provides persistence operations for refresh sessions.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a session minted by the token signer.
    pub async fn create(pool: &PgPool, session: &RefreshSession) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_sessions (id, user_id, fingerprint, created_at, expires_at, revoked_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.fingerprint)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.revoked_at())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Find a session by id regardless of its state.
    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<RefreshSession>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM refresh_sessions WHERE id = $1");
        let row = sqlx::query_as::<_, RefreshSessionRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(RefreshSession::from))
    }

    /// List the currently active sessions of a user, oldest first.
    pub async fn list_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<RefreshSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM refresh_sessions
             WHERE user_id = $1
               AND {NOT_REVOKED}
               AND expires_at > NOW()
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, RefreshSessionRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(RefreshSession::from).collect())
    }

    /// Stamp `revoked_at` on a session, but only while it is not revoked.
    ///
    /// The condition makes concurrent revocations of the same row race
    /// safely: exactly one caller gets `Some`, the rest get `None`.
    pub async fn revoke(
        pool: &PgPool,
        id: Uuid,
        at: Timestamp,
    ) -> Result<Option<RefreshSession>, sqlx::Error> {
        let query = format!(
            "UPDATE refresh_sessions SET revoked_at = $2
             WHERE id = $1 AND {NOT_REVOKED}
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, RefreshSessionRow>(&query)
            .bind(id)
            .bind(at)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(RefreshSession::from))
    }

    /// Revoke all active sessions for a user. Returns the count of revoked sessions.
    pub async fn revoke_all_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE refresh_sessions SET revoked_at = NOW()
             WHERE user_id = $1
               AND {NOT_REVOKED}
               AND expires_at > NOW()"
        );
        let result = sqlx::query(&query).bind(user_id).execute(pool).await?;
        Ok(result.rows_affected())
    }
}
