//! Registration, login, refresh-token rotation and logout.
//!
//! [`IdentityService`] composes the credential hasher, the token signer and
//! the two stores. It holds no mutable state of its own; every transition is
//! a read or a conditional write against the session store.
//!
//! Refresh and logout check a presented session in a fixed order:
//! existence, then activity (revoked or expired), then fingerprint. The
//! order is consistent across both flows; it is not a timing-oracle defence.

use std::sync::Arc;

use chrono::{Duration, Utc};
use haggle_core::error::CoreError;
use haggle_core::types::{DbId, Timestamp};
use haggle_db::models::session::RefreshSession;
use haggle_db::models::user::{CreateUser, UpdateUser, User};
use haggle_db::{SessionStore, StoreError, UserStore};
use uuid::Uuid;

use crate::auth::jwt::{AccessToken, JwtConfig, TokenError, TokenSigner};
use crate::auth::password::{CredentialHasher, PasswordError};
use crate::config::ConfigError;

/// Active sessions a user may hold before a login clears all of them.
pub const MAX_ACTIVE_SESSIONS: usize = 5;

/// Input for [`IdentityService::register`].
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub is_store: bool,
}

/// Input for [`IdentityService::update_profile`]. All fields are optional.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

/// An access token together with the refresh session issued alongside it.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub session_id: Uuid,
    pub session_expires_at: Timestamp,
}

impl From<PasswordError> for CoreError {
    fn from(err: PasswordError) -> Self {
        CoreError::HashingFailure(err.to_string())
    }
}

impl From<TokenError> for CoreError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => CoreError::InvalidToken,
            other => CoreError::TokenIssuance(other.to_string()),
        }
    }
}

/// Uniqueness violations on user writes can only come from the email column.
fn user_write_error(err: StoreError) -> CoreError {
    match err {
        StoreError::UniqueViolation(_) => CoreError::DuplicateUser,
        other => other.into(),
    }
}

pub struct IdentityService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    hasher: CredentialHasher,
    signer: TokenSigner,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        hasher: CredentialHasher,
        signer: TokenSigner,
        access_lifetime: Duration,
        refresh_lifetime: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
            signer,
            access_lifetime,
            refresh_lifetime,
        }
    }

    /// Build a service whose signer and lifetimes come from `config`.
    pub fn from_config(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        hasher: CredentialHasher,
        config: &JwtConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            users,
            sessions,
            hasher,
            TokenSigner::new(config.secret.as_bytes()),
            config.access_lifetime()?,
            config.refresh_lifetime()?,
        ))
    }

    /// Lifetime given to every refresh session this service issues.
    pub fn refresh_lifetime(&self) -> Duration {
        self.refresh_lifetime
    }

    /// Create a user and open its first session bound to `fingerprint`.
    pub async fn register(
        &self,
        account: NewAccount,
        fingerprint: &str,
    ) -> Result<IssuedTokens, CoreError> {
        let password_hash = self.hasher.hash(&account.password)?;

        let input = CreateUser {
            name: account.name,
            email: account.email,
            phone: account.phone,
            password_hash,
            is_store: account.is_store,
        };
        let user_id = self.users.insert(&input).await.map_err(user_write_error)?;
        tracing::info!(user_id, is_store = input.is_store, "User registered");

        self.issue_tokens(user_id, fingerprint).await
    }

    /// Log in with email and password.
    ///
    /// When the user already holds [`MAX_ACTIVE_SESSIONS`] or more active
    /// sessions, every one of them is revoked before the new one is issued.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        fingerprint: &str,
    ) -> Result<IssuedTokens, CoreError> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or(CoreError::UserNotFound)?;

        if !self.hasher.verify(password, &user.password_hash)? {
            tracing::info!(user_id = user.id, "Login rejected: wrong password");
            return Err(CoreError::InvalidPassword);
        }

        let active = self.sessions.list_active_by_user(user.id).await?;
        if active.len() >= MAX_ACTIVE_SESSIONS {
            let revoked = self.sessions.revoke_all_active_by_user(user.id).await?;
            tracing::warn!(
                user_id = user.id,
                active = active.len(),
                revoked,
                "Session cap reached, revoked all active sessions"
            );
        }

        let tokens = self.issue_tokens(user.id, fingerprint).await?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(tokens)
    }

    /// Rotate a refresh session: retire the presented one and issue a new
    /// one bound to the same fingerprint. Each session id works once.
    pub async fn refresh(
        &self,
        session_id: &str,
        fingerprint: &str,
    ) -> Result<IssuedTokens, CoreError> {
        let session = self.usable_session(session_id, fingerprint).await?;
        let consumed = self.revoke(session).await?;

        let user = self
            .users
            .get_by_id(consumed.user_id)
            .await?
            .ok_or(CoreError::UserNotFound)?;

        let tokens = self.issue_tokens(user.id, fingerprint).await?;
        tracing::info!(user_id = user.id, "Refresh session rotated");
        Ok(tokens)
    }

    /// Revoke the presented session. Unknown or already inactive sessions
    /// report [`CoreError::InvalidToken`], never success.
    pub async fn logout(&self, session_id: &str, fingerprint: &str) -> Result<(), CoreError> {
        let session = self.usable_session(session_id, fingerprint).await?;
        let revoked = self.revoke(session).await?;
        tracing::info!(user_id = revoked.user_id, "User logged out");
        Ok(())
    }

    /// Verify a bearer access token.
    pub fn verify_access(&self, token: &str) -> Result<AccessToken, CoreError> {
        self.signer
            .verify_access(token)
            .map_err(|_| CoreError::InvalidToken)
    }

    pub async fn user_profile(&self, user_id: DbId) -> Result<User, CoreError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(CoreError::UserNotFound)
    }

    /// Apply the provided profile fields. A new password is re-hashed.
    pub async fn update_profile(
        &self,
        user_id: DbId,
        update: ProfileUpdate,
    ) -> Result<User, CoreError> {
        let password_hash = match update.password {
            Some(password) => Some(self.hasher.hash(&password)?),
            None => None,
        };
        let input = UpdateUser {
            name: update.name,
            email: update.email,
            phone: update.phone,
            password_hash,
        };
        if input.is_empty() {
            return self.user_profile(user_id).await;
        }

        let user = self
            .users
            .update(user_id, &input)
            .await
            .map_err(user_write_error)?
            .ok_or(CoreError::UserNotFound)?;
        tracing::info!(user_id, "Profile updated");
        Ok(user)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Mint an access token and a refresh session, and persist the session.
    async fn issue_tokens(
        &self,
        user_id: DbId,
        fingerprint: &str,
    ) -> Result<IssuedTokens, CoreError> {
        let access_token = self.signer.sign_access(user_id, self.access_lifetime)?;
        let session = self
            .signer
            .new_refresh_session(fingerprint, user_id, self.refresh_lifetime)?;
        self.sessions.insert(&session).await?;

        Ok(IssuedTokens {
            access_token,
            session_id: session.id,
            session_expires_at: session.expires_at,
        })
    }

    /// Resolve a presented session id to an active session owned by the
    /// caller's fingerprint.
    async fn usable_session(
        &self,
        session_id: &str,
        fingerprint: &str,
    ) -> Result<RefreshSession, CoreError> {
        let id = Uuid::parse_str(session_id).map_err(|_| CoreError::InvalidToken)?;
        let session = self
            .sessions
            .get_by_id(id)
            .await?
            .ok_or(CoreError::InvalidToken)?;

        if !session.is_active_at(Utc::now()) {
            return Err(CoreError::InvalidToken);
        }
        if !session.matches_fingerprint(fingerprint) {
            tracing::warn!(user_id = session.user_id, "Refresh session fingerprint mismatch");
            return Err(CoreError::InvalidFingerprint);
        }
        Ok(session)
    }

    /// Persist a revocation. Losing the race to a concurrent writer means
    /// the session was already spent.
    async fn revoke(&self, mut session: RefreshSession) -> Result<RefreshSession, CoreError> {
        session.revoke(Utc::now());
        self.sessions
            .update(&session)
            .await?
            .ok_or(CoreError::InvalidToken)
    }
}
