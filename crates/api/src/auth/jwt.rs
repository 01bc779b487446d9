//! Access-token signing/verification and refresh-session minting.
//!
//! Access tokens are HS256-signed JWTs carrying an [`AccessClaims`] payload.
//! They are stateless: nothing about them is stored server-side.
//! Refresh sessions are identified by a random UUID that the client resubmits
//! as a bearer value; the session row itself lives in the session store.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use haggle_core::types::{DbId, Timestamp};
use haggle_db::models::session::{RefreshSession, SessionStatus};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};

use crate::config::{parse_env, ConfigError};

/// The only algorithm tokens are signed with or accepted under.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims embedded in every access token. All three are required.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

/// A verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessToken {
    pub user_id: DbId,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign access token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    /// Covers bad algorithm, bad signature, missing or mistyped claims and
    /// expiry alike.
    #[error("invalid token")]
    Invalid,

    #[error("secure randomness unavailable: {0}")]
    Randomness(String),
}

/// Configuration for token generation and validation.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 60).
    pub access_token_expiry_mins: i64,
    /// Refresh session lifetime in days (default: 30).
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 60;
/// Default refresh session expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 30;

impl JwtConfig {
    /// Load token configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `60`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `30`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if secret.is_empty() {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: "must not be empty".into(),
            });
        }

        let config = Self {
            secret,
            access_token_expiry_mins: parse_env("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS)?,
            refresh_token_expiry_days: parse_env(
                "JWT_REFRESH_EXPIRY_DAYS",
                DEFAULT_REFRESH_EXPIRY_DAYS,
            )?,
        };
        config.access_lifetime()?;
        config.refresh_lifetime()?;
        Ok(config)
    }

    /// Access token lifetime. Rejects non-positive or unrepresentable values.
    pub fn access_lifetime(&self) -> Result<Duration, ConfigError> {
        checked_lifetime(
            "JWT_ACCESS_EXPIRY_MINS",
            self.access_token_expiry_mins,
            Duration::try_minutes(self.access_token_expiry_mins),
        )
    }

    /// Refresh session lifetime. Rejects non-positive or unrepresentable values.
    pub fn refresh_lifetime(&self) -> Result<Duration, ConfigError> {
        checked_lifetime(
            "JWT_REFRESH_EXPIRY_DAYS",
            self.refresh_token_expiry_days,
            Duration::try_days(self.refresh_token_expiry_days),
        )
    }
}

/// A lifetime must be positive and must not push an expiry past the
/// representable date range.
fn checked_lifetime(
    key: &'static str,
    raw: i64,
    lifetime: Option<Duration>,
) -> Result<Duration, ConfigError> {
    if raw <= 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("must be positive, got {raw}"),
        });
    }
    lifetime
        .filter(|d| Utc::now().checked_add_signed(*d).is_some())
        .ok_or_else(|| ConfigError::Invalid {
            key,
            reason: format!("{raw} is out of range"),
        })
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_token_expiry_mins", &self.access_token_expiry_mins)
            .field("refresh_token_expiry_days", &self.refresh_token_expiry_days)
            .finish()
    }
}

/// Signs and verifies access tokens under one secret, and mints refresh sessions.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        // `Validation::new` pins the accepted algorithm list to exactly one entry.
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign an access token for `user_id` valid for `lifetime` from now.
    pub fn sign_access(&self, user_id: DbId, lifetime: Duration) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user_id,
            iat: now,
            exp: now + lifetime.num_seconds(),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Verify an access token and return its subject and validity window.
    ///
    /// Every failure is reported as [`TokenError::Invalid`].
    pub fn verify_access(&self, token: &str) -> Result<AccessToken, TokenError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        // jsonwebtoken accepts `exp == now`; the token is already dead then.
        if Utc::now().timestamp() >= claims.exp {
            return Err(TokenError::Invalid);
        }

        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Invalid)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Invalid)?;

        Ok(AccessToken {
            user_id: claims.sub,
            issued_at,
            expires_at,
        })
    }

    /// Mint a new, not yet persisted, refresh session.
    ///
    /// The identifier is a UUID v4 built from 16 bytes of OS randomness; this
    /// fails only if the OS RNG does.
    pub fn new_refresh_session(
        &self,
        fingerprint: &str,
        user_id: DbId,
        lifetime: Duration,
    ) -> Result<RefreshSession, TokenError> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenError::Randomness(e.to_string()))?;

        let now = Utc::now();
        Ok(RefreshSession {
            id: uuid::Builder::from_random_bytes(bytes).into_uuid(),
            user_id,
            fingerprint: fingerprint.to_string(),
            created_at: now,
            expires_at: now + lifetime,
            status: SessionStatus::Active,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    const SECRET: &[u8] = b"test-secret-that-is-long-enough-for-hmac";

    fn sign_raw(header: Header, claims: serde_json::Value) -> String {
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).expect("encoding should succeed")
    }

    #[test]
    fn test_sign_and_verify_access_token() {
        let signer = TokenSigner::new(SECRET);
        let token = signer
            .sign_access(42, Duration::hours(1))
            .expect("token generation should succeed");

        let access = signer.verify_access(&token).expect("token should verify");
        assert_eq!(access.user_id, 42);
        assert_eq!(access.expires_at - access.issued_at, Duration::hours(1));
    }

    #[test]
    fn test_expired_token_fails() {
        let signer = TokenSigner::new(SECRET);
        let token = signer.sign_access(1, Duration::seconds(-5)).unwrap();
        assert_matches!(signer.verify_access(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_token_dies_once_lifetime_elapses() {
        let signer = TokenSigner::new(SECRET);
        let token = signer.sign_access(1, Duration::seconds(1)).unwrap();
        assert!(signer.verify_access(&token).is_ok());

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_matches!(signer.verify_access(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_different_secrets_fail() {
        let token = TokenSigner::new(b"secret-alpha")
            .sign_access(1, Duration::hours(1))
            .unwrap();

        let result = TokenSigner::new(b"secret-bravo").verify_access(&token);
        assert_matches!(result, Err(TokenError::Invalid));
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let now = Utc::now().timestamp();
        let token = sign_raw(
            Header::new(Algorithm::HS512),
            json!({ "sub": 1, "iat": now, "exp": now + 3600 }),
        );
        assert_matches!(
            TokenSigner::new(SECRET).verify_access(&token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_missing_claim_is_rejected() {
        let now = Utc::now().timestamp();
        let token = sign_raw(Header::default(), json!({ "sub": 1, "exp": now + 3600 }));
        assert_matches!(
            TokenSigner::new(SECRET).verify_access(&token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_mistyped_subject_is_rejected() {
        let now = Utc::now().timestamp();
        let token = sign_raw(
            Header::default(),
            json!({ "sub": "someone", "iat": now, "exp": now + 3600 }),
        );
        assert_matches!(
            TokenSigner::new(SECRET).verify_access(&token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_matches!(
            TokenSigner::new(SECRET).verify_access("not.a.jwt"),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_new_refresh_session_is_active_and_bound() {
        let signer = TokenSigner::new(SECRET);
        let session = signer
            .new_refresh_session("fp1", 9, Duration::days(30))
            .unwrap();

        assert_eq!(session.user_id, 9);
        assert_eq!(session.fingerprint, "fp1");
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.expires_at - session.created_at, Duration::days(30));
        assert_eq!(session.id.get_version_num(), 4);
        assert!(session.is_active_at(Utc::now()));
    }

    #[test]
    fn test_refresh_session_ids_are_unique() {
        let signer = TokenSigner::new(SECRET);
        let a = signer.new_refresh_session("fp", 1, Duration::days(1)).unwrap();
        let b = signer.new_refresh_session("fp", 1, Duration::days(1)).unwrap();
        assert_ne!(a.id, b.id);
    }

    fn config(access_mins: i64, refresh_days: i64) -> JwtConfig {
        JwtConfig {
            secret: "secret".into(),
            access_token_expiry_mins: access_mins,
            refresh_token_expiry_days: refresh_days,
        }
    }

    #[test]
    fn test_default_lifetimes() {
        let config = config(DEFAULT_ACCESS_EXPIRY_MINS, DEFAULT_REFRESH_EXPIRY_DAYS);
        assert_eq!(config.access_lifetime().unwrap(), Duration::hours(1));
        assert_eq!(config.refresh_lifetime().unwrap(), Duration::days(30));
    }

    #[test]
    fn test_non_positive_lifetimes_are_rejected() {
        assert_matches!(
            config(-5, 30).access_lifetime(),
            Err(ConfigError::Invalid { key: "JWT_ACCESS_EXPIRY_MINS", .. })
        );
        assert_matches!(
            config(0, 30).access_lifetime(),
            Err(ConfigError::Invalid { key: "JWT_ACCESS_EXPIRY_MINS", .. })
        );
        assert_matches!(
            config(60, 0).refresh_lifetime(),
            Err(ConfigError::Invalid { key: "JWT_REFRESH_EXPIRY_DAYS", .. })
        );
    }

    #[test]
    fn test_overflowing_lifetimes_are_rejected() {
        assert_matches!(
            config(i64::MAX / 2, 30).access_lifetime(),
            Err(ConfigError::Invalid { key: "JWT_ACCESS_EXPIRY_MINS", .. })
        );
        assert_matches!(
            config(60, i64::MAX).refresh_lifetime(),
            Err(ConfigError::Invalid { key: "JWT_REFRESH_EXPIRY_DAYS", .. })
        );
        // Representable as a duration, but not as an expiry date.
        assert_matches!(
            config(60, 1_000_000_000).refresh_lifetime(),
            Err(ConfigError::Invalid { key: "JWT_REFRESH_EXPIRY_DAYS", .. })
        );
    }

    #[test]
    fn test_from_env_rejects_negative_access_lifetime() {
        std::env::set_var("JWT_SECRET", "from-env-secret");
        std::env::set_var("JWT_ACCESS_EXPIRY_MINS", "-5");
        let result = JwtConfig::from_env();
        std::env::remove_var("JWT_ACCESS_EXPIRY_MINS");
        std::env::remove_var("JWT_SECRET");

        assert_matches!(
            result,
            Err(ConfigError::Invalid { key: "JWT_ACCESS_EXPIRY_MINS", .. })
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = JwtConfig {
            secret: "super-secret".into(),
            access_token_expiry_mins: 60,
            refresh_token_expiry_days: 30,
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret"));
    }
}
