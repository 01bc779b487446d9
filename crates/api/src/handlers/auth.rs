//! Handlers for the `/auth` resource (register, login, refresh, logout).
//!
//! Every successful token issuance answers with the pair in the body and
//! the refresh session id in an `HttpOnly` cookie scoped to the auth routes.
//! Refresh and logout read the session id from the body, falling back to
//! that cookie.

use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::identity::{IssuedTokens, NewAccount};
use crate::config::CookieConfig;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Name of the cookie carrying the refresh session id.
pub const REFRESH_COOKIE: &str = "refresh_token";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[serde(default)]
    pub is_store: bool,
    #[validate(length(min = 1, message = "Fingerprint is required"))]
    pub fingerprint: String,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "Fingerprint is required"))]
    pub fingerprint: String,
}

/// Request body for `POST /auth/refresh` and `POST /auth/logout`.
///
/// `refresh_token` may be omitted when the client sends the cookie instead.
#[derive(Debug, Deserialize, Validate)]
pub struct SessionRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[validate(length(min = 1, message = "Fingerprint is required"))]
    pub fingerprint: String,
}

/// Successful authentication response returned by register, login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// The refresh session id.
    pub refresh_token: String,
}

type AuthReply = ([(axum::http::HeaderName, HeaderValue); 1], Json<AuthResponse>);

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account and open its first session.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<AuthReply> {
    input.validate()?;

    let account = NewAccount {
        name: input.name,
        email: input.email,
        phone: input.phone,
        password: input.password,
        is_store: input.is_store,
    };
    let tokens = state.identity.register(account, &input.fingerprint).await?;

    auth_reply(&state, tokens)
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password. Returns access and refresh tokens.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<AuthReply> {
    input.validate()?;

    let tokens = state
        .identity
        .authenticate(&input.email, &input.password, &input.fingerprint)
        .await?;

    auth_reply(&state, tokens)
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh session for a new access token and a new session.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SessionRequest>,
) -> AppResult<AuthReply> {
    input.validate()?;
    let session_id = presented_session(&headers, input.refresh_token)?;

    let tokens = state
        .identity
        .refresh(&session_id, &input.fingerprint)
        .await?;

    auth_reply(&state, tokens)
}

/// POST /api/v1/auth/logout
///
/// Revoke the presented session and clear the cookie. Returns 204 No Content.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SessionRequest>,
) -> AppResult<(StatusCode, [(axum::http::HeaderName, HeaderValue); 1])> {
    input.validate()?;
    let session_id = presented_session(&headers, input.refresh_token)?;

    state
        .identity
        .logout(&session_id, &input.fingerprint)
        .await?;

    let cleared = refresh_cookie(&state.config.cookie, "", 0)?;
    Ok((StatusCode::NO_CONTENT, [(SET_COOKIE, cleared)]))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn auth_reply(state: &AppState, tokens: IssuedTokens) -> AppResult<AuthReply> {
    let refresh_token = tokens.session_id.to_string();
    let max_age = state.identity.refresh_lifetime().num_seconds();
    let cookie = refresh_cookie(&state.config.cookie, &refresh_token, max_age)?;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            access_token: tokens.access_token,
            refresh_token,
        }),
    ))
}

/// Body value when non-empty, otherwise the `refresh_token` cookie.
fn presented_session(headers: &HeaderMap, from_body: Option<String>) -> AppResult<String> {
    from_body
        .filter(|token| !token.is_empty())
        .or_else(|| cookie_value(headers, REFRESH_COOKIE))
        .ok_or_else(|| AppError::BadRequest("Refresh token is required".into()))
}

/// Find `name` among the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Render the `Set-Cookie` value for the refresh session cookie.
pub fn refresh_cookie(
    config: &CookieConfig,
    value: &str,
    max_age: i64,
) -> AppResult<HeaderValue> {
    let mut cookie = format!(
        "{REFRESH_COOKIE}={value}; Path={}; Max-Age={max_age}; HttpOnly; Secure; SameSite=Strict",
        config.path()
    );
    if let Some(domain) = &config.domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }

    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::InternalError(format!("Invalid refresh cookie: {e}")))
}
