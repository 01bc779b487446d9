pub mod auth;
pub mod health;
pub mod user;

use axum::Router;

use crate::state::AppState;

/// Build the API route tree, nested under the configured base path.
///
/// ```text
/// /auth/register        register (public)
/// /auth/login           login (public)
/// /auth/refresh         rotate refresh session (public)
/// /auth/logout          revoke refresh session (public)
///
/// /users/me             get, patch (requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", user::router())
}
