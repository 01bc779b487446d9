use axum::routing::get;
use axum::Router;

use crate::handlers::user;
use crate::state::AppState;

/// Routes mounted at `/users`. All require a Bearer access token.
pub fn router() -> Router<AppState> {
    Router::new().route("/me", get(user::get_me).patch(user::update_me))
}
