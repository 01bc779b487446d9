use std::sync::Arc;

use crate::auth::identity::IdentityService;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, used directly only by the health check.
    pub pool: haggle_db::DbPool,
    /// Server configuration (cookie attributes, CORS, timeouts).
    pub config: Arc<ServerConfig>,
    /// Registration, login and session lifecycle.
    pub identity: Arc<IdentityService>,
}
