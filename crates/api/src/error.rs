use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use haggle_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `haggle_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    let status = match err {
        CoreError::DuplicateUser => StatusCode::CONFLICT,
        CoreError::UserNotFound => StatusCode::NOT_FOUND,
        CoreError::InvalidPassword | CoreError::InvalidToken | CoreError::InvalidFingerprint => {
            StatusCode::UNAUTHORIZED
        }
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::HashingFailure(_)
        | CoreError::TokenIssuance(_)
        | CoreError::StorageFailure(_) => {
            tracing::error!(error = %err, code = err.code(), "Internal core error");
            return internal();
        }
    };
    (status, err.code(), err.to_string())
}

/// 500 with a sanitized message; the detail only goes to the log.
fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
