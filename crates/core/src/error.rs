/// Error kinds reported by the identity subsystem.
///
/// Token failures are deliberately undifferentiated: a malformed, expired,
/// revoked, unknown or badly-signed credential all surface as
/// [`CoreError::InvalidToken`]. Messages never carry passwords, tokens or
/// session identifiers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("User with this email already exists")]
    DuplicateUser,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Password hashing failed: {0}")]
    HashingFailure(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid fingerprint")]
    InvalidFingerprint,

    /// Signing an access token or drawing a session id failed.
    #[error("Failed to issue credentials: {0}")]
    TokenIssuance(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::DuplicateUser => "DUPLICATE_USER",
            CoreError::UserNotFound => "USER_NOT_FOUND",
            CoreError::InvalidPassword => "INVALID_PASSWORD",
            CoreError::HashingFailure(_) => "HASHING_FAILURE",
            CoreError::InvalidToken => "INVALID_TOKEN",
            CoreError::InvalidFingerprint => "INVALID_FINGERPRINT",
            CoreError::TokenIssuance(_) => "TOKEN_ISSUANCE_FAILURE",
            CoreError::StorageFailure(_) => "STORAGE_FAILURE",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}
