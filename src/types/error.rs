//! Error types for Sardene
//!
//! One enum per failure family, wrapped by [`SardeneError`] at the HTTP edge.
//! Internal detail (upstream bodies, driver messages) stays in `Display` for
//! logging; clients only ever see [`SardeneError::public_message`].

use hyper::StatusCode;

/// Failures while establishing who the caller is
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header must be a single `Bearer <token>`")]
    InvalidHeaderFormat,

    #[error("Authorization code was rejected by the provider")]
    InvalidCode,

    #[error("Identity provider request failed: {0}")]
    UpstreamFailure(String),

    #[error("Credential does not resolve to a provider login")]
    InvalidIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("Idea already engaged by this user")]
    AlreadyEngaged,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("Idea not found")]
    IdeaMissing,
}

/// Input rejected before any network or storage call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Malformed body: {0}")]
    MalformedBody(String),

    #[error("Idea id is not valid: {0}")]
    InvalidIdeaId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage deadline exceeded during {0}")]
    Timeout(&'static str),
}

impl From<mongodb::error::Error> for StorageError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Main error type for Sardene operations
#[derive(Debug, thiserror::Error)]
pub enum SardeneError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SardeneError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(AuthError::InvalidHeaderFormat | AuthError::InvalidIdentity) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Auth(AuthError::InvalidCode | AuthError::UpstreamFailure(_)) => {
                StatusCode::FORBIDDEN
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(AuthError::InvalidHeaderFormat) => "INVALID_AUTH_HEADER",
            Self::Auth(AuthError::InvalidCode) => "INVALID_CODE",
            Self::Auth(AuthError::UpstreamFailure(_)) => "UPSTREAM_AUTH_FAILED",
            Self::Auth(AuthError::InvalidIdentity) => "INVALID_IDENTITY",
            Self::Conflict(ConflictError::AlreadyEngaged) => "ALREADY_ENGAGED",
            Self::NotFound(NotFoundError::IdeaMissing) => "IDEA_NOT_FOUND",
            Self::Validation(ValidationError::MalformedBody(_)) => "MALFORMED_BODY",
            Self::Validation(ValidationError::InvalidIdeaId(_)) => "INVALID_IDEA_ID",
            Self::Storage(StorageError::Unavailable(_)) => "STORAGE_UNAVAILABLE",
            Self::Storage(StorageError::Timeout(_)) => "STORAGE_TIMEOUT",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand to a client. Never echoes upstream or driver text.
    pub fn public_message(&self) -> String {
        match self {
            Self::Auth(AuthError::UpstreamFailure(_)) | Self::Auth(AuthError::InvalidCode) => {
                "Cannot be authenticated".to_string()
            }
            Self::Auth(e) => e.to_string(),
            Self::Conflict(e) => e.to_string(),
            Self::NotFound(e) => e.to_string(),
            Self::Validation(e) => e.to_string(),
            Self::Storage(_) => "Service temporarily unavailable".to_string(),
            Self::Config(_) | Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<mongodb::error::Error> for SardeneError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Storage(err.into())
    }
}

impl From<std::io::Error> for SardeneError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type alias for Sardene operations
pub type Result<T> = std::result::Result<T, SardeneError>;
