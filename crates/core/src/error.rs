// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A required feature flag is off
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Raised by job handlers; the queue turns it into a retry or a dead letter
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP-style status code for the external routing layer
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) | AppError::Serialization(_) | AppError::Domain(_) => 400,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) | AppError::InvalidState(_) => 409,
            AppError::Timeout(_) => 504,
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Handler(_)
            | AppError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code, mirrors the status mapping
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::Serialization(_) | AppError::Domain(_) => {
                "BAD_REQUEST"
            }
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) | AppError::InvalidState(_) => "CONFLICT",
            AppError::Timeout(_) => "TIMEOUT",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
