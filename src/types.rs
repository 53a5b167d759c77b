//! Error types for shgate

use hyper::StatusCode;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, GateError>;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Script is not locked: {0}")]
    NotLocked(String),

    #[error("Server misconfiguration: {0}")]
    Misconfigured(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// HTTP status surfaced to callers for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::InvalidPath(_) | GateError::BadRequest(_) | GateError::NotLocked(_) => {
                StatusCode::BAD_REQUEST
            }
            GateError::NotFound(_) => StatusCode::NOT_FOUND,
            GateError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GateError::Conflict(_) => StatusCode::CONFLICT,
            GateError::Misconfigured(_)
            | GateError::Database(_)
            | GateError::Auth(_)
            | GateError::Internal(_)
            | GateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            GateError::InvalidPath(_) => "INVALID_PATH",
            GateError::NotFound(_) => "NOT_FOUND",
            GateError::Unauthorized(_) => "UNAUTHORIZED",
            GateError::Conflict(_) => "CONFLICT",
            GateError::BadRequest(_) => "BAD_REQUEST",
            GateError::NotLocked(_) => "NOT_LOCKED",
            GateError::Misconfigured(_) => "MISCONFIGURED",
            GateError::Database(_) => "DB_ERROR",
            GateError::Auth(_) => "AUTH_ERROR",
            GateError::Internal(_) | GateError::Io(_) => "INTERNAL",
        }
    }

    /// Message safe to return to clients.
    ///
    /// Server-side failures are collapsed so storage details never leak.
    pub fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => match self {
                GateError::Misconfigured(msg) => msg.clone(),
                _ => "Internal server error".to_string(),
            },
            _ => match self {
                GateError::InvalidPath(msg)
                | GateError::NotFound(msg)
                | GateError::Unauthorized(msg)
                | GateError::Conflict(msg)
                | GateError::BadRequest(msg)
                | GateError::NotLocked(msg) => msg.clone(),
                other => other.to_string(),
            },
        }
    }
}

impl From<rusqlite::Error> for GateError {
    fn from(e: rusqlite::Error) -> Self {
        GateError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for GateError {
    fn from(e: serde_json::Error) -> Self {
        GateError::BadRequest(format!("Invalid JSON: {e}"))
    }
}
