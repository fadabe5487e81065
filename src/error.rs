//! Error types for signup-gateway

use axum::http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Document store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Error::StorageUnavailable(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Error::StorageWrite(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// True for failures caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::MissingFields(_) | Error::InvalidEmail)
    }

    /// HTTP status a failed request should answer with.
    pub fn status(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Message safe to hand back to an HTTP caller.
    ///
    /// Validation errors are reported verbatim; driver and internal errors are
    /// replaced with a fixed message so connection details never leak.
    pub fn public_message(&self) -> String {
        match self {
            Error::MissingFields(_) | Error::InvalidEmail => self.to_string(),
            Error::StorageUnavailable(_) => "Database not initialized".to_string(),
            Error::StorageWrite(_) => "Failed to store form submission".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}
