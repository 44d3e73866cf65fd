//! Domain-specific error types for sheet-mind

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Main error type for the sheet-mind service
#[derive(Error, Debug)]
pub enum SheetMindError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Credential error: {message}")]
    Credential { message: String },

    #[error("Table error: {message}")]
    Table { message: String },

    #[error("Agent error: {message}")]
    Agent { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<anyhow::Error> for SheetMindError {
    fn from(err: anyhow::Error) -> Self {
        SheetMindError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SheetMindError {
    fn from(err: serde_json::Error) -> Self {
        SheetMindError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for SheetMindError {
    fn from(err: reqwest::Error) -> Self {
        SheetMindError::Agent {
            message: format!("HTTP request failed: {}", err),
        }
    }
}

impl From<std::io::Error> for SheetMindError {
    fn from(err: std::io::Error) -> Self {
        SheetMindError::Table {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for SheetMindError {
    fn from(err: csv::Error) -> Self {
        SheetMindError::Table {
            message: err.to_string(),
        }
    }
}

impl From<calamine::Error> for SheetMindError {
    fn from(err: calamine::Error) -> Self {
        SheetMindError::Table {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SheetMindError {
    fn from(err: toml::de::Error) -> Self {
        SheetMindError::Config {
            message: err.to_string(),
        }
    }
}

/// Convert SheetMindError to an HTTP response.
///
/// The JSON body separates the error kind (for logs and tooling) from the
/// user-facing message, which the UI renders verbatim.
impl IntoResponse for SheetMindError {
    fn into_response(self) -> Response {
        let (status, kind, details) = match self {
            SheetMindError::Config { message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "config", message)
            }
            SheetMindError::Credential { message } => {
                (StatusCode::UNAUTHORIZED, "credential", message)
            }
            SheetMindError::Table { message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "table", message)
            }
            SheetMindError::Agent { message } => (StatusCode::BAD_GATEWAY, "agent", message),
            SheetMindError::Serialization { message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization", message)
            }
            SheetMindError::Timeout {
                operation,
                timeout_ms,
            } => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                format!("{operation} timed out after {timeout_ms}ms"),
            ),
            SheetMindError::Validation { message } => {
                (StatusCode::BAD_REQUEST, "validation", message)
            }
            SheetMindError::Internal { message } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        };

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            json!({ "ok": false, "error": { "kind": kind, "message": details } }).to_string(),
        )
            .into_response()
    }
}

/// Result type alias for sheet-mind operations
pub type Result<T> = std::result::Result<T, SheetMindError>;
