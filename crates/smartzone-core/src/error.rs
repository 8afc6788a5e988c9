// ── Core error types ──
//
// User-facing errors from smartzone-core. Callers get a kind, a message,
// and (for remote rejections) the controller's body for diagnostics.
// The `From<smartzone_api::Error>` impl translates transport-layer errors
// into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to controller: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Could not find {resource} with name '{name}'")]
    NotFound { resource: String, name: String },

    // ── Remote rejections ────────────────────────────────────────────
    #[error("{method} {path} rejected by controller (HTTP {status}): {message}")]
    Remote {
        method: String,
        path: String,
        status: u16,
        message: String,
        /// The decoded response body, kept verbatim for diagnostics.
        body: serde_json::Value,
    },

    #[error("Unexpected response from {path}: {message}")]
    UnexpectedResponse { path: String, message: String },

    // ── Caller errors ────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<smartzone_api::Error> for CoreError {
    fn from(err: smartzone_api::Error) -> Self {
        match err {
            smartzone_api::Error::Connectivity { message } => {
                CoreError::ConnectionFailed { reason: message }
            }
            smartzone_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            smartzone_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            smartzone_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            smartzone_api::Error::Remote {
                method,
                path,
                status,
                body,
            } => {
                let message = match body.get("message").and_then(serde_json::Value::as_str) {
                    Some(msg) => msg.to_owned(),
                    None if body.is_null() => "no response body".to_owned(),
                    None => body.to_string(),
                };
                CoreError::Remote {
                    method: method.to_string(),
                    path,
                    status,
                    message,
                    body,
                }
            }
            smartzone_api::Error::NotFound { resource, name } => {
                CoreError::NotFound { resource, name }
            }
            smartzone_api::Error::Deserialization { path, message } => {
                CoreError::UnexpectedResponse { path, message }
            }
        }
    }
}
