use thiserror::Error;

use crate::transport::Method;

/// Top-level error type for the `smartzone-api` crate.
///
/// Mirrors the failure taxonomy of the controller conversation: the
/// endpoint could not be reached, the credentials were refused, the
/// controller answered with a status outside the expected set, or a
/// required name lookup did not resolve. `smartzone-core` maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connectivity ────────────────────────────────────────────────
    /// The controller could not be reached (DNS, TLS, refused, timeout),
    /// or the version-discovery endpoint returned nothing usable.
    #[error("Cannot reach controller: {message}")]
    Connectivity { message: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration error (unreadable or invalid CA certificate).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Authentication ──────────────────────────────────────────────
    /// Credentials missing or rejected by the `serviceTicket` endpoint.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Remote ──────────────────────────────────────────────────────
    /// The controller answered with a status outside the whitelist for
    /// this call. The decoded body is kept for diagnostics.
    #[error("{method} {path} failed (HTTP {status}){}", remote_message(.body))]
    Remote {
        method: Method,
        path: String,
        status: u16,
        body: serde_json::Value,
    },

    // ── Lookup ──────────────────────────────────────────────────────
    /// A required name lookup found no object in the collection.
    #[error("Could not find {resource} with name '{name}'")]
    NotFound { resource: String, name: String },

    // ── Data ────────────────────────────────────────────────────────
    /// A success response did not have the expected shape.
    #[error("Unexpected response from {path}: {message}")]
    Deserialization { path: String, message: String },
}

fn remote_message(body: &serde_json::Value) -> String {
    match body.get("message").and_then(serde_json::Value::as_str) {
        Some(msg) => format!(": {msg}"),
        None => String::new(),
    }
}

impl Error {
    /// Returns `true` if the controller could not be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::Tls(_))
    }

    /// Returns `true` for a 403/404 answer or an unresolved lookup.
    ///
    /// SmartZone answers 403 for objects outside the caller's domain, so
    /// existence probes treat both codes as "not there".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Remote { status, .. } => matches!(status, 403 | 404),
            Self::NotFound { .. } => true,
            _ => false,
        }
    }

    /// HTTP status of a remote rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Self::Connectivity { message }
    }
}
