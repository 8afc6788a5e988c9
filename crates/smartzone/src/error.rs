//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use smartzone_config::ConfigError;
use smartzone_core::CoreError;

/// Process exit codes. Success is 0.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const REMOTE: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the controller: {reason}")]
    #[diagnostic(
        code(smartzone::connection_failed),
        help(
            "Check that the controller URL is right and reachable.\n\
             Self-signed certificate? Try --insecure (-k) or set ca_cert in your profile."
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(smartzone::auth_failed),
        help("Verify the username and password for this controller.")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(smartzone::no_credentials),
        help(
            "Set username in the profile (or pass --username) and supply a password via\n\
             --password, SMARTZONE_PASSWORD, or the keyring entry '{profile}/password'."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource} '{name}' not found")]
    #[diagnostic(code(smartzone::not_found))]
    NotFound { resource: String, name: String },

    // ── Controller ───────────────────────────────────────────────────
    #[error("{method} {path} rejected (HTTP {status}): {message}")]
    #[diagnostic(code(smartzone::remote))]
    Remote {
        method: String,
        path: String,
        status: u16,
        message: String,
        /// The controller's response body, shown as help.
        #[help]
        body: Option<String>,
    },

    #[error("Unexpected response from {path}: {message}")]
    #[diagnostic(code(smartzone::unexpected_response))]
    UnexpectedResponse { path: String, message: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(smartzone::validation))]
    Validation { field: String, reason: String },

    #[error("Could not read desired state from {}: {reason}", path.display())]
    #[diagnostic(
        code(smartzone::document),
        help("Documents look like: {{kind, zone?, name, state?, fields, groups?}}")
    )]
    Document { path: PathBuf, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(smartzone::profile_not_found),
        help("Define [profiles.{name}] in {path}")
    )]
    ProfileNotFound { name: String, path: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(smartzone::no_config),
        help(
            "Pass --controller and --username, or create a profile.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(smartzone::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML output failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Remote { .. } => exit_code::REMOTE,
            Self::Validation { .. } | Self::Document { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::NotFound { resource, name } => CliError::NotFound { resource, name },
            CoreError::Remote {
                method,
                path,
                status,
                message,
                body,
            } => CliError::Remote {
                method,
                path,
                status,
                message,
                body: response_help(&body),
            },
            CoreError::UnexpectedResponse { path, message } => {
                CliError::UnexpectedResponse { path, message }
            }
            CoreError::Validation { message } => CliError::Validation {
                field: "document".into(),
                reason: message,
            },
            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

/// `Controller response: {...}`, or nothing for an empty body.
fn response_help(body: &serde_json::Value) -> Option<String> {
    match body {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        other => Some(format!("Controller response: {other}")),
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                path: smartzone_config::config_path().display().to_string(),
            },
            ConfigError::Figment(err) => CliError::Config {
                message: err.to_string(),
            },
        }
    }
}
