//! Error types for the asset exporter
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The main error type for the asset exporter
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("OAuth2 error: {message}")]
    OAuth2 { message: String },

    // ============================================================================
    // Single-attempt HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Request Outcome Errors
    // ============================================================================
    #[error("{}", describe_request_failure(*status, body, *attempts))]
    RequestFailure {
        status: Option<u16>,
        body: String,
        attempts: u32,
    },

    #[error("Rate limit still exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Run Errors
    // ============================================================================
    #[error("Run cancelled")]
    Cancelled,

    #[error("State error: {message}")]
    State { message: String },

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

fn describe_request_failure(status: Option<u16>, body: &str, attempts: u32) -> String {
    match status {
        Some(status) => format!("Request failed with HTTP {status} after {attempts} attempt(s): {body}"),
        None => format!("Request failed after {attempts} attempt(s): {body}"),
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a protocol violation error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Check if this error is retryable within a single logical request
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            Error::RequestFailure { status, .. } => *status,
            Error::RateLimitExceeded { .. } => Some(429),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Collapse a final attempt error into the request-level taxonomy.
    ///
    /// Raw transport and status errors become `RequestFailure` (or
    /// `RateLimitExceeded` when the last signal was a 429); all other
    /// errors pass through untouched.
    pub fn into_request_failure(self, attempts: u32) -> Self {
        match self {
            Error::HttpStatus { status: 429, .. } => Error::RateLimitExceeded { attempts },
            Error::HttpStatus { status, body } => Error::RequestFailure {
                status: Some(status),
                body,
                attempts,
            },
            Error::Http(e) => Error::RequestFailure {
                status: e.status().map(|s| s.as_u16()),
                body: e.to_string(),
                attempts,
            },
            other => other,
        }
    }

    /// Classify this error for run reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Auth { .. } | Error::OAuth2 { .. } => ErrorKind::AuthFailure,
            Error::RequestFailure { .. } | Error::Http(_) | Error::HttpStatus { .. } => {
                ErrorKind::RequestFailure
            }
            Error::ProtocolViolation { .. } | Error::Decode { .. } | Error::JsonParse(_) => {
                ErrorKind::ProtocolViolation
            }
            Error::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Config { .. }
            | Error::MissingConfigField { .. }
            | Error::InvalidConfigValue { .. }
            | Error::YamlParse(_)
            | Error::InvalidUrl(_) => ErrorKind::Config,
            Error::State { .. }
            | Error::Output { .. }
            | Error::Io(_)
            | Error::FileNotFound { .. }
            | Error::Other(_)
            | Error::Anyhow(_) => ErrorKind::Internal,
        }
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Coarse classification of a failure, as reported at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthFailure,
    RequestFailure,
    ProtocolViolation,
    RateLimitExceeded,
    Cancelled,
    Config,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::AuthFailure => "AuthFailure",
            ErrorKind::RequestFailure => "RequestFailure",
            ErrorKind::ProtocolViolation => "ProtocolViolation",
            ErrorKind::RateLimitExceeded => "RateLimitExceeded",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Config => "Config",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

/// Result type alias for the asset exporter
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("client_id");
        assert_eq!(err.to_string(), "Missing required config field: client_id");

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::RequestFailure {
            status: Some(400),
            body: "bad filter".to_string(),
            attempts: 1,
        };
        assert_eq!(
            err.to_string(),
            "Request failed with HTTP 400 after 1 attempt(s): bad filter"
        );
    }

    #[test_case(429, true ; "too many requests")]
    #[test_case(500, true ; "internal error")]
    #[test_case(502, true ; "bad gateway")]
    #[test_case(503, true ; "unavailable")]
    #[test_case(524, true ; "origin timeout")]
    #[test_case(400, false ; "bad request")]
    #[test_case(401, false ; "unauthorized")]
    #[test_case(403, false ; "forbidden")]
    #[test_case(404, false ; "not found")]
    fn test_is_retryable_status(status: u16, expected: bool) {
        assert_eq!(Error::http_status(status, "").is_retryable(), expected);
    }

    #[test]
    fn test_non_http_errors_not_retryable() {
        assert!(!Error::config("test").is_retryable());
        assert!(!Error::protocol("loop").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::RateLimitExceeded { attempts: 5 }.is_retryable());
    }

    #[test]
    fn test_into_request_failure() {
        let err = Error::http_status(503, "down").into_request_failure(5);
        match err {
            Error::RequestFailure {
                status,
                body,
                attempts,
            } => {
                assert_eq!(status, Some(503));
                assert_eq!(body, "down");
                assert_eq!(attempts, 5);
            }
            other => panic!("Expected RequestFailure, got {other:?}"),
        }

        let err = Error::http_status(429, "slow down").into_request_failure(3);
        assert!(matches!(err, Error::RateLimitExceeded { attempts: 3 }));

        let err = Error::protocol("bad").into_request_failure(1);
        assert!(matches!(err, Error::ProtocolViolation { .. }));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::auth("expired").kind(), ErrorKind::AuthFailure);
        assert_eq!(Error::protocol("x").kind(), ErrorKind::ProtocolViolation);
        assert_eq!(
            Error::RateLimitExceeded { attempts: 2 }.kind(),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            Error::http_status(400, "").into_request_failure(1).kind(),
            ErrorKind::RequestFailure
        );
        assert_eq!(ErrorKind::RequestFailure.to_string(), "RequestFailure");
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
