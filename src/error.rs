//! Error types for the Vision One SDK

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the SDK
#[derive(Debug, Error)]
pub enum Error {
    /// Structured error decoded from a non-2xx response body
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Network, DNS or TLS failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response whose body is not a structured API error
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// A 2xx response whose body could not be decoded
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The rate limiter's stop signal fired
    #[error("Operation stopped")]
    Stopped,

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The sandbox reported a failed analysis
    #[error("Submission error: {code}: {message}")]
    Submission { code: ErrorCode, message: String },

    #[error("Vision One domain not detected")]
    DomainNotDetected,
}

impl Error {
    /// Structured API error, if this is one.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the server reported the requested resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.api().is_some_and(|e| e.code == ErrorCode::NotFound)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Transport("Request timed out".to_string())
        } else if err.is_connect() {
            Error::Transport(format!("Failed to connect: {}", err))
        } else {
            Error::Transport(err.to_string())
        }
    }
}

/// Error code reported by the Vision One API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCode {
    AccessDenied,
    BadRequest,
    ConditionNotMet,
    InternalServerError,
    NotFound,
    ParameterNotAccepted,
    RequestEntityTooLarge,
    TooManyRequests,
    Unsupported,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::AccessDenied => "AccessDenied",
            ErrorCode::BadRequest => "BadRequest",
            ErrorCode::ConditionNotMet => "ConditionNotMet",
            ErrorCode::InternalServerError => "InternalServerError",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::ParameterNotAccepted => "ParameterNotAccepted",
            ErrorCode::RequestEntityTooLarge => "RequestEntityTooLarge",
            ErrorCode::TooManyRequests => "TooManyRequests",
            ErrorCode::Unsupported => "Unsupported",
            ErrorCode::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Service-level detail attached to some API errors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerError {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub code: String,
}

/// Body of an `{"error": {...}}` response, also embedded in task records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "innererror", skip_serializing_if = "Option::is_none")]
    pub inner: Option<InnerError>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Structured API error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status of the response that carried the error
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
    pub inner: Option<InnerError>,
}

impl ApiError {
    /// Decode an error envelope. Returns `None` when the body is not one.
    pub fn from_body(status: u16, body: &[u8]) -> Option<Self> {
        let envelope: ErrorEnvelope = serde_json::from_slice(body).ok()?;
        let ErrorBody {
            code,
            message,
            inner,
        } = envelope.error;
        Some(Self {
            status,
            code,
            message,
            inner,
        })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)?;
        if let Some(inner) = self.inner.as_ref().filter(|i| !i.code.is_empty()) {
            write!(f, " ({}: {})", inner.service, inner.code)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Local validation failures, raised before any network traffic
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Request already executed; build a new one")]
    AlreadyUsed,

    #[error("Invalid identifier {0:?}: expected a UUID")]
    InvalidId(String),

    #[error("Missing required input: {0}")]
    MissingInput(&'static str),
}

/// Result cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cannot parse cached timestamp {0:?}")]
    Timestamp(String),

    #[error("Corrupt cache row: {0}")]
    Corrupt(String),

    #[error("Cache iteration aborted: {0}")]
    Callback(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("API token not configured. Pass --token or set VONE_TOKEN.")]
    MissingToken,

    #[error("API domain not configured. Pass --domain or run `vone detect-domain`.")]
    MissingDomain,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
