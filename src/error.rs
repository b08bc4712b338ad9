//! Error types for materials-project-mcp.
//!
//! # Security Note
//!
//! Error messages are carefully crafted to NEVER include credentials.
//! The Materials Project API key is only ever placed in a request header;
//! no error variant carries it.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised while building the upstream HTTP session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The API key cannot be sent as an HTTP header value.
    #[error("API key contains characters that are not valid in an HTTP header")]
    InvalidApiKey,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Classification of an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// Network failure, timeout, rate limit or server-side error.
    Unavailable,
    /// The API key was missing, expired or rejected.
    Unauthorized,
    /// The upstream refused the query itself (HTTP 4xx other than auth).
    Rejected,
    /// The upstream answered with a body we could not decode.
    Malformed,
}

/// A failed call against the upstream materials database.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct UpstreamError {
    /// Failure classification.
    pub kind: UpstreamErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl UpstreamError {
    /// Creates an `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::Unavailable,
            message: message.into(),
        }
    }

    /// Creates an `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::Unauthorized,
            message: message.into(),
        }
    }

    /// Creates a `Rejected` error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::Rejected,
            message: message.into(),
        }
    }

    /// Creates a `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::Malformed,
            message: message.into(),
        }
    }

    /// Whether the adapter may retry this failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, UpstreamErrorKind::Unavailable)
    }
}

/// Stable error tag reported to the calling assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// The request was not a well-formed tool invocation.
    MalformedRequest,
    /// No tool with the requested name exists.
    UnknownTool,
    /// An argument was missing, mistyped or out of range.
    InvalidArgument,
    /// The upstream database could not be reached. Retryable.
    Unavailable,
    /// The upstream database rejected the credentials.
    Unauthorized,
    /// The upstream database refused the query.
    Rejected,
    /// Anything else.
    InternalError,
}

impl ErrorKind {
    /// Returns the tag as it appears in tool results.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedRequest => "MalformedRequest",
            Self::UnknownTool => "UnknownTool",
            Self::InvalidArgument => "InvalidArgument",
            Self::Unavailable => "Unavailable",
            Self::Unauthorized => "Unauthorized",
            Self::Rejected => "Rejected",
            Self::InternalError => "InternalError",
        }
    }

    /// Whether the caller may reasonably retry the same request.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while handling a single tool call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// The request could not be interpreted as a tool invocation.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// The named tool is not registered.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },

    /// An argument failed validation.
    #[error("invalid argument '{field}': {message}")]
    InvalidArgument {
        /// Name of the offending argument.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// The upstream call failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// An unexpected failure inside a handler.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl ToolError {
    /// Creates an `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the stable tag for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedRequest { .. } => ErrorKind::MalformedRequest,
            Self::UnknownTool { .. } => ErrorKind::UnknownTool,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Upstream(e) => match e.kind {
                UpstreamErrorKind::Unavailable => ErrorKind::Unavailable,
                UpstreamErrorKind::Unauthorized => ErrorKind::Unauthorized,
                UpstreamErrorKind::Rejected => ErrorKind::Rejected,
                UpstreamErrorKind::Malformed => ErrorKind::InternalError,
            },
            Self::Internal { .. } => ErrorKind::InternalError,
        }
    }

    /// Returns the offending argument name, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidArgument { field, .. } => Some(field),
            _ => None,
        }
    }
}
