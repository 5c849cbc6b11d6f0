//! Error taxonomy
//!
//! Every failure in the gateway ends up as an [`ErrorEnvelope`] with one of
//! four closed [`ErrorKind`]s. Handlers return [`ToolError`]; the dispatcher
//! wraps that and its own failures in a [`Failure`] and hands it to the
//! [`ErrorNormalizer`], the only producer of envelopes.

mod normalizer;
mod tool;

pub use normalizer::{ErrorNormalizer, Failure};
pub use tool::{ProviderError, ToolError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes carried by envelopes
pub mod codes {
    pub const METHOD_NOT_FOUND: &str = "method_not_found";
    pub const MALFORMED_REQUEST: &str = "malformed_request";
    pub const INVALID_ARGUMENTS: &str = "invalid_arguments";
    pub const PROVIDER_REJECTED: &str = "provider_rejected";
    pub const JOB_FAILED: &str = "job_failed";
    pub const JOB_TIMED_OUT: &str = "job_timed_out";
    pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
    pub const CANCELLED: &str = "cancelled";
    pub const PANICKED: &str = "panicked";
    pub const INTERNAL: &str = "internal";
}

/// The four closed error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing arguments; never retryable
    ValidationError,
    /// Upstream provider rejected or failed the request
    DomainError,
    /// Unknown tool or malformed invocation envelope; never retryable
    ProtocolError,
    /// Anything unclassified
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::DomainError => "domain_error",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violated field, addressed by a path such as `tags[2]` or `options.size`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub path: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Caller-facing error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

impl ErrorEnvelope {
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Error code, if any
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
