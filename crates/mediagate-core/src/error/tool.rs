//! Handler-side errors.

use super::FieldViolation;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a provider's submit or check-status call.
///
/// The retryable flag is the provider's own signal and is passed through to
/// the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub retryable: bool,
    /// Upstream status code, when the provider speaks HTTP
    pub status: Option<u16>,
}

impl ProviderError {
    /// A failure the provider says may succeed on retry
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            status: None,
        }
    }

    /// A definitive rejection
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Closed result error returned by every tool handler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Arguments passed schema validation but failed a handler-level check
    #[error("invalid arguments: {}", format_violations(.0))]
    InvalidArguments(Vec<FieldViolation>),

    #[error("provider `{provider}` failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("job {job_id} failed: {message}")]
    JobFailed {
        job_id: String,
        message: String,
        retryable: bool,
    },

    #[error("job {job_id} did not finish within {}", format_waited(.waited))]
    JobTimedOut { job_id: String, waited: Duration },

    #[error("invocation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn provider(provider: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            provider: provider.into(),
            source,
        }
    }

    pub fn invalid_argument(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments(vec![FieldViolation::new(path, message)])
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

fn format_waited(waited: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*waited)
}

fn format_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ToolError::provider("sim", ProviderError::transient("503 upstream"));
        assert_eq!(err.to_string(), "provider `sim` failed: 503 upstream");

        let err = ToolError::JobTimedOut {
            job_id: "job-1".into(),
            waited: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "job job-1 did not finish within 1m 30s");

        let err = ToolError::InvalidArguments(vec![
            FieldViolation::new("image_url", "not a URL"),
            FieldViolation::new("mask", "unsupported"),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid arguments: image_url: not a URL; mask: unsupported"
        );
    }

    #[test]
    fn provider_error_constructors() {
        let err = ProviderError::rejected("content policy").with_status(400);
        assert!(!err.retryable);
        assert_eq!(err.status, Some(400));
        assert!(ProviderError::transient("busy").retryable);
    }
}
