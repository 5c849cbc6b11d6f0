//! Mapping from raised conditions to caller-facing envelopes.

use super::{ErrorEnvelope, ErrorKind, FieldViolation, ToolError, codes};
use crate::sanitization::SanitizeMessage;
use std::time::Duration;
use tracing::{error, warn};

/// Every condition the dispatcher can raise for one invocation
#[derive(Debug, Clone)]
pub enum Failure {
    /// No tool with this name. `module` is set when the name fell inside a
    /// registered namespace.
    UnknownTool {
        name: String,
        module: Option<String>,
    },
    /// The request envelope itself could not be understood
    MalformedEnvelope { reason: String },
    /// Arguments failed schema validation
    InvalidArguments(Vec<FieldViolation>),
    /// The handler returned an error
    Tool(ToolError),
    /// The handler panicked
    Panicked { detail: String },
    /// The per-invocation deadline elapsed
    DeadlineExceeded { deadline: Duration },
}

impl From<ToolError> for Failure {
    fn from(err: ToolError) -> Self {
        Failure::Tool(err)
    }
}

/// Stateless translator from [`Failure`] to [`ErrorEnvelope`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorNormalizer;

impl ErrorNormalizer {
    /// Normalize a failure into an envelope.
    ///
    /// Internal failures log their full detail here, tagged with
    /// `request_id`, and return only a generic message.
    pub fn normalize(failure: Failure, request_id: &str) -> ErrorEnvelope {
        match failure {
            Failure::UnknownTool { name, module } => {
                let message = match module {
                    Some(module) => {
                        format!("method not found: `{name}` (module `{module}` has no such tool)")
                    }
                    None => format!("method not found: `{name}`"),
                };
                envelope(ErrorKind::ProtocolError, message, false)
                    .with_code(codes::METHOD_NOT_FOUND)
            }
            Failure::MalformedEnvelope { reason } => envelope(
                ErrorKind::ProtocolError,
                format!("malformed request: {}", reason.sanitize_message()),
                false,
            )
            .with_code(codes::MALFORMED_REQUEST),
            Failure::InvalidArguments(violations) => validation(violations),
            Failure::Tool(err) => Self::normalize_tool_error(err, request_id),
            Failure::Panicked { detail } => {
                error!(request_id, detail = %detail, "Tool handler panicked");
                internal(request_id, codes::PANICKED)
            }
            Failure::DeadlineExceeded { deadline } => {
                warn!(
                    request_id,
                    deadline_ms = deadline.as_millis() as u64,
                    "Invocation deadline exceeded"
                );
                envelope(
                    ErrorKind::InternalError,
                    format!(
                        "invocation exceeded its deadline of {}",
                        humantime::format_duration(deadline)
                    ),
                    true,
                )
                .with_code(codes::DEADLINE_EXCEEDED)
            }
        }
    }

    fn normalize_tool_error(err: ToolError, request_id: &str) -> ErrorEnvelope {
        match err {
            ToolError::InvalidArguments(violations) => validation(violations),
            ToolError::Provider { provider, source } => envelope(
                ErrorKind::DomainError,
                format!("{provider}: {}", source.message.sanitize_message()),
                source.retryable,
            )
            .with_code(codes::PROVIDER_REJECTED),
            ToolError::JobFailed {
                job_id,
                message,
                retryable,
            } => envelope(
                ErrorKind::DomainError,
                format!("job {job_id} failed: {}", message.sanitize_message()),
                retryable,
            )
            .with_code(codes::JOB_FAILED),
            err @ ToolError::JobTimedOut { .. } => {
                envelope(ErrorKind::DomainError, err.to_string(), true)
                    .with_code(codes::JOB_TIMED_OUT)
            }
            ToolError::Cancelled => {
                envelope(ErrorKind::InternalError, "invocation cancelled", false)
                    .with_code(codes::CANCELLED)
            }
            ToolError::Internal(detail) => {
                error!(request_id, detail = %detail, "Tool handler failed");
                internal(request_id, codes::INTERNAL)
            }
        }
    }
}

fn envelope(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> ErrorEnvelope {
    ErrorEnvelope {
        kind,
        message: message.into(),
        retryable,
        code: None,
        violations: Vec::new(),
    }
}

fn validation(violations: Vec<FieldViolation>) -> ErrorEnvelope {
    let summary = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    let message = match violations.len() {
        1 => format!("invalid arguments: {summary}"),
        n => format!("invalid arguments ({n} violations): {summary}"),
    };
    ErrorEnvelope {
        violations,
        ..envelope(ErrorKind::ValidationError, message, false).with_code(codes::INVALID_ARGUMENTS)
    }
}

fn internal(request_id: &str, code: &str) -> ErrorEnvelope {
    envelope(
        ErrorKind::InternalError,
        format!("internal error (request {request_id})"),
        false,
    )
    .with_code(code)
}

impl ErrorEnvelope {
    fn with_code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;

    #[test]
    fn unknown_tool_is_protocol_error() {
        let env = ErrorNormalizer::normalize(
            Failure::UnknownTool {
                name: "aud_generate".into(),
                module: None,
            },
            "req-1",
        );
        assert_eq!(env.kind, ErrorKind::ProtocolError);
        assert!(!env.retryable);
        assert_eq!(env.code(), Some(codes::METHOD_NOT_FOUND));
        assert!(env.message.contains("method not found"));
    }

    #[test]
    fn validation_lists_every_violation() {
        let env = ErrorNormalizer::normalize(
            Failure::InvalidArguments(vec![
                FieldViolation::new("prompt", "missing required field"),
                FieldViolation::new("count", "expected integer"),
            ]),
            "req-2",
        );
        assert_eq!(env.kind, ErrorKind::ValidationError);
        assert!(!env.retryable);
        assert_eq!(env.violations.len(), 2);
        assert!(env.message.contains("prompt"));
        assert!(env.message.contains("count"));
    }

    #[test]
    fn provider_retryable_flag_passes_through() {
        for retryable in [true, false] {
            let source = ProviderError {
                message: "upstream said no".into(),
                retryable,
                status: Some(429),
            };
            let env =
                ErrorNormalizer::normalize(ToolError::provider("sim", source).into(), "req-3");
            assert_eq!(env.kind, ErrorKind::DomainError);
            assert_eq!(env.retryable, retryable);
        }
    }

    #[test]
    fn timed_out_is_distinct_from_failed() {
        let timed_out = ErrorNormalizer::normalize(
            ToolError::JobTimedOut {
                job_id: "j1".into(),
                waited: Duration::from_secs(5),
            }
            .into(),
            "req-4",
        );
        let failed = ErrorNormalizer::normalize(
            ToolError::JobFailed {
                job_id: "j1".into(),
                message: "render crashed".into(),
                retryable: false,
            }
            .into(),
            "req-4",
        );
        assert_eq!(timed_out.kind, ErrorKind::DomainError);
        assert_eq!(failed.kind, ErrorKind::DomainError);
        assert_eq!(timed_out.code(), Some(codes::JOB_TIMED_OUT));
        assert_eq!(failed.code(), Some(codes::JOB_FAILED));
        assert!(timed_out.retryable);
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let env = ErrorNormalizer::normalize(
            ToolError::internal("db at postgres://admin:pw@10.0.0.3 unreachable").into(),
            "req-5",
        );
        assert_eq!(env.kind, ErrorKind::InternalError);
        assert!(!env.retryable);
        assert!(!env.message.contains("postgres"));
        assert!(env.message.contains("req-5"));

        let env = ErrorNormalizer::normalize(
            Failure::Panicked {
                detail: "index out of bounds".into(),
            },
            "req-6",
        );
        assert_eq!(env.kind, ErrorKind::InternalError);
        assert!(!env.message.contains("index"));
    }

    #[test]
    fn deadline_is_retryable_internal() {
        let env = ErrorNormalizer::normalize(
            Failure::DeadlineExceeded {
                deadline: Duration::from_secs(30),
            },
            "req-7",
        );
        assert_eq!(env.kind, ErrorKind::InternalError);
        assert!(env.retryable);
        assert_eq!(env.code(), Some(codes::DEADLINE_EXCEEDED));
    }

    #[test]
    fn provider_messages_are_sanitized() {
        let env = ErrorNormalizer::normalize(
            ToolError::provider("sim", ProviderError::rejected("bad api_key=sk-live-123456789"))
                .into(),
            "req-8",
        );
        assert!(!env.message.contains("123456789"));
    }
}
