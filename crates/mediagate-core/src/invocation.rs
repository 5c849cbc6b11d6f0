//! Invocation envelopes shared by every transport binding.

use crate::error::ErrorEnvelope;
use crate::jobs::JobHandle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Which binding carried a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process call (CLI `invoke`, tests, benchmarks)
    #[default]
    Local,
    Stdio,
    Http,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Local => "local",
            TransportKind::Stdio => "stdio",
            TransportKind::Http => "http",
        }
    }
}

/// Transport-origin metadata attached to a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Caller-supplied id, echoed back. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Caller deadline; can only shorten the configured deadline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// Free-form caller identification, logged only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Set by the binding, never by the caller
    #[serde(skip)]
    pub transport: TransportKind,
}

/// One request to execute a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub meta: RequestMeta,
}

impl InvocationRequest {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            meta: RequestMeta::default(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.meta.request_id = Some(request_id.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.meta.deadline_ms = Some(deadline.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    pub fn via(mut self, transport: TransportKind) -> Self {
        self.meta.transport = transport;
        self
    }
}

/// Typed output block of a successful invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        url: String,
        mime_type: String,
    },
    Video {
        url: String,
        mime_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_seconds: Option<f64>,
    },
    Json {
        value: Value,
    },
    /// Handle of a provider-side job, for fire-and-forget operations
    Job {
        job: Box<JobHandle>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentBlock::Image {
            url: url.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn video(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ContentBlock::Video {
            url: url.into(),
            mime_type: mime_type.into(),
            duration_seconds: None,
        }
    }

    pub fn json(value: Value) -> Self {
        ContentBlock::Json { value }
    }

    pub fn job(handle: JobHandle) -> Self {
        ContentBlock::Job {
            job: Box::new(handle),
        }
    }

    /// The job handle, if this is a job block
    pub fn as_job(&self) -> Option<&JobHandle> {
        match self {
            ContentBlock::Job { job } => Some(job),
            _ => None,
        }
    }
}

/// Uniform result envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationResult {
    Success {
        request_id: String,
        content: Vec<ContentBlock>,
    },
    Error {
        request_id: String,
        error: ErrorEnvelope,
    },
}

impl InvocationResult {
    pub fn request_id(&self) -> &str {
        match self {
            InvocationResult::Success { request_id, .. }
            | InvocationResult::Error { request_id, .. } => request_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success { .. })
    }

    pub fn content(&self) -> Option<&[ContentBlock]> {
        match self {
            InvocationResult::Success { content, .. } => Some(content),
            InvocationResult::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorEnvelope> {
        match self {
            InvocationResult::Error { error, .. } => Some(error),
            InvocationResult::Success { .. } => None,
        }
    }
}

/// Per-invocation context handed to tool handlers
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: String,
    pub transport: TransportKind,
    deadline: Instant,
    cancel: CancellationToken,
}

impl InvocationContext {
    pub fn new(
        request_id: impl Into<String>,
        transport: TransportKind,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            transport,
            deadline,
            cancel,
        }
    }

    /// Time left before the invocation deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Fires when the caller goes away or the deadline passes
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
