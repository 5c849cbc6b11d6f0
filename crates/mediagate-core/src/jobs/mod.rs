//! Asynchronous provider jobs
//!
//! One generic state machine covers every submit-now/finish-later operation.
//! A [`JobHandle`] only ever moves forward:
//!
//! ```text
//! SUBMITTED -> RUNNING -> SUCCEEDED | FAILED | TIMED_OUT
//! ```
//!
//! States may be skipped (a fast job can go straight from SUBMITTED to
//! SUCCEEDED) but never revisited, and nothing leaves a terminal state.

mod poller;
mod provider;

pub use poller::JobPoller;
pub use provider::{JobRequest, ProviderClient, ProviderStatus};

use crate::error::ToolError;
use crate::sanitization::SanitizeMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Lifecycle state of a provider job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Submitted,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut
        )
    }

    fn rank(&self) -> u8 {
        match self {
            JobState::Submitted => 0,
            JobState::Running => 1,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut => 2,
        }
    }

    /// Whether `next` is a legal forward move from this state
    pub fn can_transition_to(&self, next: JobState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "SUBMITTED",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
            JobState::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure detail of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub message: String,
    pub retryable: bool,
}

/// Operation classes with their own poll interval and max wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationClass {
    Image,
    Video,
}

impl OperationClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationClass::Image => "image",
            OperationClass::Video => "video",
        }
    }
}

/// How often to poll and for how long
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    #[serde(with = "crate::duration::human")]
    pub interval: Duration,
    #[serde(with = "crate::duration::human")]
    pub max_wait: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    /// Same interval, max wait capped at `cap`
    pub fn capped(self, cap: Duration) -> Self {
        Self {
            max_wait: self.max_wait.min(cap),
            ..self
        }
    }

    /// Defaults per operation class
    pub fn default_for(class: OperationClass) -> Self {
        match class {
            OperationClass::Image => Self::new(Duration::from_secs(2), Duration::from_secs(90)),
            OperationClass::Video => Self::new(Duration::from_secs(10), Duration::from_secs(600)),
        }
    }
}

/// Observable state of one provider job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub provider: String,
    pub operation: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(rename = "poll_interval_ms", with = "crate::duration::millis")]
    pub poll_interval: Duration,
    #[serde(rename = "max_wait_ms", with = "crate::duration::millis")]
    pub max_wait: Duration,
    /// Wall-clock end of the current wait, set when bounded waiting starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    state: JobState,
    /// Last observed progress in `0.0..=1.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Provider status checks made through this handle
    #[serde(default)]
    pub polls: u32,
}

impl JobHandle {
    pub(crate) fn new(
        job_id: impl Into<String>,
        provider: impl Into<String>,
        operation: impl Into<String>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            provider: provider.into(),
            operation: operation.into(),
            submitted_at: Utc::now(),
            poll_interval: policy.interval,
            max_wait: policy.max_wait,
            deadline: None,
            state: JobState::Submitted,
            progress: None,
            result: None,
            error: None,
            polls: 0,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move forward to `next`. Returns `false`, leaving the handle untouched,
    /// when the move would go backwards or leave a terminal state.
    pub(crate) fn transition(&mut self, next: JobState) -> bool {
        if next == self.state {
            return true;
        }
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }

    pub(crate) fn succeed(&mut self, output: Value) {
        if self.transition(JobState::Succeeded) {
            self.progress = Some(1.0);
            self.result = Some(output);
        }
    }

    /// The provider's message is sanitized here since a failed handle is
    /// returned as-is by status checks.
    pub(crate) fn fail(&mut self, message: impl AsRef<str>, retryable: bool) {
        if self.transition(JobState::Failed) {
            self.error = Some(JobError {
                message: message.as_ref().sanitize_message(),
                retryable,
            });
        }
    }

    pub(crate) fn time_out(&mut self) {
        self.transition(JobState::TimedOut);
    }

    /// Turn a failed or timed-out handle into the matching [`ToolError`].
    ///
    /// Succeeded and still-pending handles are returned unchanged.
    pub fn into_result(self) -> Result<JobHandle, ToolError> {
        match self.state {
            JobState::Failed => {
                let error = self.error.unwrap_or_else(|| JobError {
                    message: "job failed".to_string(),
                    retryable: false,
                });
                Err(ToolError::JobFailed {
                    job_id: self.job_id,
                    message: error.message,
                    retryable: error.retryable,
                })
            }
            JobState::TimedOut => Err(ToolError::JobTimedOut {
                job_id: self.job_id,
                waited: self.max_wait,
            }),
            JobState::Submitted | JobState::Running | JobState::Succeeded => Ok(self),
        }
    }
}
