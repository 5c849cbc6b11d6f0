//! # Mock Providers
//!
//! Provider clients with predictable behaviour, for exercising the poller,
//! the modules and the transports without a real upstream.

use async_trait::async_trait;
use mediagate_core::{JobRequest, ProviderClient, ProviderError, ProviderStatus};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One scripted answer to a status check
pub type ScriptStep = Result<ProviderStatus, ProviderError>;

#[derive(Debug, Default)]
struct ScriptState {
    next_job: u64,
    jobs: HashMap<String, VecDeque<ScriptStep>>,
    submissions: Vec<JobRequest>,
    status_checks: Vec<String>,
}

/// A provider that replays status scripts.
///
/// Every submitted job gets its own copy of the default script. The last
/// step of a script repeats forever, so `[Pending, Succeeded]` answers
/// `Pending` once and `Succeeded` from then on.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    name: String,
    script: Vec<ScriptStep>,
    submit_error: Option<ProviderError>,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedProvider {
    /// A provider whose jobs stay pending until given a script
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: vec![Ok(ProviderStatus::Pending)],
            submit_error: None,
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    /// Jobs report `RUNNING` for `checks - 1` status checks, then succeed
    /// with `output`
    pub fn succeeding_after(name: impl Into<String>, checks: usize, output: Value) -> Self {
        let mut script: Vec<ScriptStep> = (1..checks.max(1))
            .map(|i| {
                Ok(ProviderStatus::Running {
                    progress: Some(i as f64 / checks as f64),
                })
            })
            .collect();
        script.push(Ok(ProviderStatus::Succeeded { output }));
        Self::new(name).with_script(script)
    }

    /// Replace the default script used for newly submitted jobs
    pub fn with_script(mut self, script: Vec<ScriptStep>) -> Self {
        if !script.is_empty() {
            self.script = script;
        }
        self
    }

    /// Make every submission fail with `error`
    pub fn with_submit_error(mut self, error: ProviderError) -> Self {
        self.submit_error = Some(error);
        self
    }

    /// Preload a job, as if it had been submitted by an earlier process
    pub fn with_job(self, job_id: impl Into<String>, script: Vec<ScriptStep>) -> Self {
        self.lock().jobs.insert(job_id.into(), script.into());
        self
    }

    /// Every request passed to `submit`, in order
    pub fn submissions(&self) -> Vec<JobRequest> {
        self.lock().submissions.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.lock().submissions.len()
    }

    /// Job ids passed to `check_status`, in order
    pub fn status_checks(&self) -> Vec<String> {
        self.lock().status_checks.clone()
    }

    pub fn check_count(&self) -> usize {
        self.lock().status_checks.len()
    }

    /// Number of status checks made for one job
    pub fn checks_for(&self, job_id: &str) -> usize {
        self.lock()
            .status_checks
            .iter()
            .filter(|id| id.as_str() == job_id)
            .count()
    }

    /// Clear call history; scripts and jobs are kept
    pub fn reset(&self) {
        let mut state = self.lock();
        state.submissions.clear();
        state.status_checks.clear();
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, request: &JobRequest) -> Result<String, ProviderError> {
        let mut state = self.lock();
        state.submissions.push(request.clone());
        if let Some(error) = &self.submit_error {
            return Err(error.clone());
        }

        state.next_job += 1;
        let job_id = format!("{}-job-{}", self.name, state.next_job);
        state
            .jobs
            .insert(job_id.clone(), self.script.iter().cloned().collect());
        Ok(job_id)
    }

    async fn check_status(&self, job_id: &str) -> Result<ProviderStatus, ProviderError> {
        let mut state = self.lock();
        state.status_checks.push(job_id.to_string());

        let Some(script) = state.jobs.get_mut(job_id) else {
            return Err(ProviderError::rejected(format!("unknown job `{job_id}`")).with_status(404));
        };
        match script.len() {
            0 => Ok(ProviderStatus::Pending),
            1 => script
                .front()
                .cloned()
                .unwrap_or(Ok(ProviderStatus::Pending)),
            _ => script.pop_front().unwrap_or(Ok(ProviderStatus::Pending)),
        }
    }
}

/// A provider that rejects everything with one error
#[derive(Debug, Clone)]
pub struct FailingProvider {
    error: ProviderError,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }

    /// Fails with a retryable error, like an upstream outage
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ProviderError::transient(message).with_status(503))
    }

    /// Fails with a permanent error, like a policy rejection
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ProviderError::rejected(message).with_status(400))
    }
}

#[async_trait]
impl ProviderClient for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn submit(&self, _request: &JobRequest) -> Result<String, ProviderError> {
        Err(self.error.clone())
    }

    async fn check_status(&self, _job_id: &str) -> Result<ProviderStatus, ProviderError> {
        Err(self.error.clone())
    }
}

/// Output with one image, in the shape the image tools decode
pub fn image_output(url: &str) -> Value {
    json!({"images": [{"url": url, "mime_type": "image/png"}]})
}

/// Output with one video, in the shape the video tools decode
pub fn video_output(url: &str, duration_seconds: f64) -> Value {
    json!({"videos": [{"url": url, "mime_type": "video/mp4", "duration_seconds": duration_seconds}]})
}
