use super::{JobHandle, JobRequest, JobState, PollPolicy, ProviderClient, ProviderStatus};
use crate::error::{ProviderError, ToolError};
use chrono::Utc;
use mediagate_observability::metrics;
use std::sync::Arc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives [`JobHandle`]s through their lifecycle against one provider.
///
/// The poller holds no job state of its own. Everything it knows about a job
/// is in the handle, so fire-and-forget callers can rebuild a handle from a
/// job id with [`JobPoller::resume`] and keep polling.
#[derive(Clone)]
pub struct JobPoller {
    provider: Arc<dyn ProviderClient>,
}

impl JobPoller {
    pub fn new(provider: Arc<dyn ProviderClient>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Submit an operation. The returned handle is in `SUBMITTED`.
    pub async fn submit(
        &self,
        request: JobRequest,
        policy: PollPolicy,
    ) -> Result<JobHandle, ToolError> {
        let job_id = self
            .provider
            .submit(&request)
            .await
            .map_err(|e| self.provider_error(e))?;

        info!(
            provider = self.provider.name(),
            job_id = %job_id,
            operation = %request.operation,
            "Submitted provider job"
        );

        Ok(JobHandle::new(
            job_id,
            self.provider.name(),
            request.operation,
            policy,
        ))
    }

    /// Rebuild a handle for a job submitted earlier, possibly by another
    /// invocation. The handle starts in `SUBMITTED`; the next poll brings it
    /// up to date.
    pub fn resume(
        &self,
        job_id: impl Into<String>,
        operation: impl Into<String>,
        policy: PollPolicy,
    ) -> JobHandle {
        JobHandle::new(job_id, self.provider.name(), operation, policy)
    }

    /// Check the provider once and return the refreshed handle.
    ///
    /// A terminal handle is returned as is, without calling the provider.
    pub async fn poll(&self, mut handle: JobHandle) -> Result<JobHandle, ToolError> {
        if handle.is_terminal() {
            return Ok(handle);
        }
        let status = self.check(&mut handle).await.map_err(|e| self.provider_error(e))?;
        self.apply(&mut handle, status);
        Ok(handle)
    }

    /// Poll until the job is terminal, `policy.max_wait` elapses or `cancel`
    /// fires.
    ///
    /// The wait budget starts now, not at submission. Transient provider
    /// errors are logged and retried on the next tick; a non-retryable one
    /// fails the job. Sleeps are clipped to the remaining budget, so a
    /// `TIMED_OUT` handle comes back no later than one interval past the
    /// deadline. Cancellation returns [`ToolError::Cancelled`] at once and
    /// leaves the provider-side job running.
    pub async fn wait_until_terminal(
        &self,
        mut handle: JobHandle,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<JobHandle, ToolError> {
        handle.poll_interval = policy.interval;
        handle.max_wait = policy.max_wait;
        handle.deadline = chrono::Duration::from_std(policy.max_wait)
            .ok()
            .and_then(|budget| Utc::now().checked_add_signed(budget));

        let deadline = Instant::now() + policy.max_wait;

        loop {
            if handle.is_terminal() {
                return Ok(handle);
            }

            let checked = tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(&handle)),
                checked = self.check(&mut handle) => checked,
            };

            match checked {
                Ok(status) => self.apply(&mut handle, status),
                Err(e) if e.retryable => {
                    warn!(
                        provider = self.provider.name(),
                        job_id = %handle.job_id,
                        error = %e,
                        "Transient status check failure, will retry"
                    );
                }
                Err(e) => {
                    warn!(
                        provider = self.provider.name(),
                        job_id = %handle.job_id,
                        error = %e,
                        "Status check rejected, failing job"
                    );
                    handle.fail(e.message, false);
                    metrics::record_job_poll(JobState::Failed.as_str());
                }
            }

            if handle.is_terminal() {
                return Ok(handle);
            }

            let now = Instant::now();
            if now >= deadline {
                handle.time_out();
                metrics::record_job_poll(JobState::TimedOut.as_str());
                info!(
                    provider = self.provider.name(),
                    job_id = %handle.job_id,
                    polls = handle.polls,
                    max_wait_ms = policy.max_wait.as_millis() as u64,
                    "Provider job timed out"
                );
                return Ok(handle);
            }

            let pause = policy.interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(&handle)),
                _ = sleep(pause) => {}
            }
        }
    }

    async fn check(&self, handle: &mut JobHandle) -> Result<ProviderStatus, ProviderError> {
        handle.polls = handle.polls.saturating_add(1);
        self.provider.check_status(&handle.job_id).await
    }

    fn apply(&self, handle: &mut JobHandle, status: ProviderStatus) {
        let before = handle.state();
        match status {
            ProviderStatus::Pending => {}
            ProviderStatus::Running { progress } => {
                handle.transition(JobState::Running);
                if progress.is_some() {
                    handle.progress = progress.map(|p| p.clamp(0.0, 1.0));
                }
            }
            ProviderStatus::Succeeded { output } => handle.succeed(output),
            ProviderStatus::Failed { message, retryable } => handle.fail(message, retryable),
        }

        let after = handle.state();
        metrics::record_job_poll(after.as_str());
        if before != after {
            debug!(
                provider = self.provider.name(),
                job_id = %handle.job_id,
                from = %before,
                to = %after,
                "Job state changed"
            );
        }
    }

    fn provider_error(&self, source: ProviderError) -> ToolError {
        ToolError::provider(self.provider.name(), source)
    }

    fn cancelled(&self, handle: &JobHandle) -> ToolError {
        info!(
            provider = self.provider.name(),
            job_id = %handle.job_id,
            state = %handle.state(),
            "Stopped polling, caller went away"
        );
        ToolError::Cancelled
    }
}
