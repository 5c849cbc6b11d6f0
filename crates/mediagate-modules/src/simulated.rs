//! In-process provider for local runs and demos.
//!
//! Jobs become `RUNNING` on their first status check and succeed after a
//! fixed number of checks with placeholder media URLs. No network access,
//! no randomness: the same sequence of calls always yields the same answers.
//!
//! Memory stays bounded for long-running gateways. Only the most recently
//! finished jobs are kept, and once the table is full the oldest job is
//! dropped to make room for a new submission. A dropped job reports as
//! unknown.

use crate::operations;
use async_trait::async_trait;
use mediagate_core::{JobRequest, ProviderClient, ProviderError, ProviderStatus};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Status checks a simulated job needs before it succeeds
pub const DEFAULT_CHECKS_TO_COMPLETE: u32 = 3;

/// Finished jobs that keep answering status checks
pub const DEFAULT_RETAINED_FINISHED: usize = 256;

/// Jobs tracked at once, finished or not
pub const DEFAULT_CAPACITY: usize = 4096;

const MEDIA_BASE_URL: &str = "https://media.mediagate.invalid";

#[derive(Debug)]
struct SimulatedJob {
    request: JobRequest,
    checks: u32,
    seq: u64,
    finished: bool,
}

#[derive(Debug, Default)]
struct JobTable {
    jobs: HashMap<String, SimulatedJob>,
    /// Finished job ids, oldest first
    finished: VecDeque<String>,
    next_seq: u64,
}

impl JobTable {
    fn insert(&mut self, job_id: String, request: JobRequest, capacity: usize) {
        while self.jobs.len() >= capacity {
            let Some(oldest) = self
                .jobs
                .iter()
                .min_by_key(|(_, job)| job.seq)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            self.jobs.remove(&oldest);
            debug!(job_id = %oldest, "Simulated job evicted, table full");
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.jobs.insert(
            job_id,
            SimulatedJob {
                request,
                checks: 0,
                seq,
                finished: false,
            },
        );
    }

    fn mark_finished(&mut self, job_id: &str, retain: usize) {
        self.finished.push_back(job_id.to_string());
        while self.finished.len() > retain {
            if let Some(expired) = self.finished.pop_front() {
                self.jobs.remove(&expired);
            }
        }
    }
}

#[derive(Debug)]
pub struct SimulatedProvider {
    checks_to_complete: u32,
    retained_finished: usize,
    capacity: usize,
    table: Mutex<JobTable>,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        Self::with_checks_to_complete(DEFAULT_CHECKS_TO_COMPLETE)
    }

    /// Jobs succeed on status check number `checks` (at least one)
    pub fn with_checks_to_complete(checks: u32) -> Self {
        Self {
            checks_to_complete: checks.max(1),
            retained_finished: DEFAULT_RETAINED_FINISHED,
            capacity: DEFAULT_CAPACITY,
            table: Mutex::new(JobTable::default()),
        }
    }

    /// Keep at most `retained_finished` finished jobs and `capacity` jobs
    /// overall. Both are at least one.
    pub fn with_limits(mut self, retained_finished: usize, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self.retained_finished = retained_finished.clamp(1, self.capacity);
        self
    }

    pub fn job_count(&self) -> usize {
        self.table.lock().map(|table| table.jobs.len()).unwrap_or(0)
    }

    fn output_for(job_id: &str, request: &JobRequest) -> Result<Value, ProviderError> {
        let payload = &request.payload;
        match request.operation.as_str() {
            operations::IMAGE_GENERATE => {
                let count = payload.get("count").and_then(Value::as_u64).unwrap_or(1);
                let images: Vec<Value> = (0..count)
                    .map(|i| {
                        json!({
                            "url": format!("{MEDIA_BASE_URL}/images/{job_id}/{i}.png"),
                            "mime_type": "image/png",
                        })
                    })
                    .collect();
                Ok(json!({ "images": images }))
            }
            operations::IMAGE_EDIT => Ok(json!({
                "images": [{
                    "url": format!("{MEDIA_BASE_URL}/images/{job_id}/edited.png"),
                    "mime_type": "image/png",
                }]
            })),
            operations::IMAGE_TAG => {
                let max = payload.get("max_tags").and_then(Value::as_u64).unwrap_or(10);
                let tags: Vec<Value> = [("subject", 0.94), ("scene", 0.81), ("lighting", 0.62)]
                    .into_iter()
                    .take(usize::try_from(max).unwrap_or(usize::MAX))
                    .map(|(label, confidence)| json!({"label": label, "confidence": confidence}))
                    .collect();
                Ok(json!({ "tags": tags }))
            }
            operations::VIDEO_GENERATE => {
                let duration = payload
                    .get("duration_seconds")
                    .and_then(Value::as_f64)
                    .unwrap_or(5.0);
                Ok(json!({
                    "videos": [{
                        "url": format!("{MEDIA_BASE_URL}/videos/{job_id}.mp4"),
                        "mime_type": "video/mp4",
                        "duration_seconds": duration,
                    }]
                }))
            }
            other => Err(ProviderError::rejected(format!(
                "unsupported operation `{other}`"
            ))),
        }
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn submit(&self, request: &JobRequest) -> Result<String, ProviderError> {
        // unknown operations fail at submission, not on the first check
        Self::output_for("preflight", request)?;

        let job_id = format!("sim-{}", Uuid::new_v4());
        let mut table = self
            .table
            .lock()
            .map_err(|_| ProviderError::transient("simulator state unavailable"))?;
        table.insert(job_id.clone(), request.clone(), self.capacity);
        debug!(job_id = %job_id, operation = %request.operation, "Simulated job accepted");
        Ok(job_id)
    }

    async fn check_status(&self, job_id: &str) -> Result<ProviderStatus, ProviderError> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| ProviderError::transient("simulator state unavailable"))?;
        let job = table.jobs.get_mut(job_id).ok_or_else(|| {
            ProviderError::rejected(format!("unknown job `{job_id}`")).with_status(404)
        })?;

        job.checks = job.checks.saturating_add(1);
        if job.checks < self.checks_to_complete {
            return Ok(ProviderStatus::Running {
                progress: Some(f64::from(job.checks) / f64::from(self.checks_to_complete)),
            });
        }

        let output = Self::output_for(job_id, &job.request)?;
        if !job.finished {
            job.finished = true;
            table.mark_finished(job_id, self.retained_finished);
        }
        Ok(ProviderStatus::Succeeded { output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn job_runs_then_succeeds() {
        let provider = SimulatedProvider::with_checks_to_complete(2);
        let job_id = provider
            .submit(&JobRequest::new(operations::VIDEO_GENERATE, json!({"duration_seconds": 8})))
            .await
            .unwrap();
        assert!(job_id.starts_with("sim-"));

        assert_eq!(
            provider.check_status(&job_id).await.unwrap(),
            ProviderStatus::Running {
                progress: Some(0.5)
            }
        );
        let ProviderStatus::Succeeded { output } = provider.check_status(&job_id).await.unwrap()
        else {
            panic!("expected success");
        };
        assert_eq!(output["videos"][0]["duration_seconds"], 8.0);
    }

    #[tokio::test]
    async fn image_count_and_tag_limit_are_honoured() {
        let provider = SimulatedProvider::with_checks_to_complete(1);

        let id = provider
            .submit(&JobRequest::new(operations::IMAGE_GENERATE, json!({"count": 3})))
            .await
            .unwrap();
        let ProviderStatus::Succeeded { output } = provider.check_status(&id).await.unwrap() else {
            panic!("expected success");
        };
        assert_eq!(output["images"].as_array().unwrap().len(), 3);

        let id = provider
            .submit(&JobRequest::new(operations::IMAGE_TAG, json!({"max_tags": 2})))
            .await
            .unwrap();
        let ProviderStatus::Succeeded { output } = provider.check_status(&id).await.unwrap() else {
            panic!("expected success");
        };
        assert_eq!(output["tags"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn finished_jobs_are_evicted_beyond_retention() {
        let provider = SimulatedProvider::with_checks_to_complete(1).with_limits(16, 64);
        let mut ids = Vec::new();
        for _ in 0..1000 {
            let id = provider
                .submit(&JobRequest::new(operations::IMAGE_EDIT, json!({})))
                .await
                .unwrap();
            assert!(matches!(
                provider.check_status(&id).await.unwrap(),
                ProviderStatus::Succeeded { .. }
            ));
            ids.push(id);
        }
        assert_eq!(provider.job_count(), 16);

        // recent jobs still answer, repeatedly
        let latest = ids.last().unwrap();
        for _ in 0..3 {
            assert!(matches!(
                provider.check_status(latest).await.unwrap(),
                ProviderStatus::Succeeded { .. }
            ));
        }
        assert_eq!(provider.job_count(), 16);

        let err = provider.check_status(&ids[0]).await.unwrap_err();
        assert_eq!(err.status, Some(404));
    }

    #[tokio::test]
    async fn unpolled_jobs_are_bounded_by_capacity() {
        let provider = SimulatedProvider::new().with_limits(4, 8);
        let mut ids = Vec::new();
        for _ in 0..20 {
            ids.push(
                provider
                    .submit(&JobRequest::new(operations::VIDEO_GENERATE, json!({})))
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(provider.job_count(), 8);

        // the oldest submissions went first
        assert!(provider.check_status(&ids[11]).await.is_err());
        assert!(provider.check_status(&ids[12]).await.is_ok());
        assert!(provider.check_status(&ids[19]).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_job_and_operation_are_rejected() {
        let provider = SimulatedProvider::new();

        let err = provider.check_status("sim-missing").await.unwrap_err();
        assert!(!err.retryable);
        assert_eq!(err.status, Some(404));

        let err = provider
            .submit(&JobRequest::new("audio.generate", json!({})))
            .await
            .unwrap_err();
        assert!(err.message.contains("audio.generate"));
        assert_eq!(provider.job_count(), 0);
    }
}
