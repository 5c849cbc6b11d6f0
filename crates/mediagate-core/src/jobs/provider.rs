//! The provider boundary.
//!
//! A capability module sees its provider only through [`ProviderClient`]:
//! submit an operation, check the status of a job. Authentication, request
//! signing and provider-side retries live behind this trait.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation submitted to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Provider operation name, e.g. `image.generate`
    pub operation: String,
    pub payload: Value,
}

impl JobRequest {
    pub fn new(operation: impl Into<String>, payload: Value) -> Self {
        Self {
            operation: operation.into(),
            payload,
        }
    }
}

/// Status reported by a provider for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Accepted, not started
    Pending,
    Running { progress: Option<f64> },
    Succeeded { output: Value },
    Failed { message: String, retryable: bool },
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name used in logs and error messages
    fn name(&self) -> &str;

    /// Submit an operation and return the provider-assigned job id
    async fn submit(&self, request: &JobRequest) -> Result<String, ProviderError>;

    async fn check_status(&self, job_id: &str) -> Result<ProviderStatus, ProviderError>;
}
