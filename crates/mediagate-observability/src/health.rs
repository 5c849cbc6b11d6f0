//! Health Report
//!
//! Liveness summary returned by `GET /health` and the stdio `health` method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;

static PROCESS_START: OnceLock<(Instant, DateTime<Utc>)> = OnceLock::new();

/// Record the process start time. Later calls are no-ops.
pub fn mark_started() {
    PROCESS_START.get_or_init(|| (Instant::now(), Utc::now()));
}

fn process_start() -> (Instant, DateTime<Utc>) {
    *PROCESS_START.get_or_init(|| (Instant::now(), Utc::now()))
}

/// Overall gateway status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// At least one tool is registered and the dispatcher is serving
    Healthy,
    /// Serving, but every module is disabled
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
        }
    }

    /// HTTP status code equivalent
    pub fn as_http_status(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Degraded => 503,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub modules: usize,
    pub tools: usize,
}

impl HealthReport {
    /// Build a report for the given registry size
    pub fn new(version: impl Into<String>, modules: usize, tools: usize) -> Self {
        let (started, started_at) = process_start();
        let status = if tools == 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            status,
            version: version.into(),
            started_at,
            uptime_seconds: started.elapsed().as_secs(),
            modules,
            tools,
        }
    }
}
