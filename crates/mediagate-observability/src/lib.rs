//! Mediagate Observability
//!
//! Structured logging setup, Prometheus invocation metrics and the health
//! report served by every transport binding.

#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "tracing")]
pub mod trace;

pub mod health;

#[cfg(feature = "metrics")]
pub use metrics::{GatewayMetrics, InvocationOutcome};

#[cfg(feature = "tracing")]
pub use trace::init_tracing;

pub use health::{HealthReport, HealthStatus};

use serde::{Deserialize, Serialize};

/// Latency buckets for invocation histograms, in seconds.
///
/// Skewed towards the long tail: video-class jobs that block on the poller
/// routinely take minutes.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.01, // 10ms
    0.05, // 50ms
    0.1,  // 100ms
    0.5,  // 500ms
    1.0,  // 1s
    5.0,  // 5s
    15.0, // 15s
    60.0, // 1m
    180.0, // 3m
    600.0, // 10m
];

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line (default, machine readable)
    #[default]
    Json,
    /// Human-readable multi-field lines for local development
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ObservabilityError::Config(format!(
                "unknown log format `{other}` (expected `json` or `pretty`)"
            ))),
        }
    }
}

/// Logging configuration consumed by [`trace::init_tracing`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Subscriber output format
    pub format: LogFormat,
    /// Fallback filter directive used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "info".to_string(),
        }
    }
}

/// Observability framework errors
#[derive(thiserror::Error, Debug)]
pub enum ObservabilityError {
    #[error("Tracing initialization failed: {0}")]
    TracingInit(String),

    #[error("Metrics error: {0}")]
    Metrics(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
