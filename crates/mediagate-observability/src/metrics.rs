//! Invocation Metrics
//!
//! Prometheus counters and histograms for the dispatcher and the job poller.
//! Label cardinality is bounded: tool names come from the immutable registry
//! and outcome/state labels are closed enums.

use crate::{LATENCY_BUCKETS, ObservabilityError};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics instance, created on first use
static GATEWAY_METRICS: OnceLock<Option<GatewayMetrics>> = OnceLock::new();

/// Metrics namespace prefix
pub const NAMESPACE: &str = "mediagate";

/// Outcome label of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Success,
    ValidationError,
    DomainError,
    ProtocolError,
    InternalError,
}

impl InvocationOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            InvocationOutcome::Success => "success",
            InvocationOutcome::ValidationError => "validation_error",
            InvocationOutcome::DomainError => "domain_error",
            InvocationOutcome::ProtocolError => "protocol_error",
            InvocationOutcome::InternalError => "internal_error",
        }
    }
}

/// Gateway metric families registered in a private registry
#[derive(Debug)]
pub struct GatewayMetrics {
    registry: Registry,
    invocations_total: IntCounterVec,          // cardinality: tools x 5
    invocation_duration_seconds: HistogramVec, // cardinality: tools
    job_polls_total: IntCounterVec,            // cardinality: 6
}

impl GatewayMetrics {
    /// Create and register all metric families
    pub fn new() -> Result<Self, ObservabilityError> {
        let registry = Registry::new();

        let invocations_total = IntCounterVec::new(
            Opts::new(
                format!("{NAMESPACE}_invocations_total"),
                "Total tool invocations by tool and outcome",
            ),
            &["tool", "outcome"],
        )
        .map_err(metrics_error)?;

        let invocation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                format!("{NAMESPACE}_invocation_duration_seconds"),
                "Tool invocation duration in seconds by tool",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["tool"],
        )
        .map_err(metrics_error)?;

        let job_polls_total = IntCounterVec::new(
            Opts::new(
                format!("{NAMESPACE}_job_polls_total"),
                "Total provider status checks by resulting job state",
            ),
            &["state"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(invocations_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(invocation_duration_seconds.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(job_polls_total.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            invocations_total,
            invocation_duration_seconds,
            job_polls_total,
        })
    }

    /// Record a finished invocation
    pub fn record_invocation(&self, tool: &str, outcome: InvocationOutcome, elapsed: Duration) {
        self.invocations_total
            .with_label_values(&[tool, outcome.as_str()])
            .inc();
        self.invocation_duration_seconds
            .with_label_values(&[tool])
            .observe(elapsed.as_secs_f64());
    }

    /// Record one provider status check
    pub fn record_job_poll(&self, state: &str) {
        self.job_polls_total.with_label_values(&[state]).inc();
    }

    /// Current count for a tool/outcome pair
    pub fn invocation_count(&self, tool: &str, outcome: InvocationOutcome) -> u64 {
        self.invocations_total
            .with_label_values(&[tool, outcome.as_str()])
            .get()
    }

    /// Render every family in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, ObservabilityError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| ObservabilityError::Metrics(e.to_string()))
    }
}

fn metrics_error(error: prometheus::Error) -> ObservabilityError {
    ObservabilityError::Metrics(error.to_string())
}

/// Global metrics, or `None` if registration failed at first use.
///
/// Registration failure is logged once and turns every recording call into a
/// no-op; metrics never take the gateway down.
pub fn gateway_metrics() -> Option<&'static GatewayMetrics> {
    GATEWAY_METRICS
        .get_or_init(|| match GatewayMetrics::new() {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "Failed to register gateway metrics");
                #[cfg(not(feature = "tracing"))]
                let _ = e;
                None
            }
        })
        .as_ref()
}

/// Record an invocation on the global metrics, if available
pub fn record_invocation(tool: &str, outcome: InvocationOutcome, elapsed: Duration) {
    if let Some(metrics) = gateway_metrics() {
        metrics.record_invocation(tool, outcome, elapsed);
    }
}

/// Record a job poll on the global metrics, if available
pub fn record_job_poll(state: &str) {
    if let Some(metrics) = gateway_metrics() {
        metrics.record_job_poll(state);
    }
}

/// Render the global metrics
pub fn render() -> Result<String, ObservabilityError> {
    gateway_metrics()
        .ok_or_else(|| ObservabilityError::Metrics("metrics registry unavailable".to_string()))?
        .render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_invocations_per_tool_and_outcome() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_invocation(
            "img_generate",
            InvocationOutcome::Success,
            Duration::from_millis(40),
        );
        metrics.record_invocation(
            "img_generate",
            InvocationOutcome::Success,
            Duration::from_millis(60),
        );
        metrics.record_invocation(
            "img_generate",
            InvocationOutcome::ValidationError,
            Duration::from_millis(1),
        );

        assert_eq!(
            metrics.invocation_count("img_generate", InvocationOutcome::Success),
            2
        );
        assert_eq!(
            metrics.invocation_count("img_generate", InvocationOutcome::ValidationError),
            1
        );
    }

    #[test]
    fn renders_text_exposition() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_job_poll("RUNNING");
        metrics.record_invocation("vid_generate", InvocationOutcome::DomainError, Duration::ZERO);

        let text = metrics.render().unwrap();
        assert!(text.contains("mediagate_job_polls_total"));
        assert!(text.contains("mediagate_invocations_total"));
        assert!(text.contains("outcome=\"domain_error\""));
    }

    #[test]
    fn global_metrics_are_available() {
        record_invocation("render_check_tool", InvocationOutcome::Success, Duration::ZERO);
        assert!(render().unwrap().contains("render_check_tool"));
    }
}
