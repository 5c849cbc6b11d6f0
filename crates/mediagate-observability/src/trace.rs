//! Structured Tracing Setup
//!
//! Installs the process-wide `tracing` subscriber. Output always goes to
//! stderr: the stdio transport owns stdout for its framed protocol.

use crate::{LogFormat, LoggingConfig, ObservabilityError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over [`LoggingConfig::filter`]. Calling this
/// twice returns [`ObservabilityError::TracingInit`] instead of panicking.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ObservabilityError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            ObservabilityError::Config(format!("invalid log filter `{}`: {e}", config.filter))
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| ObservabilityError::TracingInit(e.to_string()))?;

    tracing::debug!(
        format = ?config.format,
        filter = %config.filter,
        "Initialized structured tracing"
    );

    Ok(())
}
