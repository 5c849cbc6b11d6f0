use mediagate_core::{ConfigError, RegistryError};
use mediagate_observability::ObservabilityError;
use mediagate_transport::TransportError;
use thiserror::Error;

/// Exit code for configuration and usage problems
pub const EXIT_MISCONFIGURED: u8 = 2;
/// Exit code for runtime failures, including a failed invocation
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("module registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to initialise logging: {0}")]
    Observability(#[from] ObservabilityError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("arguments are not valid JSON: {0}")]
    InvalidArguments(#[source] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("invocation of `{tool}` failed")]
    InvocationFailed { tool: String },
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(_) | CliError::Registry(_) | CliError::InvalidArguments(_) => {
                EXIT_MISCONFIGURED
            }
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misconfiguration_exits_with_two() {
        let err = CliError::from(ConfigError::ValidationError("bad".into()));
        assert_eq!(err.exit_code(), EXIT_MISCONFIGURED);

        let err = CliError::InvocationFailed {
            tool: "img_generate".into(),
        };
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }
}
