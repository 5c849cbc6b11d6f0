//! Configuration layering and dispatcher construction

use clap::Args;
use mediagate_core::{
    ConfigError, Dispatcher, GatewayConfig, ProviderClient, RegistryError, TransportSelection,
};
use mediagate_modules::SimulatedProvider;
use mediagate_observability::LogFormat;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Flags shared by every subcommand; they override file and environment
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Transport binding (stdio, http)
    #[arg(long, global = true)]
    pub transport: Option<TransportSelection>,

    /// Bind address for the HTTP transport
    #[arg(long, global = true)]
    pub http_addr: Option<SocketAddr>,

    /// Log output format (json, pretty)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true)]
    pub log_filter: Option<String>,
}

impl ConfigArgs {
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(kind) = self.transport {
            config.transport.kind = kind;
        }
        if let Some(addr) = self.http_addr {
            config.transport.http_addr = addr;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(filter) = &self.log_filter {
            config.logging.filter = filter.clone();
        }
    }
}

/// Defaults, then file, then environment, then flags
pub fn load_config(args: &ConfigArgs) -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Build a dispatcher over the simulated provider
pub fn build_dispatcher(config: &GatewayConfig) -> Result<Dispatcher, RegistryError> {
    let provider: Arc<dyn ProviderClient> = Arc::new(SimulatedProvider::new());
    let registry = mediagate_modules::build_registry(config, provider)?;
    Ok(Dispatcher::new(Arc::new(registry), config.dispatch_config()))
}
