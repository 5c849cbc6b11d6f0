use clap::{Parser, Subcommand};
use mediagate_core::{Dispatcher, GatewayConfig, InvocationRequest, InvocationResult};
use mediagate_observability::{health, init_tracing};
use mediagate_transport::{binding_for, cancel_on_signal};
use serde_json::{Value, json};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bootstrap;
mod error;

use bootstrap::{ConfigArgs, build_dispatcher, load_config};
use error::{CliError, EXIT_MISCONFIGURED};

#[derive(Parser, Debug)]
#[command(name = "mediagate", version)]
#[command(about = "Mediagate - tool-invocation gateway for generative-media providers")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the gateway on the configured transport
    Serve,
    /// Print the discovery listing as JSON
    Tools,
    /// Invoke one tool in-process and print the result
    Invoke {
        /// Tool name, e.g. img_generate
        tool: String,
        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
        /// Request id echoed in the result
        #[arg(long)]
        request_id: Option<String>,
        /// Deadline in milliseconds; can only shorten the configured one
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
    /// Validate configuration and module registration
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_MISCONFIGURED);
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("Error: {e}");
        return ExitCode::from(EXIT_MISCONFIGURED);
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(command: Commands, config: GatewayConfig) -> Result<(), CliError> {
    match command {
        Commands::Serve => serve(config).await,
        Commands::Tools => {
            let dispatcher = build_dispatcher(&config)?;
            print_json(&json!({ "tools": dispatcher.list_tools() }))
        }
        Commands::Invoke {
            tool,
            arguments,
            request_id,
            deadline_ms,
        } => {
            let arguments: Value =
                serde_json::from_str(&arguments).map_err(CliError::InvalidArguments)?;
            let mut request = InvocationRequest::new(&tool, arguments);
            if let Some(id) = request_id {
                request = request.with_request_id(id);
            }
            if let Some(ms) = deadline_ms {
                request = request.with_deadline(Duration::from_millis(ms));
            }

            let dispatcher = build_dispatcher(&config)?;
            let result = invoke(&dispatcher, request).await;
            print_json(&result)?;
            if result.is_success() {
                Ok(())
            } else {
                Err(CliError::InvocationFailed { tool })
            }
        }
        Commands::Check => {
            let dispatcher = build_dispatcher(&config)?;
            let registry = dispatcher.registry();
            print_json(&json!({
                "status": "ok",
                "transport": config.transport.kind.to_string(),
                "modules": registry.modules(),
                "tools": registry.tool_count(),
            }))
        }
    }
}

async fn serve(config: GatewayConfig) -> Result<(), CliError> {
    health::mark_started();
    let dispatcher = build_dispatcher(&config)?;

    let shutdown = CancellationToken::new();
    let signals = cancel_on_signal(shutdown.clone());
    let binding = binding_for(&config.transport);
    info!(
        transport = binding.name(),
        modules = dispatcher.registry().module_count(),
        tools = dispatcher.registry().tool_count(),
        "Gateway starting"
    );

    let served = binding.serve(dispatcher, shutdown.clone()).await;
    shutdown.cancel();
    if let Err(e) = signals.await {
        error!(error = %e, "Signal handler task failed");
    }
    served?;

    info!("Gateway stopped");
    Ok(())
}

async fn invoke(dispatcher: &Dispatcher, request: InvocationRequest) -> InvocationResult {
    // Ctrl+C during a long wait cancels the poll instead of killing the process
    let cancel = CancellationToken::new();
    let signals = cancel_on_signal(cancel.clone());
    let result = dispatcher.dispatch_with_cancel(request, cancel.clone()).await;
    cancel.cancel();
    if let Err(e) = signals.await {
        error!(error = %e, "Signal handler task failed");
    }
    result
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mediagate_core::TransportSelection;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mediagate",
            "serve",
            "--transport",
            "http",
            "--http-addr",
            "127.0.0.1:9100",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Serve));
        assert_eq!(cli.config.transport, Some(TransportSelection::Http));
        assert_eq!(cli.config.http_addr.unwrap().port(), 9100);
    }

    #[test]
    fn invoke_arguments_default_to_empty_object() {
        let cli = Cli::try_parse_from(["mediagate", "invoke", "img_tag"]).unwrap();
        match cli.command {
            Commands::Invoke {
                tool, arguments, ..
            } => {
                assert_eq!(tool, "img_tag");
                assert_eq!(arguments, "{}");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_transport() {
        assert!(Cli::try_parse_from(["mediagate", "--transport", "carrier-pigeon", "serve"]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn invoke_runs_against_simulated_provider() {
        let dispatcher = build_dispatcher(&GatewayConfig::default()).unwrap();
        let result = invoke(
            &dispatcher,
            InvocationRequest::new("img_generate", json!({"prompt": "a lighthouse"})),
        )
        .await;
        assert!(result.is_success(), "{result:?}");
    }

    #[tokio::test]
    async fn check_reports_registration() {
        let config = GatewayConfig::default();
        run(Commands::Check, config).await.unwrap();
    }
}
