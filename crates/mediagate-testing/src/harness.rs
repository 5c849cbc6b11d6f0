//! # Gateway Test Harness
//!
//! Builds a registry and dispatcher over a [`ScriptedProvider`] so tests can
//! invoke tools end to end and then inspect what the provider saw. Any other
//! [`ProviderClient`], such as [`FailingProvider`](crate::FailingProvider),
//! can stand in via [`GatewayHarnessBuilder::with_provider_client`].

use crate::mock_providers::ScriptedProvider;
use mediagate_core::{
    Dispatcher, GatewayConfig, InvocationRequest, InvocationResult, Module, ModuleRegistry,
    OperationClass, PollPolicy, ProviderClient, RegistryError, ToolInfo,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builder for [`GatewayHarness`]
pub struct GatewayHarnessBuilder {
    config: GatewayConfig,
    provider: ScriptedProvider,
    client: Option<Arc<dyn ProviderClient>>,
    extra_modules: Vec<Module>,
    builtin_modules: bool,
}

impl GatewayHarnessBuilder {
    pub fn new() -> Self {
        let mut config = GatewayConfig::default();
        // short, deterministic waits; pair with `start_paused` for instant tests
        config.polling.image = PollPolicy::new(Duration::from_millis(100), Duration::from_secs(5));
        config.polling.video = PollPolicy::new(Duration::from_millis(100), Duration::from_secs(10));

        Self {
            config,
            provider: ScriptedProvider::new("scripted"),
            client: None,
            extra_modules: Vec::new(),
            builtin_modules: true,
        }
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_provider(mut self, provider: ScriptedProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Route the built-in modules to `client` instead of the scripted
    /// provider. [`GatewayHarness::provider`] then records nothing.
    pub fn with_provider_client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_poll_policy(mut self, class: OperationClass, policy: PollPolicy) -> Self {
        match class {
            OperationClass::Image => self.config.polling.image = policy,
            OperationClass::Video => self.config.polling.video = policy,
        }
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.config.invocation_deadline = deadline;
        self
    }

    /// Register an extra module next to the built-in ones
    pub fn with_module(mut self, module: Module) -> Self {
        self.extra_modules.push(module);
        self
    }

    /// Leave out the image and video modules
    pub fn without_builtin_modules(mut self) -> Self {
        self.builtin_modules = false;
        self
    }

    pub fn build(self) -> Result<GatewayHarness, RegistryError> {
        let provider = Arc::new(self.provider);
        let shared: Arc<dyn ProviderClient> = match self.client {
            Some(client) => client,
            None => provider.clone(),
        };

        let mut builder = ModuleRegistry::builder();
        if self.builtin_modules {
            for module in mediagate_modules::build_modules(&self.config, shared) {
                builder.register(module)?;
            }
        }
        for module in self.extra_modules {
            builder.register(module)?;
        }

        let dispatcher = Dispatcher::new(Arc::new(builder.build()), self.config.dispatch_config());
        Ok(GatewayHarness {
            dispatcher,
            provider,
        })
    }
}

impl Default for GatewayHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A dispatcher wired to a scripted provider
pub struct GatewayHarness {
    dispatcher: Dispatcher,
    provider: Arc<ScriptedProvider>,
}

impl GatewayHarness {
    pub fn builder() -> GatewayHarnessBuilder {
        GatewayHarnessBuilder::new()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn provider(&self) -> &ScriptedProvider {
        &self.provider
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.dispatcher.list_tools()
    }

    /// Invoke `tool` with `arguments`
    pub async fn invoke(&self, tool: &str, arguments: Value) -> InvocationResult {
        self.dispatcher
            .dispatch(InvocationRequest::new(tool, arguments))
            .await
    }

    pub async fn invoke_request(&self, request: InvocationRequest) -> InvocationResult {
        self.dispatcher.dispatch(request).await
    }

    /// Invoke with a token the test can cancel, e.g. to simulate a client
    /// disconnect
    pub async fn invoke_with_cancel(
        &self,
        tool: &str,
        arguments: Value,
        cancel: CancellationToken,
    ) -> InvocationResult {
        self.dispatcher
            .dispatch_with_cancel(InvocationRequest::new(tool, arguments), cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_providers::{FailingProvider, image_output};
    use mediagate_core::{ArgType, ContentBlock, ErrorKind, Field, ToolSpec, error::codes};
    use serde_json::json;

    #[test]
    fn builds_builtin_modules() {
        let harness = GatewayHarness::builder().build().unwrap();
        assert_eq!(harness.list_tools().len(), 6);
    }

    #[test]
    fn extra_module_collisions_surface() {
        let clash = Module::new("copycat", "img_").tool(
            ToolSpec::new("img_clone", "clash")
                .handler_fn(|_, _| async { Ok(vec![ContentBlock::text("x")]) }),
        );
        let err = GatewayHarness::builder()
            .with_module(clash)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::PrefixOverlap { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn invokes_through_scripted_provider() {
        let harness = GatewayHarness::builder()
            .with_provider(ScriptedProvider::succeeding_after(
                "sp",
                2,
                image_output("https://x/fox.png"),
            ))
            .build()
            .unwrap();

        let result = harness
            .invoke("img_generate", json!({"prompt": "fox"}))
            .await;
        assert_eq!(
            result.content().unwrap(),
            [ContentBlock::image("https://x/fox.png", "image/png")]
        );
        assert_eq!(harness.provider().submissions()[0].payload["size"], "1024x1024");
        assert_eq!(harness.provider().check_count(), 2);
    }

    #[tokio::test]
    async fn failing_provider_errors_keep_their_retryability() {
        let outage = GatewayHarness::builder()
            .with_provider_client(Arc::new(FailingProvider::transient("upstream unavailable")))
            .build()
            .unwrap();
        let result = outage.invoke("img_generate", json!({"prompt": "fox"})).await;
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::DomainError);
        assert!(error.retryable);
        assert!(error.message.starts_with("failing: "));
        assert_eq!(outage.provider().submit_count(), 0);

        let refused = GatewayHarness::builder()
            .with_provider_client(Arc::new(FailingProvider::rejected(
                "prompt refused, token=abc123",
            )))
            .build()
            .unwrap();
        let result = refused.invoke("vid_job_status", json!({"job_id": "j-9"})).await;
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::DomainError);
        assert_eq!(error.code(), Some(codes::PROVIDER_REJECTED));
        assert!(!error.retryable);
        assert!(!error.message.contains("abc123"));
    }

    #[tokio::test]
    async fn custom_module_only() {
        let echo = Module::new("echo", "echo_").tool(
            ToolSpec::new("echo_say", "Echo a word")
                .args(ArgType::object([Field::required("word", ArgType::String)]))
                .handler_fn(|args, _| async move {
                    Ok(vec![ContentBlock::text(args.str("word").unwrap_or_default())])
                }),
        );
        let harness = GatewayHarness::builder()
            .without_builtin_modules()
            .with_module(echo)
            .build()
            .unwrap();

        let result = harness.invoke("echo_say", json!({"word": "hi"})).await;
        assert_eq!(result.content().unwrap(), [ContentBlock::text("hi")]);
    }
}
