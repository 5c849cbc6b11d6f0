//! Dispatcher
//!
//! The single entry point every transport binding calls. Per request it
//! resolves the tool, validates the payload against the precomputed schema,
//! runs the handler under the invocation deadline and normalizes whatever
//! comes back. Nothing a handler does (error, panic, hang) escapes
//! [`Dispatcher::dispatch`] as anything but an [`InvocationResult`].

use crate::error::{ErrorEnvelope, ErrorKind, ErrorNormalizer, Failure};
use crate::invocation::{
    ContentBlock, InvocationContext, InvocationRequest, InvocationResult, RequestMeta,
    TransportKind,
};
use crate::registry::{ModuleRegistry, Resolution};
use crate::tool::{Arguments, ToolInfo};
use futures::FutureExt;
use mediagate_observability::{HealthReport, InvocationOutcome, metrics};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Default per-invocation deadline
pub const DEFAULT_INVOCATION_DEADLINE: Duration = Duration::from_secs(120);

/// Dispatcher settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound for every invocation; callers may only shorten it
    pub default_deadline: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_deadline: DEFAULT_INVOCATION_DEADLINE,
        }
    }
}

/// Routes invocation requests to tool handlers
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ModuleRegistry>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<ModuleRegistry>, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Discovery listing
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.registry.list_tools()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport::new(
            env!("CARGO_PKG_VERSION"),
            self.registry.module_count(),
            self.registry.tool_count(),
        )
    }

    /// Dispatch with no external cancellation
    pub async fn dispatch(&self, request: InvocationRequest) -> InvocationResult {
        self.dispatch_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Dispatch a request. Cancelling `cancel` (client disconnect, shutdown)
    /// stops any polling the handler is doing.
    pub async fn dispatch_with_cancel(
        &self,
        request: InvocationRequest,
        cancel: CancellationToken,
    ) -> InvocationResult {
        let request_id = request_id_for(&request.meta);
        let span = info_span!(
            "invocation",
            tool = %request.tool,
            request_id = %request_id,
            transport = request.meta.transport.as_str(),
        );

        async move {
            let started = Instant::now();
            let (metric_label, outcome) = match self.run(&request, &request_id, cancel).await {
                Ok((label, content)) => {
                    info!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        blocks = content.len(),
                        "Invocation succeeded"
                    );
                    (
                        label,
                        InvocationResult::Success {
                            request_id,
                            content,
                        },
                    )
                }
                Err((label, failure)) => {
                    let error = ErrorNormalizer::normalize(failure, &request_id);
                    log_failure(&error, started.elapsed());
                    (label, InvocationResult::Error { request_id, error })
                }
            };
            metrics::record_invocation(metric_label, outcome_label(&outcome), started.elapsed());
            outcome
        }
        .instrument(span)
        .await
    }

    /// Dispatch an undecoded request body.
    ///
    /// A payload that is not an [`InvocationRequest`] yields a
    /// `ProtocolError` result instead of a transport-level failure.
    pub async fn dispatch_json(
        &self,
        raw: Value,
        transport: TransportKind,
        cancel: CancellationToken,
    ) -> InvocationResult {
        let fallback_id = raw
            .pointer("/meta/request_id")
            .and_then(Value::as_str)
            .map(str::to_owned);
        match serde_json::from_value::<InvocationRequest>(raw) {
            Ok(request) => {
                self.dispatch_with_cancel(request.via(transport), cancel)
                    .await
            }
            Err(e) => self.reject_malformed(e.to_string(), fallback_id),
        }
    }

    /// Build the `ProtocolError` result for an envelope that could not be
    /// decoded at all
    pub fn reject_malformed(
        &self,
        reason: impl Into<String>,
        request_id: Option<String>,
    ) -> InvocationResult {
        let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let error = ErrorNormalizer::normalize(
            Failure::MalformedEnvelope {
                reason: reason.into(),
            },
            &request_id,
        );
        info!(request_id = %request_id, message = %error.message, "Rejected malformed request");
        metrics::record_invocation(UNRESOLVED_TOOL, InvocationOutcome::ProtocolError, Duration::ZERO);
        InvocationResult::Error { request_id, error }
    }

    async fn run(
        &self,
        request: &InvocationRequest,
        request_id: &str,
        cancel: CancellationToken,
    ) -> Result<(&str, Vec<ContentBlock>), (&str, Failure)> {
        let descriptor = match self.registry.resolve(&request.tool) {
            Resolution::Found(descriptor) => descriptor,
            Resolution::UnknownTool { module } => {
                return Err((
                    UNRESOLVED_TOOL,
                    Failure::UnknownTool {
                        name: request.tool.clone(),
                        module: Some(module.to_string()),
                    },
                ));
            }
            Resolution::UnknownNamespace => {
                return Err((
                    UNRESOLVED_TOOL,
                    Failure::UnknownTool {
                        name: request.tool.clone(),
                        module: None,
                    },
                ));
            }
        };
        let label = descriptor.name.as_str();

        let deadline = self.effective_deadline(&request.meta).map_err(|f| (label, f))?;

        let arguments = descriptor
            .schema
            .validate(&request.arguments)
            .map_err(|violations| (label, Failure::InvalidArguments(violations)))?;

        if cancel.is_cancelled() {
            return Err((label, Failure::Tool(crate::error::ToolError::Cancelled)));
        }

        let ctx = InvocationContext::new(
            request_id,
            request.meta.transport,
            Instant::now() + deadline,
            cancel.child_token(),
        );
        let call = AssertUnwindSafe(
            descriptor
                .handler()
                .call(Arguments::from_value(arguments), &ctx),
        )
        .catch_unwind();

        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(Ok(content))) => Ok((label, content)),
            Ok(Ok(Err(err))) => Err((label, Failure::Tool(err))),
            Ok(Err(panic)) => Err((
                label,
                Failure::Panicked {
                    detail: panic_detail(panic.as_ref()),
                },
            )),
            Err(_) => {
                ctx.cancellation().cancel();
                Err((label, Failure::DeadlineExceeded { deadline }))
            }
        }
    }

    fn effective_deadline(&self, meta: &RequestMeta) -> Result<Duration, Failure> {
        match meta.deadline_ms {
            None => Ok(self.config.default_deadline),
            Some(0) => Err(Failure::MalformedEnvelope {
                reason: "meta.deadline_ms must be greater than zero".to_string(),
            }),
            Some(ms) => Ok(Duration::from_millis(ms).min(self.config.default_deadline)),
        }
    }
}

/// Metric label for requests that never resolved to a tool
const UNRESOLVED_TOOL: &str = "<unknown>";

fn request_id_for(meta: &RequestMeta) -> String {
    meta.request_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn outcome_label(result: &InvocationResult) -> InvocationOutcome {
    match result.error().map(|e| e.kind) {
        None => InvocationOutcome::Success,
        Some(ErrorKind::ValidationError) => InvocationOutcome::ValidationError,
        Some(ErrorKind::DomainError) => InvocationOutcome::DomainError,
        Some(ErrorKind::ProtocolError) => InvocationOutcome::ProtocolError,
        Some(ErrorKind::InternalError) => InvocationOutcome::InternalError,
    }
}

fn log_failure(error: &ErrorEnvelope, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match error.kind {
        ErrorKind::ValidationError | ErrorKind::ProtocolError => info!(
            kind = %error.kind,
            code = error.code().unwrap_or_default(),
            elapsed_ms,
            "Invocation rejected"
        ),
        ErrorKind::DomainError | ErrorKind::InternalError => warn!(
            kind = %error.kind,
            code = error.code().unwrap_or_default(),
            retryable = error.retryable,
            elapsed_ms,
            "Invocation failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, ToolError, codes};
    use crate::registry::RegistryBuilder;
    use crate::schema::{ArgType, Field};
    use crate::tool::{Module, ToolSpec};
    use serde_json::json;

    fn explode() -> crate::tool::ToolResult {
        panic!("handler exploded")
    }

    fn dispatcher() -> Dispatcher {
        let module = Module::new("echo", "echo_")
            .tool(
                ToolSpec::new("echo_text", "Echo the prompt")
                    .args(ArgType::object([
                        Field::required("prompt", ArgType::String),
                        Field::optional("times", ArgType::Integer).with_default(1),
                    ]))
                    .handler_fn(|args, _| async move {
                        let prompt = args.require_str("prompt")?.to_string();
                        let times = args.u64("times").unwrap_or(1) as usize;
                        Ok(vec![ContentBlock::text(prompt.repeat(times))])
                    }),
            )
            .tool(
                ToolSpec::new("echo_panic", "Always panics")
                    .handler_fn(|_, _| async { explode() }),
            )
            .tool(
                ToolSpec::new("echo_slow", "Sleeps until cancelled")
                    .handler_fn(|_, ctx: InvocationContext| async move {
                        ctx.cancellation().cancelled().await;
                        Err(ToolError::Cancelled)
                    }),
            )
            .tool(
                ToolSpec::new("echo_reject", "Provider says no")
                    .handler_fn(|_, _| async {
                        Err(ToolError::provider(
                            "echo-provider",
                            ProviderError::transient("rate limited"),
                        ))
                    }),
            );
        let registry = RegistryBuilder::new().with_module(module).unwrap().build();
        Dispatcher::new(
            Arc::new(registry),
            DispatchConfig {
                default_deadline: Duration::from_secs(5),
            },
        )
    }

    #[tokio::test]
    async fn dispatches_with_defaults_filled() {
        let result = dispatcher()
            .dispatch(InvocationRequest::new("echo_text", json!({"prompt": "ab"})).with_request_id("r-1"))
            .await;
        assert_eq!(result.request_id(), "r-1");
        assert_eq!(result.content().unwrap(), [ContentBlock::text("ab")]);
    }

    #[tokio::test]
    async fn unknown_names_are_protocol_errors() {
        let d = dispatcher();
        for name in ["nope_tool", "echo_missing"] {
            let result = d.dispatch(InvocationRequest::new(name, json!({}))).await;
            let error = result.error().unwrap();
            assert_eq!(error.kind, ErrorKind::ProtocolError);
            assert_eq!(error.code(), Some(codes::METHOD_NOT_FOUND));
            assert!(!result.request_id().is_empty());
        }
    }

    #[tokio::test]
    async fn missing_required_field_is_validation_error() {
        let result = dispatcher()
            .dispatch(InvocationRequest::new("echo_text", json!({"times": "x"})))
            .await;
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::ValidationError);
        let paths: Vec<&str> = error.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, ["prompt", "times"]);
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let d = dispatcher();
        let result = d.dispatch(InvocationRequest::new("echo_panic", json!({}))).await;
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::InternalError);
        assert!(!error.message.contains("exploded"));

        // the dispatcher is still usable afterwards
        let ok = d
            .dispatch(InvocationRequest::new("echo_text", json!({"prompt": "x"})))
            .await;
        assert!(ok.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn caller_deadline_shortens_configured_one() {
        let result = dispatcher()
            .dispatch(
                InvocationRequest::new("echo_slow", json!({}))
                    .with_deadline(Duration::from_millis(250)),
            )
            .await;
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::InternalError);
        assert!(error.retryable);
        assert_eq!(error.code(), Some(codes::DEADLINE_EXCEEDED));
        assert!(error.message.contains("250ms"));
    }

    #[tokio::test]
    async fn zero_deadline_is_malformed() {
        let mut request = InvocationRequest::new("echo_text", json!({"prompt": "x"}));
        request.meta.deadline_ms = Some(0);
        let result = dispatcher().dispatch(request).await;
        assert_eq!(result.error().unwrap().kind, ErrorKind::ProtocolError);
    }

    #[tokio::test]
    async fn external_cancellation_reaches_handler() {
        let d = dispatcher();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let task = tokio::spawn(async move {
            d.dispatch_with_cancel(InvocationRequest::new("echo_slow", json!({})), cancel)
                .await
        });
        tokio::task::yield_now().await;
        trigger.cancel();

        let result = task.await.unwrap();
        assert_eq!(result.error().unwrap().code(), Some(codes::CANCELLED));
    }

    #[tokio::test]
    async fn domain_errors_keep_retryable_flag() {
        let result = dispatcher()
            .dispatch(InvocationRequest::new("echo_reject", json!({})))
            .await;
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::DomainError);
        assert!(error.retryable);
    }

    #[tokio::test]
    async fn malformed_json_envelopes_are_rejected() {
        let d = dispatcher();
        let result = d
            .dispatch_json(
                json!({"arguments": {}, "meta": {"request_id": "keep-me"}}),
                TransportKind::Http,
                CancellationToken::new(),
            )
            .await;
        assert_eq!(result.request_id(), "keep-me");
        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::ProtocolError);
        assert_eq!(error.code(), Some(codes::MALFORMED_REQUEST));
    }

    #[test]
    fn health_counts_registry() {
        let report = dispatcher().health();
        assert_eq!(report.modules, 1);
        assert_eq!(report.tools, 4);
    }
}
