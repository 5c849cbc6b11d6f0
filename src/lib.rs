//! # Mediagate
//!
//! Mediagate exposes remote generative-media capabilities (image and video
//! generation, editing, tagging) as uniformly discoverable, invocable tools.
//! Callers see one naming scheme, one argument-schema dialect and one error
//! taxonomy regardless of which provider sits behind a tool.
//!
//! ## Core Components
//!
//! - **[ModuleRegistry]**: static routing table from tool names to descriptors,
//!   validated when it is built
//! - **[Dispatcher]**: resolve, validate, execute and normalize one invocation
//! - **[JobPoller]**: drives long-running provider jobs to a terminal state
//! - **[ErrorNormalizer]**: maps every failure onto the four error kinds
//!
//! ## Quick Start
//!
//! ```rust
//! use mediagate::{ArgType, ContentBlock, Dispatcher, Field, InvocationRequest, Module, ModuleRegistry, ToolSpec};
//! use std::sync::Arc;
//!
//! let echo = Module::new("echo", "echo_").tool(
//!     ToolSpec::new("echo_say", "Repeat the given text")
//!         .args(ArgType::object([Field::required("text", ArgType::String)]))
//!         .handler_fn(|args, _ctx| async move {
//!             let text = args.require_str("text")?.to_string();
//!             Ok(vec![ContentBlock::text(text)])
//!         }),
//! );
//! let registry = ModuleRegistry::builder().with_module(echo).unwrap().build();
//! let dispatcher = Dispatcher::new(Arc::new(registry), Default::default());
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let result = runtime.block_on(
//!     dispatcher.dispatch(InvocationRequest::new("echo_say", serde_json::json!({"text": "hi"}))),
//! );
//! assert_eq!(result.content().unwrap(), [ContentBlock::text("hi")]);
//! ```
//!
//! ## Architecture
//!
//! Capability modules live in [`modules`], transport bindings in
//! [`transport`], and logging, metrics and health in [`observability`]. The
//! `mediagate` binary wires them together.

pub use mediagate_core as core;
pub use mediagate_modules as modules;
pub use mediagate_observability as observability;
pub use mediagate_transport as transport;

pub use mediagate_core::{
    ArgType, ContentBlock, Dispatcher, ErrorEnvelope, ErrorKind, ErrorNormalizer, Field,
    GatewayConfig, InvocationRequest, InvocationResult, JobHandle, JobPoller, JobState, Module,
    ModuleRegistry, PollPolicy, ProviderClient, ProviderError, ProviderStatus, ToolError,
    ToolSpec,
};
pub use mediagate_modules::SimulatedProvider;
pub use mediagate_transport::{HttpBinding, StdioBinding, TransportBinding};
