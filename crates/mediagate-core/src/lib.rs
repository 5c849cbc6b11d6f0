//! # Mediagate Core
//!
//! Building blocks of the gateway: the module registry, the schema
//! translator, the dispatcher, error normalization and the asynchronous job
//! poller. Transport bindings and concrete capability modules live in their
//! own crates and only talk to this one.

pub mod config;
pub mod dispatcher;
pub mod duration;
pub mod error;
pub mod identifiers;
pub mod invocation;
pub mod jobs;
pub mod registry;
pub mod sanitization;
pub mod schema;
pub mod tool;

pub use config::{ConfigError, GatewayConfig, TransportSelection};
pub use dispatcher::{DEFAULT_INVOCATION_DEADLINE, DispatchConfig, Dispatcher};
pub use error::{
    ErrorEnvelope, ErrorKind, ErrorNormalizer, Failure, FieldViolation, ProviderError, ToolError,
};
pub use identifiers::{NameValidationError, NameValidator};
pub use invocation::{
    ContentBlock, InvocationContext, InvocationRequest, InvocationResult, RequestMeta,
    TransportKind,
};
pub use jobs::{
    JobHandle, JobPoller, JobRequest, JobState, OperationClass, PollPolicy, ProviderClient,
    ProviderStatus,
};
pub use registry::{ModuleInfo, ModuleRegistry, RegistryBuilder, RegistryError};
pub use schema::{ArgType, Field, SchemaError, SchemaNode, SchemaTranslator};
pub use tool::{
    Arguments, Module, ToolDescriptor, ToolHandler, ToolInfo, ToolResult, ToolSpec, handler_fn,
};
