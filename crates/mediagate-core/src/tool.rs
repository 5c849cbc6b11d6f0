//! Tools, tool handlers and capability modules

use crate::error::{FieldViolation, ToolError};
use crate::invocation::{ContentBlock, InvocationContext};
use crate::registry::RegistryError;
use crate::schema::{ArgType, SchemaNode};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Result type every tool handler returns
pub type ToolResult = Result<Vec<ContentBlock>, ToolError>;

/// Validated arguments, with defaults already filled in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Wrap a validated payload. Anything other than an object becomes empty.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    /// A string the schema marks as required
    pub fn require_str(&self, key: &str) -> Result<&str, ToolError> {
        self.str(key)
            .ok_or_else(|| ToolError::invalid_argument(key, "missing required string"))
    }

    /// Deserialize the whole argument object into a typed struct
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| ToolError::InvalidArguments(vec![FieldViolation::new("", e.to_string())]))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Executes one tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Arguments, ctx: &InvocationContext) -> ToolResult;
}

/// Handler backed by an async closure
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Arguments, InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    async fn call(&self, args: Arguments, ctx: &InvocationContext) -> ToolResult {
        (self.0)(args, ctx.clone()).await
    }
}

/// Wrap an async closure as a shared handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Arguments, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Declaration of one tool, before registration
pub struct ToolSpec {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) args: ArgType,
    pub(crate) handler: Option<Arc<dyn ToolHandler>>,
}

impl ToolSpec {
    /// Start a tool declaration with no arguments and no handler
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args: ArgType::Object(Vec::new()),
            handler: None,
        }
    }

    pub fn args(mut self, args: ArgType) -> Self {
        self.args = args;
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn handler_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Arguments, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        self.handler(handler_fn(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// A capability module: a named tool group sharing one namespace prefix
#[derive(Debug)]
pub struct Module {
    pub(crate) name: String,
    pub(crate) prefix: String,
    pub(crate) tools: Vec<ToolSpec>,
}

impl Module {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            tools: Vec::new(),
        }
    }

    pub fn tool(mut self, spec: ToolSpec) -> Self {
        self.tools.push(spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|t| t.name.as_str())
    }
}

/// Registered, immutable tool
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub module: String,
    pub schema: SchemaNode,
    /// `schema` rendered once as JSON Schema for discovery
    pub input_schema: Value,
    pub(crate) handler: Arc<dyn ToolHandler>,
}

impl ToolDescriptor {
    pub(crate) fn from_spec(
        module: &str,
        spec: ToolSpec,
        schema: SchemaNode,
    ) -> Result<Self, RegistryError> {
        let handler = spec.handler.ok_or_else(|| RegistryError::MissingHandler {
            tool: spec.name.clone(),
        })?;
        Ok(Self {
            input_schema: schema.to_json_schema(),
            name: spec.name,
            description: spec.description,
            module: module.to_string(),
            schema,
            handler,
        })
    }

    pub fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            module: self.module.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Discovery entry for one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub module: String,
    pub input_schema: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct GenerateArgs {
        prompt: String,
        count: u32,
    }

    #[test]
    fn arguments_accessors() {
        let args = Arguments::from_value(json!({"prompt": "fox", "count": 2, "wait": true}));
        assert_eq!(args.str("prompt"), Some("fox"));
        assert_eq!(args.u64("count"), Some(2));
        assert_eq!(args.bool("wait"), Some(true));
        assert!(args.require_str("missing").is_err());

        let typed: GenerateArgs = args.parse().unwrap();
        assert_eq!(typed.prompt, "fox");
        assert_eq!(typed.count, 2);
    }

    #[test]
    fn non_object_arguments_are_empty() {
        assert_eq!(Arguments::from_value(json!([1, 2])), Arguments::default());
    }

    #[tokio::test]
    async fn closure_handlers_receive_arguments() {
        let handler = handler_fn(|args: Arguments, ctx: InvocationContext| async move {
            Ok(vec![ContentBlock::text(format!(
                "{}:{}",
                ctx.request_id,
                args.str("prompt").unwrap_or_default()
            ))])
        });
        let ctx = InvocationContext::new(
            "req-9",
            crate::invocation::TransportKind::Local,
            tokio::time::Instant::now() + std::time::Duration::from_secs(1),
            tokio_util::sync::CancellationToken::new(),
        );
        let out = handler
            .call(Arguments::from_value(json!({"prompt": "owl"})), &ctx)
            .await
            .unwrap();
        assert_eq!(out, vec![ContentBlock::text("req-9:owl")]);
    }

    #[test]
    fn missing_handler_is_reported() {
        let spec = ToolSpec::new("img_generate", "Generate an image");
        let schema = crate::schema::SchemaTranslator::translate(&spec.args).unwrap();
        let err = ToolDescriptor::from_spec("image", spec, schema).unwrap_err();
        assert_eq!(
            err,
            RegistryError::MissingHandler {
                tool: "img_generate".into()
            }
        );
    }
}
