//! # Image Tools
//!
//! `img_generate`, `img_edit` and `img_tag`. Each one submits a provider job
//! and blocks on it with the image poll policy, so from the caller's side
//! they behave like ordinary synchronous tools.

use crate::media::{MediaOutput, non_empty};
use crate::operations;
use async_trait::async_trait;
use mediagate_core::{
    ArgType, Arguments, ContentBlock, Field, InvocationContext, JobPoller, JobRequest, Module,
    PollPolicy, ToolError, ToolHandler, ToolResult, ToolSpec,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;

pub const MODULE_NAME: &str = "image";
pub const PREFIX: &str = "img_";

pub const IMAGE_SIZES: &[&str] = &["512x512", "1024x1024", "1792x1024", "1024x1792"];
pub const MAX_IMAGES_PER_REQUEST: u64 = 4;
pub const MAX_TAGS: u64 = 50;

/// One provider operation behind an image tool
trait ImageOperation: DeserializeOwned + Serialize + Send + 'static {
    const OPERATION: &'static str;

    /// Checks the schema cannot express
    fn check(&self) -> Result<(), ToolError>;

    fn render(output: &MediaOutput) -> Vec<ContentBlock>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateImage {
    pub prompt: String,
    pub size: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ImageOperation for GenerateImage {
    const OPERATION: &'static str = operations::IMAGE_GENERATE;

    fn check(&self) -> Result<(), ToolError> {
        require_text("prompt", &self.prompt)?;
        if !(1..=MAX_IMAGES_PER_REQUEST).contains(&self.count) {
            return Err(ToolError::invalid_argument(
                "count",
                format!("must be between 1 and {MAX_IMAGES_PER_REQUEST}"),
            ));
        }
        Ok(())
    }

    fn render(output: &MediaOutput) -> Vec<ContentBlock> {
        output.image_blocks()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditImage {
    pub image_url: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask_url: Option<String>,
    pub strength: f64,
}

impl ImageOperation for EditImage {
    const OPERATION: &'static str = operations::IMAGE_EDIT;

    fn check(&self) -> Result<(), ToolError> {
        require_url("image_url", &self.image_url)?;
        require_text("prompt", &self.prompt)?;
        if let Some(mask) = &self.mask_url {
            require_url("mask_url", mask)?;
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(ToolError::invalid_argument(
                "strength",
                "must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }

    fn render(output: &MediaOutput) -> Vec<ContentBlock> {
        output.image_blocks()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagImage {
    pub image_url: String,
    pub max_tags: u64,
}

impl ImageOperation for TagImage {
    const OPERATION: &'static str = operations::IMAGE_TAG;

    fn check(&self) -> Result<(), ToolError> {
        require_url("image_url", &self.image_url)?;
        if !(1..=MAX_TAGS).contains(&self.max_tags) {
            return Err(ToolError::invalid_argument(
                "max_tags",
                format!("must be between 1 and {MAX_TAGS}"),
            ));
        }
        Ok(())
    }

    fn render(output: &MediaOutput) -> Vec<ContentBlock> {
        if output.tags.is_empty() {
            Vec::new()
        } else {
            output.tag_blocks()
        }
    }
}

/// Submit-and-wait handler shared by every image tool
struct ImageTool<Op> {
    poller: JobPoller,
    policy: PollPolicy,
    _operation: PhantomData<fn() -> Op>,
}

impl<Op: ImageOperation> ImageTool<Op> {
    fn shared(poller: JobPoller, policy: PollPolicy) -> Arc<dyn ToolHandler> {
        Arc::new(Self {
            poller,
            policy,
            _operation: PhantomData,
        })
    }
}

#[async_trait]
impl<Op: ImageOperation> ToolHandler for ImageTool<Op> {
    async fn call(&self, args: Arguments, ctx: &InvocationContext) -> ToolResult {
        let operation: Op = args.parse()?;
        operation.check()?;

        let payload = serde_json::to_value(&operation)
            .map_err(|e| ToolError::internal(format!("cannot encode {}: {e}", Op::OPERATION)))?;
        let handle = self
            .poller
            .submit(JobRequest::new(Op::OPERATION, payload), self.policy)
            .await?;
        let handle = self
            .poller
            .wait_until_terminal(handle, self.policy, ctx.cancellation())
            .await?
            .into_result()?;

        let output = MediaOutput::from_handle(&handle)?;
        non_empty(Op::render(&output), &handle)
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ToolError> {
    if value.trim().is_empty() {
        return Err(ToolError::invalid_argument(field, "must not be blank"));
    }
    Ok(())
}

fn require_url(field: &str, value: &str) -> Result<(), ToolError> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(ToolError::invalid_argument(field, "must be an http(s) URL"))
    }
}

/// The image module over `poller`, waiting with `policy`
pub fn module(poller: JobPoller, policy: PollPolicy) -> Module {
    Module::new(MODULE_NAME, PREFIX)
        .tool(
            ToolSpec::new("img_generate", "Generate images from a text prompt")
                .args(ArgType::object([
                    Field::required("prompt", ArgType::String)
                        .describe("What the image should show"),
                    Field::optional("size", ArgType::enumeration(IMAGE_SIZES.iter().copied()))
                        .with_default("1024x1024")
                        .describe("Output dimensions in pixels"),
                    Field::optional("count", ArgType::Integer)
                        .at_least(1)
                        .with_default(1)
                        .describe("Number of images, 1 to 4"),
                    Field::optional("style", ArgType::String)
                        .describe("Style hint such as `photo` or `watercolor`"),
                    Field::optional("negative_prompt", ArgType::String)
                        .describe("What the image should avoid"),
                    Field::optional("seed", ArgType::Integer)
                        .at_least(0)
                        .describe("Seed for reproducible output"),
                ]))
                .handler(ImageTool::<GenerateImage>::shared(poller.clone(), policy)),
        )
        .tool(
            ToolSpec::new("img_edit", "Edit an existing image according to a prompt")
                .args(ArgType::object([
                    Field::required("image_url", ArgType::String)
                        .describe("URL of the source image"),
                    Field::required("prompt", ArgType::String).describe("The change to make"),
                    Field::optional("mask_url", ArgType::String)
                        .describe("URL of a mask limiting the edited area"),
                    Field::optional("strength", ArgType::Number)
                        .at_least(0)
                        .with_default(0.7)
                        .describe("How far the result may depart from the source, 0.0 to 1.0"),
                ]))
                .handler(ImageTool::<EditImage>::shared(poller.clone(), policy)),
        )
        .tool(
            ToolSpec::new("img_tag", "Describe an image with content tags")
                .args(ArgType::object([
                    Field::required("image_url", ArgType::String)
                        .describe("URL of the image to tag"),
                    Field::optional("max_tags", ArgType::Integer)
                        .at_least(1)
                        .with_default(10)
                        .describe("Upper bound on returned tags"),
                ]))
                .handler(ImageTool::<TagImage>::shared(poller, policy)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedProvider;
    use mediagate_core::{
        DispatchConfig, Dispatcher, ErrorKind, InvocationRequest, ModuleRegistry, OperationClass,
    };
    use serde_json::json;
    use std::time::Duration;

    fn dispatcher() -> Dispatcher {
        let poller = JobPoller::new(Arc::new(SimulatedProvider::with_checks_to_complete(2)));
        let policy = PollPolicy::new(Duration::from_millis(10), Duration::from_secs(5));
        let registry = ModuleRegistry::builder()
            .with_module(module(poller, policy))
            .unwrap()
            .build();
        Dispatcher::new(Arc::new(registry), DispatchConfig::default())
    }

    #[test]
    fn registers_three_tools() {
        let poller = JobPoller::new(Arc::new(SimulatedProvider::new()));
        let module = module(poller, PollPolicy::default_for(OperationClass::Image));
        let names: Vec<&str> = module.tool_names().collect();
        assert_eq!(names, ["img_generate", "img_edit", "img_tag"]);
    }

    #[tokio::test(start_paused = true)]
    async fn generate_returns_requested_images() {
        let result = dispatcher()
            .dispatch(InvocationRequest::new(
                "img_generate",
                json!({"prompt": "a fox in snow", "count": 2}),
            ))
            .await;

        let content = result.content().unwrap();
        assert_eq!(content.len(), 2);
        assert!(matches!(
            &content[0],
            ContentBlock::Image { mime_type, .. } if mime_type == "image/png"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn count_out_of_range_is_a_validation_error() {
        let result = dispatcher()
            .dispatch(InvocationRequest::new(
                "img_generate",
                json!({"prompt": "a fox", "count": 9}),
            ))
            .await;

        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::ValidationError);
        assert_eq!(error.violations[0].path, "count");
    }

    #[tokio::test(start_paused = true)]
    async fn negative_integers_are_reported_per_field() {
        let result = dispatcher()
            .dispatch(InvocationRequest::new(
                "img_generate",
                json!({"prompt": "x", "count": -1, "seed": -2}),
            ))
            .await;

        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::ValidationError);
        let paths: Vec<&str> = error.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, ["count", "seed"]);
        assert!(error.violations.iter().all(|v| v.message.starts_with("must be at least")));
    }

    #[test]
    fn discovery_publishes_lower_bounds() {
        let tools = dispatcher().list_tools();
        let generate = tools.iter().find(|t| t.name == "img_generate").unwrap();
        let properties = &generate.input_schema["properties"];
        assert_eq!(properties["count"]["minimum"], 1);
        assert_eq!(properties["seed"]["minimum"], 0);
        assert!(properties["prompt"].get("minimum").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn edit_rejects_non_url_sources() {
        let result = dispatcher()
            .dispatch(InvocationRequest::new(
                "img_edit",
                json!({"image_url": "/etc/passwd", "prompt": "brighter"}),
            ))
            .await;

        let error = result.error().unwrap();
        assert_eq!(error.kind, ErrorKind::ValidationError);
        assert_eq!(error.violations[0].path, "image_url");
    }

    #[tokio::test(start_paused = true)]
    async fn tag_returns_json_and_summary() {
        let result = dispatcher()
            .dispatch(InvocationRequest::new(
                "img_tag",
                json!({"image_url": "https://cdn/fox.png", "max_tags": 2}),
            ))
            .await;

        let content = result.content().unwrap();
        assert_eq!(content[1], ContentBlock::text("subject, scene"));
    }
}
