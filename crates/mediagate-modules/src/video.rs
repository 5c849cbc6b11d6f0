//! # Video Tools
//!
//! Video renders take minutes, so the module exposes the job lifecycle
//! directly:
//!
//! - `vid_generate` submits a render and returns its job handle, or blocks
//!   until it finishes when called with `wait: true`
//! - `vid_job_status` checks a job once
//! - `vid_job_wait` blocks on a job until it finishes or the wait budget
//!   runs out
//!
//! Status and wait rebuild the handle from the job id alone, so they work
//! across invocations and transports.

use crate::media::{MediaOutput, non_empty};
use crate::operations;
use async_trait::async_trait;
use mediagate_core::{
    ArgType, Arguments, ContentBlock, Field, InvocationContext, JobHandle, JobPoller, JobRequest,
    JobState, Module, PollPolicy, ToolError, ToolHandler, ToolResult, ToolSpec,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const MODULE_NAME: &str = "video";
pub const PREFIX: &str = "vid_";

pub const ASPECT_RATIOS: &[&str] = &["16:9", "9:16", "1:1"];
pub const MAX_DURATION_SECONDS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideo {
    pub prompt: String,
    pub duration_seconds: u64,
    pub aspect_ratio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub wait: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct JobStatusArgs {
    job_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JobWaitArgs {
    job_id: String,
    #[serde(default)]
    max_wait_seconds: Option<u64>,
}

struct GenerateVideoTool {
    poller: JobPoller,
    policy: PollPolicy,
}

#[async_trait]
impl ToolHandler for GenerateVideoTool {
    async fn call(&self, args: Arguments, ctx: &InvocationContext) -> ToolResult {
        let request: GenerateVideo = args.parse()?;
        if request.prompt.trim().is_empty() {
            return Err(ToolError::invalid_argument("prompt", "must not be blank"));
        }
        if !(1..=MAX_DURATION_SECONDS).contains(&request.duration_seconds) {
            return Err(ToolError::invalid_argument(
                "duration_seconds",
                format!("must be between 1 and {MAX_DURATION_SECONDS}"),
            ));
        }
        let is_http = |url: &String| url.starts_with("https://") || url.starts_with("http://");
        if request.image_url.as_ref().is_some_and(|url| !is_http(url)) {
            return Err(ToolError::invalid_argument(
                "image_url",
                "must be an http(s) URL",
            ));
        }

        let payload = serde_json::to_value(&request)
            .map_err(|e| ToolError::internal(format!("cannot encode video request: {e}")))?;
        let handle = self
            .poller
            .submit(
                JobRequest::new(operations::VIDEO_GENERATE, payload),
                self.policy,
            )
            .await?;

        if !request.wait {
            return Ok(vec![ContentBlock::job(handle)]);
        }

        let handle = self
            .poller
            .wait_until_terminal(handle, self.policy, ctx.cancellation())
            .await?
            .into_result()?;
        finished(handle)
    }
}

struct JobStatusTool {
    poller: JobPoller,
    policy: PollPolicy,
}

#[async_trait]
impl ToolHandler for JobStatusTool {
    async fn call(&self, args: Arguments, _ctx: &InvocationContext) -> ToolResult {
        let JobStatusArgs { job_id } = args.parse()?;
        let job_id = require_job_id(job_id)?;

        let handle = self.poller.poll(self.resume(job_id)).await?;
        debug!(job_id = %handle.job_id, state = %handle.state(), "Job status checked");

        // a failed job is a successful status query
        if handle.state() == JobState::Succeeded {
            finished(handle)
        } else {
            Ok(vec![ContentBlock::job(handle)])
        }
    }
}

impl JobStatusTool {
    fn resume(&self, job_id: String) -> JobHandle {
        self.poller
            .resume(job_id, operations::VIDEO_GENERATE, self.policy)
    }
}

struct JobWaitTool {
    poller: JobPoller,
    policy: PollPolicy,
}

#[async_trait]
impl ToolHandler for JobWaitTool {
    async fn call(&self, args: Arguments, ctx: &InvocationContext) -> ToolResult {
        let JobWaitArgs {
            job_id,
            max_wait_seconds,
        } = args.parse()?;
        let job_id = require_job_id(job_id)?;

        let policy = match max_wait_seconds {
            Some(seconds) => self.policy.capped(Duration::from_secs(seconds)),
            None => self.policy,
        };

        let handle = self
            .poller
            .resume(job_id, operations::VIDEO_GENERATE, policy);
        let handle = self
            .poller
            .wait_until_terminal(handle, policy, ctx.cancellation())
            .await?
            .into_result()?;
        finished(handle)
    }
}

/// Video blocks of a succeeded job followed by its final handle
fn finished(handle: JobHandle) -> ToolResult {
    let output = MediaOutput::from_handle(&handle)?;
    let mut blocks = non_empty(output.video_blocks(), &handle)?;
    blocks.push(ContentBlock::job(handle));
    Ok(blocks)
}

fn require_job_id(job_id: String) -> Result<String, ToolError> {
    let trimmed = job_id.trim();
    if trimmed.is_empty() {
        return Err(ToolError::invalid_argument("job_id", "must not be blank"));
    }
    Ok(trimmed.to_string())
}

/// The video module over `poller`, waiting with `policy` unless a caller
/// asks for a shorter wait
pub fn module(poller: JobPoller, policy: PollPolicy) -> Module {
    Module::new(MODULE_NAME, PREFIX)
        .tool(
            ToolSpec::new(
                "vid_generate",
                "Generate a short video from a prompt; returns a job handle unless `wait` is set",
            )
            .args(ArgType::object([
                Field::required("prompt", ArgType::String).describe("What the video should show"),
                Field::optional("duration_seconds", ArgType::Integer)
                    .at_least(1)
                    .with_default(5)
                    .describe("Clip length, 1 to 60 seconds"),
                Field::optional(
                    "aspect_ratio",
                    ArgType::enumeration(ASPECT_RATIOS.iter().copied()),
                )
                .with_default("16:9"),
                Field::optional("image_url", ArgType::String)
                    .describe("Optional first frame to animate"),
                Field::optional("wait", ArgType::Boolean)
                    .with_default(false)
                    .describe("Block until the render finishes instead of returning the job"),
            ]))
            .handler(Arc::new(GenerateVideoTool {
                poller: poller.clone(),
                policy,
            })),
        )
        .tool(
            ToolSpec::new("vid_job_status", "Check a video job once and return its handle")
                .args(ArgType::object([Field::required("job_id", ArgType::String)
                    .describe("Job id returned by vid_generate")]))
                .handler(Arc::new(JobStatusTool {
                    poller: poller.clone(),
                    policy,
                })),
        )
        .tool(
            ToolSpec::new(
                "vid_job_wait",
                "Wait for a video job to finish and return the rendered video",
            )
            .args(ArgType::object([
                Field::required("job_id", ArgType::String)
                    .describe("Job id returned by vid_generate"),
                Field::optional("max_wait_seconds", ArgType::Integer)
                    .at_least(1)
                    .describe("Give up after this many seconds; capped at the configured maximum"),
            ]))
            .handler(Arc::new(JobWaitTool { poller, policy })),
        )
}
