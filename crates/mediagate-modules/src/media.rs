//! Decoding of provider job output into content blocks.
//!
//! Providers behind [`ProviderClient`](mediagate_core::ProviderClient) report
//! finished media as JSON of the shape
//!
//! ```json
//! {"images": [{"url": "...", "mime_type": "image/png"}],
//!  "videos": [{"url": "...", "mime_type": "video/mp4", "duration_seconds": 5.0}],
//!  "tags":   [{"label": "fox", "confidence": 0.93}]}
//! ```
//!
//! with every key optional.

use mediagate_core::{ContentBlock, JobHandle, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const DEFAULT_IMAGE_MIME: &str = "image/png";
const DEFAULT_VIDEO_MIME: &str = "video/mp4";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub label: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaOutput {
    #[serde(default)]
    pub images: Vec<MediaAsset>,
    #[serde(default)]
    pub videos: Vec<MediaAsset>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl MediaOutput {
    pub fn from_value(value: &Value) -> Result<Self, ToolError> {
        serde_json::from_value(value.clone())
            .map_err(|e| ToolError::internal(format!("unreadable provider output: {e}")))
    }

    /// Output of a succeeded job handle
    pub fn from_handle(handle: &JobHandle) -> Result<Self, ToolError> {
        let value = handle.result.as_ref().ok_or_else(|| {
            ToolError::internal(format!("job {} succeeded without output", handle.job_id))
        })?;
        Self::from_value(value)
    }

    pub fn image_blocks(&self) -> Vec<ContentBlock> {
        self.images
            .iter()
            .map(|asset| {
                ContentBlock::image(
                    asset.url.clone(),
                    asset.mime_type.as_deref().unwrap_or(DEFAULT_IMAGE_MIME),
                )
            })
            .collect()
    }

    pub fn video_blocks(&self) -> Vec<ContentBlock> {
        self.videos
            .iter()
            .map(|asset| ContentBlock::Video {
                url: asset.url.clone(),
                mime_type: asset
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VIDEO_MIME.to_string()),
                duration_seconds: asset.duration_seconds,
            })
            .collect()
    }

    /// Tags as a JSON block followed by a one-line text summary
    pub fn tag_blocks(&self) -> Vec<ContentBlock> {
        let labels: Vec<&str> = self.tags.iter().map(|t| t.label.as_str()).collect();
        vec![
            ContentBlock::json(json!({ "tags": self.tags })),
            ContentBlock::text(labels.join(", ")),
        ]
    }
}

/// Fail when a succeeded job produced nothing the caller can use
pub(crate) fn non_empty(
    blocks: Vec<ContentBlock>,
    handle: &JobHandle,
) -> Result<Vec<ContentBlock>, ToolError> {
    if blocks.is_empty() {
        Err(ToolError::internal(format!(
            "job {} succeeded but returned no media",
            handle.job_id
        )))
    } else {
        Ok(blocks)
    }
}
