//! # Mediagate Testing
//!
//! Test utilities for the gateway:
//!
//! - **Mock providers**: [`ScriptedProvider`] replays per-job status scripts
//!   and records every call; [`FailingProvider`] rejects everything
//! - **Harness**: [`GatewayHarness`] wires the built-in modules (and any
//!   extra ones) to a scripted provider behind a real dispatcher
//!
//! ```rust
//! use mediagate_testing::{GatewayHarness, ScriptedProvider, mock_providers::image_output};
//!
//! # tokio_test::block_on(async {
//! let harness = GatewayHarness::builder()
//!     .with_provider(ScriptedProvider::succeeding_after("sp", 1, image_output("https://x/1.png")))
//!     .build()
//!     .unwrap();
//!
//! let result = harness.invoke("img_generate", serde_json::json!({"prompt": "a fox"})).await;
//! assert!(result.is_success());
//! # });
//! ```

/// Gateway harness over a scripted provider
pub mod harness;
/// Scripted and failing provider clients
pub mod mock_providers;

pub use harness::{GatewayHarness, GatewayHarnessBuilder};
pub use mock_providers::{FailingProvider, ScriptStep, ScriptedProvider};
