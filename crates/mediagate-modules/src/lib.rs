//! # Mediagate Modules
//!
//! Capability modules exposed through the gateway. Every module talks to
//! its provider only through [`ProviderClient`], and every operation goes
//! through the shared [`JobPoller`].
//!
//! | Module | Prefix | Tools |
//! |--------|--------|-------|
//! | `image` | `img_` | `img_generate`, `img_edit`, `img_tag` |
//! | `video` | `vid_` | `vid_generate`, `vid_job_status`, `vid_job_wait` |

pub mod image;
pub mod media;
pub mod simulated;
pub mod video;

pub use simulated::SimulatedProvider;

use mediagate_core::{
    GatewayConfig, JobPoller, Module, ModuleRegistry, OperationClass, ProviderClient,
    RegistryError,
};
use std::sync::Arc;
use tracing::info;

/// Provider operation names
pub mod operations {
    pub const IMAGE_GENERATE: &str = "image.generate";
    pub const IMAGE_EDIT: &str = "image.edit";
    pub const IMAGE_TAG: &str = "image.tag";
    pub const VIDEO_GENERATE: &str = "video.generate";
}

/// Modules enabled by `config`, all sharing `provider`
pub fn build_modules(config: &GatewayConfig, provider: Arc<dyn ProviderClient>) -> Vec<Module> {
    let poller = JobPoller::new(provider);
    let mut modules = Vec::new();

    if config.module_enabled(image::MODULE_NAME) {
        modules.push(image::module(
            poller.clone(),
            config.polling.policy(OperationClass::Image),
        ));
    } else {
        info!(module = image::MODULE_NAME, "Module disabled by configuration");
    }

    if config.module_enabled(video::MODULE_NAME) {
        modules.push(video::module(
            poller,
            config.polling.policy(OperationClass::Video),
        ));
    } else {
        info!(module = video::MODULE_NAME, "Module disabled by configuration");
    }

    modules
}

/// Register every enabled module. Any collision or schema problem is a
/// startup error.
pub fn build_registry(
    config: &GatewayConfig,
    provider: Arc<dyn ProviderClient>,
) -> Result<ModuleRegistry, RegistryError> {
    let mut builder = ModuleRegistry::builder();
    for module in build_modules(config, provider) {
        builder.register(module)?;
    }
    Ok(builder.build())
}
