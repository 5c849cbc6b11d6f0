//! # Mediagate Transport
//!
//! Bindings that carry invocation requests from an agent runtime to the
//! [`Dispatcher`] and results back. Two are provided:
//!
//! - [`StdioBinding`]: newline-framed JSON on stdin/stdout
//! - [`HttpBinding`]: an axum server exposing `/invoke`, `/tools`,
//!   `/health` and `/metrics`
//!
//! Both are thin: decoding, routing and error shaping all happen in the
//! dispatcher, so a request produces the same result whichever binding
//! carried it.

pub mod error;
pub mod http;
pub mod shutdown;
pub mod stdio;

pub use error::TransportError;
pub use http::{HttpBinding, router};
pub use shutdown::{cancel_on_signal, shutdown_signal};
pub use stdio::StdioBinding;

use async_trait::async_trait;
use mediagate_core::Dispatcher;
use mediagate_core::config::{TransportConfig, TransportSelection};
use tokio_util::sync::CancellationToken;

/// A way of exposing the dispatcher to callers
#[async_trait]
pub trait TransportBinding: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Serve until the peer goes away or `shutdown` is cancelled.
    ///
    /// In-flight invocations are cancelled before this returns.
    async fn serve(
        self: Box<Self>,
        dispatcher: Dispatcher,
        shutdown: CancellationToken,
    ) -> Result<(), TransportError>;
}

/// The binding selected by `config`
pub fn binding_for(config: &TransportConfig) -> Box<dyn TransportBinding> {
    match config.kind {
        TransportSelection::Stdio => Box::new(StdioBinding),
        TransportSelection::Http => Box::new(HttpBinding::new(config.http_addr)),
    }
}
