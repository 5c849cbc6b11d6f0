//! HTTP binding
//!
//! | Route | |
//! |-------|---|
//! | `POST /invoke` | body is an `InvocationRequest`, response an `InvocationResult` |
//! | `GET /health` | health report, 503 while no tools are registered |
//! | `GET /tools` | discovery listing |
//! | `GET /metrics` | Prometheus text format |
//!
//! The response body of `/invoke` has the same shape whatever happens; the
//! status code is derived from the error kind.

use crate::{TransportBinding, TransportError};
use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mediagate_core::{
    Dispatcher, ErrorEnvelope, ErrorKind, InvocationResult, TransportKind, error::codes,
};
use mediagate_observability::metrics;
use serde_json::{Value, json};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info};

/// Largest accepted `/invoke` body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Serves the gateway over HTTP on one address
#[derive(Debug, Clone)]
pub struct HttpBinding {
    addr: SocketAddr,
}

impl HttpBinding {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl TransportBinding for HttpBinding {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn serve(
        self: Box<Self>,
        dispatcher: Dispatcher,
        shutdown: CancellationToken,
    ) -> Result<(), TransportError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: self.addr,
                source,
            })?;
        let local = listener.local_addr()?;
        info!(addr = %local, "HTTP transport listening");

        axum::serve(listener, router(dispatcher))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| TransportError::Serve(e.to_string()))?;

        info!("HTTP transport stopped");
        Ok(())
    }
}

/// Build the router. Exposed separately so tests can drive it in-process.
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/invoke", post(invoke))
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/metrics", get(metrics_endpoint))
        .with_state(dispatcher)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// POST /invoke
async fn invoke(State(dispatcher): State<Dispatcher>, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            let result = dispatcher.reject_malformed(format!("invalid JSON: {e}"), None);
            return invocation_response(result);
        }
    };

    // Dropping this handler (client went away) cancels the invocation.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let task_dispatcher = dispatcher.clone();
    let task = tokio::spawn(async move {
        task_dispatcher
            .dispatch_json(raw, TransportKind::Http, cancel)
            .await
    });

    match task.await {
        Ok(result) => invocation_response(result),
        Err(e) => {
            error!(error = %e, "Invocation task failed");
            invocation_response(dispatcher.reject_malformed("invocation aborted", None))
        }
    }
}

/// GET /health
async fn health(State(dispatcher): State<Dispatcher>) -> Response {
    let report = dispatcher.health();
    let status =
        StatusCode::from_u16(report.status.as_http_status()).unwrap_or(StatusCode::OK);
    (status, Json(report)).into_response()
}

/// GET /tools
async fn list_tools(State(dispatcher): State<Dispatcher>) -> Json<Value> {
    Json(json!({ "tools": dispatcher.list_tools() }))
}

/// GET /metrics
async fn metrics_endpoint() -> Response {
    match metrics::render() {
        Ok(text) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], text).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn invocation_response(result: InvocationResult) -> Response {
    let status = match &result {
        InvocationResult::Success { .. } => StatusCode::OK,
        InvocationResult::Error { error, .. } => status_for(error),
    };
    (status, Json(result)).into_response()
}

/// HTTP status for an error envelope
pub fn status_for(error: &ErrorEnvelope) -> StatusCode {
    match (error.kind, error.code()) {
        (ErrorKind::ProtocolError, Some(codes::METHOD_NOT_FOUND)) => StatusCode::NOT_FOUND,
        (ErrorKind::ProtocolError, _) => StatusCode::BAD_REQUEST,
        (ErrorKind::ValidationError, _) => StatusCode::UNPROCESSABLE_ENTITY,
        (ErrorKind::DomainError, Some(codes::JOB_TIMED_OUT)) => StatusCode::GATEWAY_TIMEOUT,
        (ErrorKind::DomainError, _) => StatusCode::BAD_GATEWAY,
        (ErrorKind::InternalError, Some(codes::DEADLINE_EXCEEDED)) => StatusCode::GATEWAY_TIMEOUT,
        (ErrorKind::InternalError, _) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
