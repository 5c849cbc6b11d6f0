//! Newline-framed JSON over standard streams.
//!
//! Each input line is one frame:
//!
//! ```json
//! {"id": 1, "method": "invoke", "params": {"tool": "img_generate", "arguments": {"prompt": "a fox"}}}
//! {"id": 2, "method": "list_tools"}
//! {"id": 3, "method": "health"}
//! ```
//!
//! and each output line is `{"id": <echoed>, "result": <payload>}`. Invocations
//! run concurrently, so replies come back in completion order. A frame that
//! cannot be read gets a `ProtocolError` result with `id: null` unless an id
//! could be recovered from it.
//!
//! Stdout carries frames only; logs go to stderr. End of input cancels
//! whatever is still running and waits for the cancelled invocations to
//! report back before returning.

use crate::{TransportBinding, TransportError};
use async_trait::async_trait;
use mediagate_core::{Dispatcher, TransportKind};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
struct Frame {
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct Reply {
    id: Value,
    result: Value,
}

/// Serves the gateway on this process's stdin and stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioBinding;

#[async_trait]
impl TransportBinding for StdioBinding {
    fn name(&self) -> &'static str {
        "stdio"
    }

    async fn serve(
        self: Box<Self>,
        dispatcher: Dispatcher,
        shutdown: CancellationToken,
    ) -> Result<(), TransportError> {
        info!("Stdio transport ready");
        run(dispatcher, tokio::io::stdin(), tokio::io::stdout(), shutdown).await
    }
}

/// Run the frame loop over any reader and writer until end of input or
/// `shutdown`.
pub async fn run<R, W>(
    dispatcher: Dispatcher,
    reader: R,
    writer: W,
    shutdown: CancellationToken,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<Reply>();
    let writer_task = tokio::spawn(write_replies(writer, rx));

    let session = shutdown.child_token();
    let mut inflight = JoinSet::new();
    let mut lines = BufReader::new(reader).lines();

    let outcome = loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Stdio transport shutting down");
                break Ok(());
            }
            next = lines.next_line() => next,
        };

        match next {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                handle_line(line, &dispatcher, &session, &tx, &mut inflight);
            }
            Ok(None) => {
                info!("Stdin closed");
                break Ok(());
            }
            Err(e) => {
                error!(error = %e, "Failed to read from stdin");
                break Err(TransportError::Io(e));
            }
        }

        while let Some(done) = inflight.try_join_next() {
            log_join(done);
        }
    };

    if !inflight.is_empty() {
        info!(inflight = inflight.len(), "Cancelling in-flight invocations");
    }
    session.cancel();
    while let Some(done) = inflight.join_next().await {
        log_join(done);
    }

    drop(tx);
    match writer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "Failed to write to stdout");
            return Err(TransportError::Io(e));
        }
        Err(e) => return Err(TransportError::Serve(e.to_string())),
    }

    outcome
}

fn handle_line(
    line: &str,
    dispatcher: &Dispatcher,
    session: &CancellationToken,
    tx: &mpsc::UnboundedSender<Reply>,
    inflight: &mut JoinSet<()>,
) {
    let raw: Value = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Unreadable frame");
            let result = dispatcher.reject_malformed(format!("invalid JSON: {e}"), None);
            send(tx, Value::Null, to_value(&result));
            return;
        }
    };

    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let Frame { method, params } = match serde_json::from_value(raw) {
        Ok(frame) => frame,
        Err(e) => {
            let result = dispatcher.reject_malformed(format!("invalid frame: {e}"), None);
            send(tx, id, to_value(&result));
            return;
        }
    };

    debug!(method = %method, id = %id, "Frame received");
    match method.as_str() {
        "invoke" => {
            let dispatcher = dispatcher.clone();
            let cancel = session.child_token();
            let tx = tx.clone();
            inflight.spawn(async move {
                let result = dispatcher
                    .dispatch_json(params, TransportKind::Stdio, cancel)
                    .await;
                send(&tx, id, to_value(&result));
            });
        }
        "list_tools" => send(tx, id, json!({ "tools": dispatcher.list_tools() })),
        "health" => send(tx, id, to_value(&dispatcher.health())),
        other => {
            let result = dispatcher.reject_malformed(format!("unknown method `{other}`"), None);
            send(tx, id, to_value(&result));
        }
    }
}

async fn write_replies<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Reply>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = rx.recv().await {
        let mut line = match serde_json::to_vec(&reply) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to encode reply");
                continue;
            }
        };
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

fn send(tx: &mpsc::UnboundedSender<Reply>, id: Value, result: Value) {
    if tx.send(Reply { id, result }).is_err() {
        warn!("Reply dropped, writer already closed");
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        error!(error = %e, "Failed to encode result");
        Value::Null
    })
}

fn log_join(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        error!(error = %e, "Invocation task failed");
    }
}
