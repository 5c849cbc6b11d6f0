//! Integration tests for the stdio binding
//!
//! The frame loop runs over in-memory duplex pipes standing in for the
//! process's stdin and stdout.

use mediagate_core::ProviderStatus;
use mediagate_testing::{GatewayHarness, ScriptedProvider, mock_providers::video_output};
use mediagate_transport::stdio;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Session {
    input: Option<DuplexStream>,
    output: Lines<BufReader<DuplexStream>>,
    server: JoinHandle<Result<(), mediagate_transport::TransportError>>,
    shutdown: CancellationToken,
}

impl Session {
    fn start(harness: &GatewayHarness) -> Self {
        let (input, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, output) = tokio::io::duplex(64 * 1024);
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(stdio::run(
            harness.dispatcher().clone(),
            server_in,
            server_out,
            shutdown.clone(),
        ));
        Self {
            input: Some(input),
            output: BufReader::new(output).lines(),
            server,
            shutdown,
        }
    }

    async fn send(&mut self, line: &str) {
        let input = self.input.as_mut().unwrap();
        input.write_all(line.as_bytes()).await.unwrap();
        input.write_all(b"\n").await.unwrap();
    }

    async fn send_frame(&mut self, frame: Value) {
        self.send(&frame.to_string()).await;
    }

    async fn reply(&mut self) -> Value {
        let line = self.output.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    fn close_input(&mut self) {
        self.input.take();
    }
}

#[tokio::test(start_paused = true)]
async fn test_invoke_frame_echoes_id() {
    let harness = GatewayHarness::builder()
        .with_provider(ScriptedProvider::succeeding_after(
            "sp",
            2,
            video_output("https://cdn.test/clip.mp4", 4.0),
        ))
        .build()
        .unwrap();
    let mut session = Session::start(&harness);

    session
        .send_frame(json!({
            "id": 41,
            "method": "invoke",
            "params": {
                "tool": "vid_generate",
                "arguments": {"prompt": "waves at dusk", "wait": true}
            }
        }))
        .await;

    let reply = session.reply().await;
    assert_eq!(reply["id"], 41);
    assert_eq!(reply["result"]["status"], "success");
    let content = reply["result"]["content"].as_array().unwrap();
    assert_eq!(content[0]["type"], "video");
    assert_eq!(content[0]["url"], "https://cdn.test/clip.mp4");
    assert_eq!(content.last().unwrap()["job"]["state"], "SUCCEEDED");
}

#[tokio::test]
async fn test_list_tools_and_health() {
    let harness = GatewayHarness::builder().build().unwrap();
    let mut session = Session::start(&harness);

    session.send_frame(json!({"id": "a", "method": "list_tools"})).await;
    let reply = session.reply().await;
    assert_eq!(reply["id"], "a");
    assert_eq!(reply["result"]["tools"].as_array().unwrap().len(), 6);

    session.send_frame(json!({"id": "b", "method": "health"})).await;
    let reply = session.reply().await;
    assert_eq!(reply["id"], "b");
    assert_eq!(reply["result"]["status"], "healthy");
    assert_eq!(reply["result"]["tools"], 6);
}

#[tokio::test]
async fn test_unreadable_frame_gets_null_id() {
    let harness = GatewayHarness::builder().build().unwrap();
    let mut session = Session::start(&harness);

    session.send("this is not json").await;
    let reply = session.reply().await;
    assert_eq!(reply["id"], Value::Null);
    assert_eq!(reply["result"]["status"], "error");
    assert_eq!(reply["result"]["error"]["kind"], "protocol_error");
    assert_eq!(reply["result"]["error"]["code"], "malformed_request");

    // the session keeps going afterwards
    session.send_frame(json!({"id": 2, "method": "health"})).await;
    assert_eq!(session.reply().await["id"], 2);
}

#[tokio::test]
async fn test_unknown_method_and_bad_params() {
    let harness = GatewayHarness::builder().build().unwrap();
    let mut session = Session::start(&harness);

    session.send_frame(json!({"id": 7, "method": "subscribe"})).await;
    let reply = session.reply().await;
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["result"]["error"]["kind"], "protocol_error");
    assert!(
        reply["result"]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("subscribe")
    );

    session
        .send_frame(json!({"id": 8, "method": "invoke", "params": {"arguments": {}}}))
        .await;
    let reply = session.reply().await;
    assert_eq!(reply["id"], 8);
    assert_eq!(reply["result"]["error"]["code"], "malformed_request");
}

#[tokio::test]
async fn test_unknown_tool_over_stdio() {
    let harness = GatewayHarness::builder().build().unwrap();
    let mut session = Session::start(&harness);

    session
        .send_frame(json!({
            "id": 3,
            "method": "invoke",
            "params": {"tool": "txt_summarize", "arguments": {}}
        }))
        .await;
    let reply = session.reply().await;
    assert_eq!(reply["result"]["error"]["kind"], "protocol_error");
    assert_eq!(reply["result"]["error"]["code"], "method_not_found");
    assert_eq!(reply["result"]["error"]["retryable"], false);
}

#[tokio::test(start_paused = true)]
async fn test_end_of_input_cancels_in_flight_wait() {
    let provider = ScriptedProvider::new("sp").with_job("stuck-1", vec![Ok(ProviderStatus::Pending)]);
    let harness = GatewayHarness::builder()
        .with_provider(provider)
        .build()
        .unwrap();
    let mut session = Session::start(&harness);

    session
        .send_frame(json!({
            "id": "w",
            "method": "invoke",
            "params": {"tool": "vid_job_wait", "arguments": {"job_id": "stuck-1"}}
        }))
        .await;
    session.close_input();

    let reply = session.reply().await;
    assert_eq!(reply["id"], "w");
    assert_eq!(reply["result"]["error"]["code"], "cancelled");

    session.server.await.unwrap().unwrap();
    assert!(session.output.next_line().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_replies_follow_completion_order() {
    let provider = ScriptedProvider::new("sp").with_job(
        "slow-1",
        vec![
            Ok(ProviderStatus::Pending),
            Ok(ProviderStatus::Running { progress: Some(0.5) }),
            Ok(ProviderStatus::Succeeded {
                output: video_output("https://cdn.test/slow.mp4", 3.0),
            }),
        ],
    );
    let harness = GatewayHarness::builder()
        .with_provider(provider)
        .build()
        .unwrap();
    let mut session = Session::start(&harness);

    let slow = json!({
        "id": "slow",
        "method": "invoke",
        "params": {"tool": "vid_job_wait", "arguments": {"job_id": "slow-1"}}
    });
    let fast = json!({
        "id": "fast",
        "method": "invoke",
        "params": {"tool": "img_generate", "arguments": {}}
    });
    session.send(&format!("{slow}\n{fast}")).await;

    let first = session.reply().await;
    assert_eq!(first["id"], "fast");
    assert_eq!(first["result"]["error"]["kind"], "validation_error");

    let second = session.reply().await;
    assert_eq!(second["id"], "slow");
    assert_eq!(second["result"]["status"], "success");
    assert_eq!(harness.provider().checks_for("slow-1"), 3);
}

#[tokio::test]
async fn test_shutdown_stops_the_loop() {
    let harness = GatewayHarness::builder().build().unwrap();
    let mut session = Session::start(&harness);

    session.send_frame(json!({"id": 1, "method": "health"})).await;
    assert_eq!(session.reply().await["id"], 1);

    session.shutdown.cancel();
    session.server.await.unwrap().unwrap();
}
