//! Session Relay Tests
//!
//! Drives a full `SessionOrchestrator` with in-memory transports on both
//! sides. Telephony and realtime outbound frames share one channel so the
//! relative order of writes across the two connections is observable: realtime
//! frames carry a `type` field, telephony frames an `event` field.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use call_bridge::core::realtime::{
    OpenAIRealtime, RealtimeConfig, RealtimeConnector, RealtimeError, RealtimeEvents,
    RealtimeResult, RealtimeSession,
};
use call_bridge::core::session::{
    LoopExit, RelaySettings, SessionError, SessionOrchestrator, SessionPhase, SessionReport,
    SessionResult,
};
use call_bridge::core::telephony::stream::from_parts;
use call_bridge::core::tools::ToolRegistry;
use call_bridge::core::transport::{Frame, TransportError};

const WAIT: Duration = Duration::from_secs(2);

type FrameFeed = UnboundedSender<Result<String, TransportError>>;

/// Connector handing out a pre-built realtime session once.
struct ScriptedConnector {
    parts: Mutex<Option<(RealtimeSession, RealtimeEvents)>>,
}

#[async_trait]
impl RealtimeConnector for ScriptedConnector {
    async fn connect(&self) -> RealtimeResult<(RealtimeSession, RealtimeEvents)> {
        self.parts
            .lock()
            .take()
            .ok_or_else(|| RealtimeError::ConnectionFailed("mock refused".to_string()))
    }
}

fn relay_settings(report_tool_errors: bool) -> RelaySettings {
    let mut config = RealtimeConfig::default();
    config.api_key = "sk-test".to_string();
    config.temperature = 1.1;
    let tools = ToolRegistry::with_builtin_tools();
    let session = OpenAIRealtime::new(config)
        .unwrap()
        .build_session_config(tools.definitions());

    RelaySettings {
        session: Arc::new(session),
        tools: Arc::new(tools),
        report_tool_errors,
    }
}

struct Harness {
    plivo: FrameFeed,
    ai: FrameFeed,
    out: mpsc::Receiver<Frame>,
    shutdown: CancellationToken,
    task: JoinHandle<SessionResult<SessionReport>>,
}

impl Harness {
    fn start(report_tool_errors: bool) -> Self {
        Self::start_with(report_tool_errors, true)
    }

    fn start_with(report_tool_errors: bool, ai_reachable: bool) -> Self {
        let (frame_tx, out) = mpsc::channel(256);
        let (plivo, plivo_frames) = unbounded();
        let (ai, ai_frames) = unbounded();

        let telephony = from_parts(plivo_frames.boxed(), frame_tx.clone());
        let parts = ai_reachable.then(|| {
            (
                RealtimeSession::new(frame_tx),
                RealtimeEvents::new(ai_frames.boxed()),
            )
        });
        let connector = Arc::new(ScriptedConnector {
            parts: Mutex::new(parts),
        });

        let orchestrator =
            SessionOrchestrator::new(telephony, connector, relay_settings(report_tool_errors));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(orchestrator.run(shutdown.clone()));

        Self {
            plivo,
            ai,
            out,
            shutdown,
            task,
        }
    }

    /// Start a session and consume the initial `session.update`.
    async fn started(report_tool_errors: bool) -> Self {
        let mut harness = Self::start(report_tool_errors);
        let update = harness.next_json().await;
        assert_eq!(update["type"], "session.update");
        harness
    }

    fn plivo_send(&self, value: Value) {
        self.plivo.unbounded_send(Ok(value.to_string())).unwrap();
    }

    fn ai_send(&self, value: Value) {
        self.ai.unbounded_send(Ok(value.to_string())).unwrap();
    }

    async fn next_frame(&mut self) -> Frame {
        timeout(WAIT, self.out.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("frame channel closed")
    }

    async fn next_json(&mut self) -> Value {
        match self.next_frame().await {
            Frame::Text(text) => serde_json::from_str(&text).unwrap(),
            Frame::Close => panic!("expected a text frame, got close"),
        }
    }

    async fn expect_close(&mut self) {
        assert_eq!(self.next_frame().await, Frame::Close);
    }

    async fn expect_silence(&mut self) {
        assert!(
            timeout(Duration::from_millis(100), self.out.recv())
                .await
                .is_err(),
            "unexpected frame"
        );
    }

    /// Drop the telephony connection, as when the caller hangs up.
    fn disconnect_plivo(&mut self) {
        let (detached, _) = unbounded();
        drop(std::mem::replace(&mut self.plivo, detached));
    }

    /// Drop the realtime connection from the provider side.
    fn disconnect_ai(&mut self) {
        let (detached, _) = unbounded();
        drop(std::mem::replace(&mut self.ai, detached));
    }

    /// Hang up the call and collect the report.
    async fn hang_up(mut self) -> SessionReport {
        self.disconnect_plivo();
        self.expect_close_pair().await;
        timeout(WAIT, self.task)
            .await
            .expect("session did not finish")
            .unwrap()
            .unwrap()
    }

    async fn expect_close_pair(&mut self) {
        self.expect_close().await;
        self.expect_close().await;
    }
}

fn media(payload: &str) -> Value {
    json!({"event": "media", "media": {"payload": payload}})
}

fn start(stream_id: &str) -> Value {
    json!({"event": "start", "start": {"streamId": stream_id, "callId": "call-1"}})
}

#[tokio::test]
async fn test_session_update_is_first_and_carries_tools() {
    let mut harness = Harness::start(false);

    let update = harness.next_json().await;
    assert_eq!(update["type"], "session.update");
    let session = &update["session"];
    assert_eq!(session["turn_detection"]["type"], "server_vad");
    assert_eq!(session["input_audio_format"], "g711_ulaw");
    assert_eq!(session["output_audio_format"], "g711_ulaw");
    assert_eq!(session["voice"], "alloy");
    assert_eq!(session["modalities"], json!(["text", "audio"]));
    assert!((session["temperature"].as_f64().unwrap() - 1.1).abs() < 1e-6);
    assert_eq!(session["tools"][0]["type"], "function");
    assert_eq!(session["tools"][0]["name"], "calc_sum");
    assert_eq!(
        session["tools"][0]["parameters"]["required"],
        json!(["num1", "num2"])
    );

    harness.hang_up().await;
}

#[tokio::test]
async fn test_media_forwarded_in_order() {
    let mut harness = Harness::started(false).await;

    harness.plivo_send(start("S1"));
    for payload in ["AAA=", "BBB=", "CCC="] {
        harness.plivo_send(media(payload));
    }

    for payload in ["AAA=", "BBB=", "CCC="] {
        let append = harness.next_json().await;
        assert_eq!(append["type"], "input_audio_buffer.append");
        assert_eq!(append["audio"], payload);
    }

    let report = harness.hang_up().await;
    assert_eq!(report.stream_id.as_deref(), Some("S1"));
    assert_eq!(report.stats.audio_frames_to_ai, 3);
    assert_eq!(report.telephony_exit, LoopExit::PeerClosed);
    assert_eq!(report.ai_exit, LoopExit::Cancelled);
    assert!(report.closes.ai_closed);
    assert!(report.closes.telephony_closed);
}

#[tokio::test]
async fn test_audio_delta_becomes_play_audio() {
    let mut harness = Harness::started(false).await;

    harness.ai_send(json!({"type": "response.audio.delta", "response_id": "r1", "item_id": "i1", "delta": "BBB="}));

    let play = harness.next_json().await;
    assert_eq!(play["event"], "playAudio");
    assert_eq!(play["media"]["contentType"], "audio/x-mulaw");
    assert_eq!(play["media"]["sampleRate"], 8000);
    assert_eq!(play["media"]["payload"], "BBB=");

    let report = harness.hang_up().await;
    assert_eq!(report.stats.audio_frames_to_telephony, 1);
}

#[tokio::test]
async fn test_barge_in_clears_before_cancel() {
    let mut harness = Harness::started(false).await;

    harness.plivo_send(start("S1"));
    harness.plivo_send(media("AAA="));
    assert_eq!(harness.next_json().await["audio"], "AAA=");

    harness.ai_send(json!({"type": "input_audio_buffer.speech_started", "audio_start_ms": 120, "item_id": "i1"}));

    let clear = harness.next_json().await;
    assert_eq!(clear, json!({"event": "clearAudio", "stream_id": "S1"}));
    let cancel = harness.next_json().await;
    assert_eq!(cancel, json!({"type": "response.cancel"}));

    let report = harness.hang_up().await;
    assert_eq!(report.stats.barge_ins, 1);
}

#[tokio::test]
async fn test_barge_in_without_stream_id_skips_clear() {
    let mut harness = Harness::started(false).await;

    harness.ai_send(json!({"type": "input_audio_buffer.speech_started"}));

    let cancel = harness.next_json().await;
    assert_eq!(cancel["type"], "response.cancel");

    harness.hang_up().await;
}

#[tokio::test]
async fn test_calc_sum_call_returns_output_then_response() {
    let mut harness = Harness::started(false).await;

    harness.ai_send(json!({
        "type": "response.output_item.added",
        "item": {"id": "item-1", "type": "function_call", "call_id": "call-7", "name": "calc_sum"}
    }));
    harness.ai_send(json!({
        "type": "response.function_call_arguments.done",
        "call_id": "call-7",
        "item_id": "item-1",
        "arguments": "{\"num1\":\"3\",\"num2\":\"4\"}"
    }));

    let create = harness.next_json().await;
    assert_eq!(create["type"], "conversation.item.create");
    assert_eq!(create["item"]["type"], "function_call_output");
    assert_eq!(create["item"]["id"], "item-1");
    assert_eq!(create["item"]["call_id"], "call-7");
    assert_eq!(create["item"]["output"], "7");

    let response = harness.next_json().await;
    assert_eq!(response["type"], "response.create");
    assert_eq!(response["response"]["modalities"], json!(["text", "audio"]));
    // Fixed continue temperature, independent of the session's 1.1
    assert!((response["response"]["temperature"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    assert_eq!(
        response["response"]["instructions"],
        "Please share the sum from the function call output with the user"
    );

    let report = harness.hang_up().await;
    assert_eq!(report.stats.tool_calls, 1);
}

#[tokio::test]
async fn test_invalid_tool_arguments_send_nothing() {
    let mut harness = Harness::started(false).await;

    harness.ai_send(json!({
        "type": "response.function_call_arguments.done",
        "name": "calc_sum",
        "call_id": "call-8",
        "item_id": "item-2",
        "arguments": "{\"num1\":\"a\",\"num2\":\"1\"}"
    }));
    harness.ai_send(json!({
        "type": "response.function_call_arguments.done",
        "name": "launch_rockets",
        "call_id": "call-9",
        "item_id": "item-3",
        "arguments": "{}"
    }));
    harness.expect_silence().await;

    // The session keeps relaying afterwards
    harness.ai_send(json!({"type": "response.audio.delta", "delta": "CCC="}));
    assert_eq!(harness.next_json().await["media"]["payload"], "CCC=");

    harness.hang_up().await;
}

#[tokio::test]
async fn test_tool_errors_reported_when_enabled() {
    let mut harness = Harness::started(true).await;

    harness.ai_send(json!({
        "type": "response.function_call_arguments.done",
        "name": "calc_sum",
        "call_id": "call-8",
        "item_id": "item-2",
        "arguments": "{\"num1\":\"a\",\"num2\":\"1\"}"
    }));

    let create = harness.next_json().await;
    assert_eq!(create["type"], "conversation.item.create");
    let output: Value =
        serde_json::from_str(create["item"]["output"].as_str().unwrap()).unwrap();
    assert!(output["error"].as_str().unwrap().contains("num1"));

    let response = harness.next_json().await;
    assert_eq!(response["type"], "response.create");
    assert!(response["response"].get("instructions").is_none());

    harness.hang_up().await;
}

#[tokio::test]
async fn test_unknown_and_malformed_events_ignored() {
    let mut harness = Harness::started(false).await;

    harness.plivo_send(json!({"event": "dtmf", "dtmf": {"digit": "5"}}));
    harness.plivo.unbounded_send(Ok("not json".to_string())).unwrap();
    harness.plivo_send(json!({"event": "stop"}));
    harness.ai_send(json!({"type": "rate_limits.updated", "rate_limits": []}));
    harness.ai_send(json!({"type": "response.done"}));
    harness.ai.unbounded_send(Ok("{".to_string())).unwrap();
    harness.expect_silence().await;

    harness.plivo_send(media("AAA="));
    assert_eq!(harness.next_json().await["type"], "input_audio_buffer.append");
    harness.ai_send(json!({"type": "response.audio.delta", "delta": "BBB="}));
    assert_eq!(harness.next_json().await["event"], "playAudio");

    harness.hang_up().await;
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let mut harness = Harness::started(false).await;

    harness.plivo_send(start("S1"));
    harness.plivo_send(media("AAA="));
    assert_eq!(
        harness.next_json().await,
        json!({"type": "input_audio_buffer.append", "audio": "AAA="})
    );

    harness.ai_send(json!({"type": "response.audio.delta", "delta": "BBB="}));
    harness.ai_send(json!({"type": "input_audio_buffer.speech_started"}));

    let play = harness.next_json().await;
    assert_eq!(play["event"], "playAudio");
    assert_eq!(play["media"]["payload"], "BBB=");
    assert_eq!(
        harness.next_json().await,
        json!({"event": "clearAudio", "stream_id": "S1"})
    );
    assert_eq!(harness.next_json().await, json!({"type": "response.cancel"}));

    let report = harness.hang_up().await;
    assert_eq!(report.stream_id.as_deref(), Some("S1"));
    assert_eq!(report.stats.audio_frames_to_ai, 1);
    assert_eq!(report.stats.audio_frames_to_telephony, 1);
    assert_eq!(report.stats.barge_ins, 1);
}

#[tokio::test]
async fn test_connect_failure_closes_telephony() {
    let mut harness = Harness::start_with(false, false);

    harness.expect_close().await;
    let result = timeout(WAIT, harness.task).await.unwrap().unwrap();
    assert!(matches!(
        result,
        Err(SessionError::Realtime(RealtimeError::ConnectionFailed(_)))
    ));
}

#[tokio::test]
async fn test_shutdown_closes_both_sides() {
    let mut harness = Harness::started(false).await;

    harness.shutdown.cancel();
    harness.expect_close_pair().await;

    let report = timeout(WAIT, harness.task).await.unwrap().unwrap().unwrap();
    assert_eq!(report.telephony_exit, LoopExit::Cancelled);
    assert_eq!(report.ai_exit, LoopExit::Cancelled);
    assert!(report.closes.ai_closed);
    assert!(report.closes.telephony_closed);
}

#[tokio::test]
async fn test_ai_disconnect_ends_telephony_on_next_receive() {
    let mut harness = Harness::started(false).await;

    harness.disconnect_ai();
    // AI side closed as soon as its loop sees the disconnect
    harness.expect_close().await;

    harness.plivo_send(media("AAA="));

    // Nothing is appended to the closed session; telephony is closed instead
    harness.expect_close().await;
    let report = timeout(WAIT, harness.task).await.unwrap().unwrap().unwrap();
    assert_eq!(report.ai_exit, LoopExit::PeerClosed);
    assert_eq!(report.telephony_exit, LoopExit::CounterpartClosed);
    assert_eq!(report.stats.audio_frames_to_ai, 0);
}

#[tokio::test]
async fn test_closed_realtime_write_is_peer_closed() {
    let (telephony_tx, mut telephony_out) = mpsc::channel(16);
    let (ai_tx, mut ai_out) = mpsc::channel(16);
    let (plivo, plivo_frames) = unbounded::<Result<String, TransportError>>();
    let (ai, ai_frames) = unbounded::<Result<String, TransportError>>();
    let connector = Arc::new(ScriptedConnector {
        parts: Mutex::new(Some((
            RealtimeSession::new(ai_tx),
            RealtimeEvents::new(ai_frames.boxed()),
        ))),
    });
    let orchestrator = SessionOrchestrator::new(
        from_parts(plivo_frames.boxed(), telephony_tx),
        connector,
        relay_settings(false),
    );
    let task = tokio::spawn(orchestrator.run(CancellationToken::new()));

    assert!(matches!(
        timeout(WAIT, ai_out.recv()).await.unwrap(),
        Some(Frame::Text(_))
    ));
    // The realtime writer goes away while the provider is still talking
    drop(ai_out);

    ai.unbounded_send(Ok(json!({
        "type": "response.function_call_arguments.done",
        "name": "calc_sum",
        "call_id": "call-1",
        "item_id": "item-1",
        "arguments": "{\"num1\":\"1\",\"num2\":\"2\"}"
    })
    .to_string()))
    .unwrap();
    // Let the realtime loop hit the failed write before caller audio arrives
    tokio::time::sleep(Duration::from_millis(100)).await;
    plivo.unbounded_send(Ok(media("AAA=").to_string())).unwrap();

    assert_eq!(
        timeout(WAIT, telephony_out.recv()).await.unwrap(),
        Some(Frame::Close)
    );
    let report = timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    assert_eq!(report.ai_exit, LoopExit::PeerClosed);
    assert_eq!(report.telephony_exit, LoopExit::CounterpartClosed);
}

#[tokio::test]
async fn test_phase_reaches_closed() {
    let (frame_tx, _out) = mpsc::channel(16);
    let (plivo, plivo_frames) = unbounded::<Result<String, TransportError>>();
    let (_ai, ai_frames) = unbounded::<Result<String, TransportError>>();
    let connector = Arc::new(ScriptedConnector {
        parts: Mutex::new(Some((
            RealtimeSession::new(frame_tx.clone()),
            RealtimeEvents::new(ai_frames.boxed()),
        ))),
    });
    let orchestrator = SessionOrchestrator::new(
        from_parts(plivo_frames.boxed(), frame_tx),
        connector,
        relay_settings(false),
    );
    let session = orchestrator.session();
    assert_eq!(session.phase(), SessionPhase::Connecting);

    drop(plivo);
    timeout(WAIT, orchestrator.run(CancellationToken::new()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.phase(), SessionPhase::Closed);
}
