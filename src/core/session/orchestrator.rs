//! Bidirectional relay between a Plivo media stream and a realtime AI session.

use std::sync::Arc;

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::supervisor::LifecycleSupervisor;
use super::{LoopExit, Session, SessionError, SessionPhase, SessionReport, SessionResult};
use crate::core::realtime::openai::config::DEFAULT_TEMPERATURE;
use crate::core::realtime::openai::messages::{
    ClientEvent, ConversationItem, ResponseConfig, ServerEvent, SessionConfig,
};
use crate::core::realtime::{
    RealtimeConnector, RealtimeError, RealtimeEvents, RealtimeResult, RealtimeSession,
};
use crate::core::telephony::{
    InboundTelephonyEvent, MULAW_CONTENT_TYPE, MULAW_SAMPLE_RATE, TelephonyError,
    TelephonyReceiver, TelephonySender,
};
use crate::core::tools::{ToolInvocation, ToolRegistry};

/// Per-process relay settings, shared by every session.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Sent as `session.update` before any audio
    pub session: Arc<SessionConfig>,
    pub tools: Arc<ToolRegistry>,
    /// Feed tool failures back to the model instead of dropping the call
    pub report_tool_errors: bool,
}

/// Open the AI session and send `session.update` as its first message.
pub async fn connect_and_initialize(
    connector: &dyn RealtimeConnector,
    config: &SessionConfig,
) -> RealtimeResult<(RealtimeSession, RealtimeEvents)> {
    let (session, events) = connector.connect().await?;

    if let Err(e) = session
        .send(ClientEvent::SessionUpdate {
            session: config.clone(),
        })
        .await
    {
        session.close().await;
        return Err(e);
    }

    Ok((session, events))
}

/// Drives one call from websocket accept to teardown.
pub struct SessionOrchestrator {
    session: Arc<Session>,
    telephony_tx: TelephonySender,
    telephony_rx: TelephonyReceiver,
    connector: Arc<dyn RealtimeConnector>,
    settings: RelaySettings,
}

impl SessionOrchestrator {
    pub fn new(
        telephony: (TelephonySender, TelephonyReceiver),
        connector: Arc<dyn RealtimeConnector>,
        settings: RelaySettings,
    ) -> Self {
        let (telephony_tx, telephony_rx) = telephony;
        Self {
            session: Arc::new(Session::new()),
            telephony_tx,
            telephony_rx,
            connector,
            settings,
        }
    }

    pub fn session(&self) -> Arc<Session> {
        self.session.clone()
    }

    /// Run the session to completion.
    ///
    /// Returns an error only when the AI session cannot be opened; the
    /// telephony side is closed before returning in that case. Every other
    /// failure ends the relay loops and is reported in the [`SessionReport`].
    pub async fn run(self, shutdown: CancellationToken) -> SessionResult<SessionReport> {
        let Self {
            session,
            telephony_tx,
            mut telephony_rx,
            connector,
            settings,
        } = self;

        info!(session_id = %session.id(), "Connecting realtime session");

        let (ai, mut ai_events) =
            match connect_and_initialize(connector.as_ref(), &settings.session).await {
                Ok(parts) => parts,
                Err(e) => {
                    error!(session_id = %session.id(), "Failed to open realtime session: {}", e);
                    session.advance(SessionPhase::Closing);
                    telephony_tx.close().await;
                    session.advance(SessionPhase::Closed);
                    return Err(SessionError::Realtime(e));
                }
            };

        session.advance(SessionPhase::Initialized);

        let supervisor =
            LifecycleSupervisor::new(session.id(), &shutdown, ai.clone(), telephony_tx.clone());
        let scope = supervisor.loop_scope().clone();

        session.advance(SessionPhase::Active);

        let telephony_loop = async {
            let exit = relay_telephony_to_ai(&session, &mut telephony_rx, &ai, &scope).await;
            supervisor.telephony_loop_ended(&exit).await;
            exit
        };

        let ai_loop = async {
            let exit = relay_ai_to_telephony(
                &session,
                &mut ai_events,
                &ai,
                &telephony_tx,
                &settings,
                &scope,
            )
            .await;
            supervisor.ai_loop_ended(&exit).await;
            exit
        };

        let (telephony_exit, ai_exit) = tokio::join!(telephony_loop, ai_loop);

        session.advance(SessionPhase::Closing);
        let closes = supervisor.finish().await;
        session.advance(SessionPhase::Closed);

        let report = SessionReport {
            session_id: session.id().to_string(),
            stream_id: session.stream_id().map(|id| id.as_ref().clone()),
            telephony_exit,
            ai_exit,
            closes,
            stats: session.stats().snapshot(),
        };
        info!(session_id = %report.session_id, stats = ?report.stats, "Session closed");

        Ok(report)
    }
}

// =============================================================================
// Telephony -> AI
// =============================================================================

async fn relay_telephony_to_ai(
    session: &Session,
    telephony: &mut TelephonyReceiver,
    ai: &RealtimeSession,
    scope: &CancellationToken,
) -> LoopExit {
    loop {
        let received = select! {
            _ = scope.cancelled() => return LoopExit::Cancelled,
            received = telephony.receive() => received,
        };

        let event = match received {
            Ok(event) => event,
            Err(TelephonyError::Protocol(e)) => {
                warn!(session_id = %session.id(), "Dropping telephony frame: {}", e);
                continue;
            }
            Err(TelephonyError::ConnectionClosed) => return LoopExit::PeerClosed,
            Err(TelephonyError::Transport(e)) => return LoopExit::TransportFailed(e),
        };

        if !ai.is_open() {
            debug!(session_id = %session.id(), "Realtime session closed, ending telephony loop");
            return LoopExit::CounterpartClosed;
        }

        match event {
            InboundTelephonyEvent::Media { media } => {
                let append = ClientEvent::InputAudioBufferAppend {
                    audio: media.payload,
                };
                if let Err(e) = ai.send(append).await {
                    debug!(session_id = %session.id(), "Audio append failed: {}", e);
                    return LoopExit::CounterpartClosed;
                }
                session.stats().record_audio_to_ai();
            }
            InboundTelephonyEvent::Start { start } => {
                info!(
                    session_id = %session.id(),
                    stream_id = %start.stream_id,
                    call_id = ?start.call_id,
                    "Incoming stream has started"
                );
                session.set_stream_id(start.stream_id);
            }
            InboundTelephonyEvent::Stop => {
                debug!(session_id = %session.id(), "Telephony stream stopped");
            }
            InboundTelephonyEvent::Other => {
                trace!(session_id = %session.id(), "Ignoring telephony event");
            }
        }
    }
}

// =============================================================================
// AI -> Telephony
// =============================================================================

async fn relay_ai_to_telephony(
    session: &Session,
    events: &mut RealtimeEvents,
    ai: &RealtimeSession,
    telephony: &TelephonySender,
    settings: &RelaySettings,
    scope: &CancellationToken,
) -> LoopExit {
    loop {
        let next = select! {
            _ = scope.cancelled() => return LoopExit::Cancelled,
            next = events.next_event() => next,
        };

        let event = match next {
            None => return LoopExit::PeerClosed,
            Some(Ok(event)) => event,
            Some(Err(RealtimeError::ProtocolError(e))) => {
                warn!(session_id = %session.id(), "Dropping realtime frame: {}", e);
                continue;
            }
            Some(Err(e)) => return LoopExit::TransportFailed(e.to_string()),
        };

        let step = match event {
            ServerEvent::AudioDelta { delta, .. } => {
                match telephony
                    .send_audio(delta, MULAW_SAMPLE_RATE, MULAW_CONTENT_TYPE)
                    .await
                {
                    Ok(()) => {
                        session.stats().record_audio_to_telephony();
                        Ok(())
                    }
                    Err(_) => Err(LoopExit::CounterpartClosed),
                }
            }
            ServerEvent::FunctionCallArgumentsDone {
                name,
                call_id,
                item_id,
                arguments,
            } => {
                handle_function_call(session, ai, settings, name, call_id, item_id, &arguments)
                    .await
            }
            ServerEvent::SpeechStarted { .. } => handle_barge_in(session, ai, telephony).await,
            ServerEvent::SessionCreated { session: created } => {
                info!(session_id = %session.id(), realtime_session = ?created.id, "Realtime session created");
                Ok(())
            }
            ServerEvent::SessionUpdated { .. } => {
                debug!(session_id = %session.id(), "Realtime session updated");
                Ok(())
            }
            ServerEvent::Error { error } => {
                error!(
                    session_id = %session.id(),
                    code = ?error.code,
                    "Realtime error: {} - {}",
                    error.error_type,
                    error.message
                );
                Ok(())
            }
            ServerEvent::OutputItemAdded { .. } | ServerEvent::Unknown => {
                trace!(session_id = %session.id(), "Ignoring realtime event");
                Ok(())
            }
        };

        if let Err(exit) = step {
            return exit;
        }
    }
}

/// Clear queued playback on the call, then cancel the in-flight response.
async fn handle_barge_in(
    session: &Session,
    ai: &RealtimeSession,
    telephony: &TelephonySender,
) -> Result<(), LoopExit> {
    session.stats().record_barge_in();

    match session.stream_id() {
        Some(stream_id) => {
            debug!(session_id = %session.id(), %stream_id, "Speech started, clearing playback");
            telephony
                .send_clear(&stream_id)
                .await
                .map_err(|_| LoopExit::CounterpartClosed)?;
        }
        None => {
            warn!(session_id = %session.id(), "Speech started before stream start, skipping clearAudio");
        }
    }

    ai.send(ClientEvent::ResponseCancel)
        .await
        .map_err(realtime_send_exit)
}

/// Exit for a failed write on the realtime session this loop reads from.
fn realtime_send_exit(e: RealtimeError) -> LoopExit {
    match e {
        RealtimeError::ConnectionClosed => LoopExit::PeerClosed,
        other => LoopExit::TransportFailed(other.to_string()),
    }
}

/// Dispatch a completed function call and feed the output back to the model.
async fn handle_function_call(
    session: &Session,
    ai: &RealtimeSession,
    settings: &RelaySettings,
    name: Option<String>,
    call_id: String,
    item_id: String,
    arguments: &str,
) -> Result<(), LoopExit> {
    session.stats().record_tool_call();

    let name = name.unwrap_or_else(|| {
        warn!(session_id = %session.id(), %call_id, "Function name not found for call");
        String::new()
    });
    info!(session_id = %session.id(), %call_id, tool = %name, "Function call requested");

    let dispatched = ToolInvocation::from_json_arguments(&name, &call_id, &item_id, arguments)
        .and_then(|invocation| settings.tools.dispatch(&invocation));

    let (output, follow_up) = match dispatched {
        Ok(result) => (result.output, result.follow_up),
        Err(e) if settings.report_tool_errors => {
            warn!(session_id = %session.id(), %call_id, "Function call failed, reporting: {}", e);
            (serde_json::json!({ "error": e.to_string() }).to_string(), None)
        }
        Err(e) => {
            warn!(session_id = %session.id(), %call_id, "Function call failed: {}", e);
            return Ok(());
        }
    };

    ai.send(ClientEvent::ConversationItemCreate {
        item: ConversationItem::function_call_output(item_id, call_id, output),
    })
    .await
    .map_err(realtime_send_exit)?;

    // The continue directive always uses the fixed defaults, not the session's
    ai.send(ClientEvent::ResponseCreate {
        response: Some(ResponseConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            temperature: Some(DEFAULT_TEMPERATURE),
            instructions: follow_up,
        }),
    })
    .await
    .map_err(realtime_send_exit)
}
