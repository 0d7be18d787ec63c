//! Plivo media stream websocket handler
//!
//! Each accepted websocket carries exactly one call. The handler wraps it in
//! the telephony adapter and hands both halves to a [`SessionOrchestrator`].

use std::sync::Arc;

use axum::{
    extract::{State, ws::WebSocket, ws::WebSocketUpgrade},
    response::Response,
};
use tracing::{error, info};

use crate::core::session::SessionOrchestrator;
use crate::core::telephony::stream;
use crate::state::AppState;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Upgrade the Plivo stream connection to a websocket.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Media stream upgrade requested");

    // Held until the session has torn down, so shutdown can wait for it
    let task = state.tasks.token();

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            handle_media_stream(socket, state).await;
            drop(task);
        })
}

async fn handle_media_stream(socket: WebSocket, state: Arc<AppState>) {
    let orchestrator = SessionOrchestrator::new(
        stream::from_websocket(socket),
        state.connector.clone(),
        state.relay.clone(),
    );

    let session = orchestrator.session();
    let session_id = session.id().to_string();
    state.sessions.insert(session_id.clone(), session);
    info!(
        session_id = %session_id,
        active_sessions = state.active_sessions(),
        "Media stream connected"
    );

    match orchestrator.run(state.shutdown.child_token()).await {
        Ok(report) => info!(
            session_id = %session_id,
            stream_id = ?report.stream_id,
            telephony_exit = ?report.telephony_exit,
            ai_exit = ?report.ai_exit,
            "Media stream finished"
        ),
        Err(e) => error!(session_id = %session_id, "Media stream failed: {}", e),
    }

    state.sessions.remove(&session_id);
}
