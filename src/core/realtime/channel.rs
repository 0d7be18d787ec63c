//! The two halves of an open realtime session.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;

use super::base::{RealtimeError, RealtimeResult};
use super::openai::messages::{ClientEvent, ServerEvent};
use crate::core::transport::{ConnectionState, Frame, FrameOutlet, InboundFrames};

/// Sending half of a realtime session. Cheap to clone.
#[derive(Clone)]
pub struct RealtimeSession {
    outlet: Arc<FrameOutlet>,
}

impl RealtimeSession {
    pub fn new(frame_tx: mpsc::Sender<Frame>) -> Self {
        Self {
            outlet: Arc::new(FrameOutlet::new(frame_tx)),
        }
    }

    /// Send a client event. Fails with [`RealtimeError::ConnectionClosed`]
    /// once the session is no longer open; nothing is written in that case.
    pub async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        if !self.outlet.is_open() {
            return Err(RealtimeError::ConnectionClosed);
        }

        let json = serde_json::to_string(&event)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        tracing::trace!("Sending realtime event: {}", event.event_type());

        self.outlet
            .send_text(json)
            .await
            .map_err(|_| RealtimeError::ConnectionClosed)
    }

    /// Close the session. Returns `true` if this call performed the close.
    pub async fn close(&self) -> bool {
        let closed = self.outlet.close().await;
        if closed {
            tracing::debug!("Realtime session closed");
        }
        closed
    }

    pub fn state(&self) -> ConnectionState {
        self.outlet.state()
    }

    pub fn is_open(&self) -> bool {
        self.outlet.is_open()
    }
}

/// Receiving half of a realtime session.
pub struct RealtimeEvents {
    frames: InboundFrames,
    /// call_id -> function name, from `response.output_item.added`
    pending_function_calls: HashMap<String, String>,
}

impl RealtimeEvents {
    pub fn new(frames: InboundFrames) -> Self {
        Self {
            frames,
            pending_function_calls: HashMap::new(),
        }
    }

    /// Next server event, or `None` once the connection is gone.
    ///
    /// Frames that do not parse are yielded as [`RealtimeError::ProtocolError`].
    pub async fn next_event(&mut self) -> Option<RealtimeResult<ServerEvent>> {
        let frame = match self.frames.next().await? {
            Ok(text) => text,
            Err(e) => return Some(Err(RealtimeError::WebSocketError(e.to_string()))),
        };

        let event = match serde_json::from_str::<ServerEvent>(&frame) {
            Ok(event) => event,
            Err(e) => {
                return Some(Err(RealtimeError::ProtocolError(format!("{e} - {frame}"))));
            }
        };

        Some(Ok(self.track_function_calls(event)))
    }

    fn track_function_calls(&mut self, event: ServerEvent) -> ServerEvent {
        match event {
            ServerEvent::OutputItemAdded { ref item } => {
                if item.item_type == "function_call"
                    && let (Some(call_id), Some(name)) = (&item.call_id, &item.name)
                {
                    tracing::debug!("Tracking function call: call_id={}, name={}", call_id, name);
                    self.pending_function_calls
                        .insert(call_id.clone(), name.clone());
                }
                event
            }
            ServerEvent::FunctionCallArgumentsDone {
                name,
                call_id,
                item_id,
                arguments,
            } => {
                let tracked = self.pending_function_calls.remove(&call_id);
                ServerEvent::FunctionCallArgumentsDone {
                    name: name.or(tracked),
                    call_id,
                    item_id,
                    arguments,
                }
            }
            other => other,
        }
    }
}
