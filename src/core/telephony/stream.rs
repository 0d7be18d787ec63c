//! Plivo media stream adapter.
//!
//! Splits an accepted media stream websocket into a [`TelephonyReceiver`]
//! yielding parsed [`InboundTelephonyEvent`]s and a cloneable
//! [`TelephonySender`] for `playAudio` / `clearAudio` directives.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::future;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;

use super::messages::{InboundTelephonyEvent, OutboundTelephonyEvent};
use crate::core::transport::{
    ConnectionState, FRAME_CHANNEL_CAPACITY, Frame, FrameOutlet, InboundFrames, TransportError,
    spawn_frame_writer,
};

/// Errors surfaced by the telephony adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelephonyError {
    /// The media stream is closed, either by the peer or locally
    #[error("Telephony connection closed")]
    ConnectionClosed,

    /// The socket failed
    #[error("Telephony transport error: {0}")]
    Transport(String),

    /// A frame could not be parsed; the frame is dropped
    #[error("Malformed telephony event: {0}")]
    Protocol(String),
}

/// Result type for telephony operations.
pub type TelephonyResult<T> = Result<T, TelephonyError>;

/// Receiving half of a media stream.
pub struct TelephonyReceiver {
    frames: InboundFrames,
}

impl TelephonyReceiver {
    /// Wait for the next inbound event.
    pub async fn receive(&mut self) -> TelephonyResult<InboundTelephonyEvent> {
        match self.frames.next().await {
            None => Err(TelephonyError::ConnectionClosed),
            Some(Err(e)) => Err(TelephonyError::Transport(e.to_string())),
            Some(Ok(text)) => serde_json::from_str(&text)
                .map_err(|e| TelephonyError::Protocol(format!("{e} - {text}"))),
        }
    }
}

/// Sending half of a media stream.
#[derive(Clone)]
pub struct TelephonySender {
    outlet: Arc<FrameOutlet>,
}

impl TelephonySender {
    /// Queue an audio frame for playback on the call.
    pub async fn send_audio(
        &self,
        payload: impl Into<String>,
        sample_rate: u32,
        content_type: &str,
    ) -> TelephonyResult<()> {
        self.send_event(&OutboundTelephonyEvent::play_audio(
            payload,
            sample_rate,
            content_type,
        ))
        .await
    }

    /// Ask Plivo to drop any audio still queued for playback.
    pub async fn send_clear(&self, stream_id: &str) -> TelephonyResult<()> {
        self.send_event(&OutboundTelephonyEvent::clear_audio(stream_id))
            .await
    }

    pub async fn send_event(&self, event: &OutboundTelephonyEvent) -> TelephonyResult<()> {
        if !self.outlet.is_open() {
            return Err(TelephonyError::ConnectionClosed);
        }
        let json = serde_json::to_string(event)
            .map_err(|e| TelephonyError::Protocol(e.to_string()))?;
        self.outlet
            .send_text(json)
            .await
            .map_err(|_| TelephonyError::ConnectionClosed)
    }

    /// Close the media stream. Returns `true` if this call performed the close.
    pub async fn close(&self) -> bool {
        let closed = self.outlet.close().await;
        if closed {
            tracing::debug!("Telephony stream closed");
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

/// Split an accepted media stream websocket into its two halves.
pub fn from_websocket(socket: WebSocket) -> (TelephonySender, TelephonyReceiver) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

    spawn_frame_writer(sink, rx, |frame| match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Close => Message::Close(None),
    });

    let frames = stream
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError(e.to_string()))),
            }
        })
        .boxed();

    from_parts(frames, tx)
}

/// Build the adapter from an inbound frame stream and an outbound frame channel.
pub fn from_parts(
    frames: InboundFrames,
    frame_tx: mpsc::Sender<Frame>,
) -> (TelephonySender, TelephonyReceiver) {
    (
        TelephonySender {
            outlet: Arc::new(FrameOutlet::new(frame_tx)),
        },
        TelephonyReceiver { frames },
    )
}
