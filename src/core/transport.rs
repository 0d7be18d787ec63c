//! Duplex frame transport shared by both sides of a call.
//!
//! Each websocket is split into an inbound stream of text frames and an
//! outbound [`FrameOutlet`]. The outlet owns the sending half of a bounded
//! channel drained by a writer task that holds the socket sink, so the
//! adapters never touch the socket directly and the close frame is emitted
//! at most once.

use std::fmt;

use futures::stream::BoxStream;
use futures_util::{Sink, SinkExt};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Channel capacity for outbound websocket frames.
pub const FRAME_CHANNEL_CAPACITY: usize = 256;

/// A frame queued for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close,
}

/// Error raised by the underlying socket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Inbound text frames. The stream ends when the peer closes the socket.
pub type InboundFrames = BoxStream<'static, Result<String, TransportError>>;

/// Outbound connection state, guarded inside each adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Returned by [`FrameOutlet::send_text`] once the outlet no longer accepts frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("outlet is {0}")]
pub struct OutletClosed(pub ConnectionState);

/// Sending half of a duplex connection.
///
/// The sender and the state are only changed together while the sender lock
/// is held; `state()` may be read without it.
pub struct FrameOutlet {
    sender: Mutex<Option<mpsc::Sender<Frame>>>,
    state: RwLock<ConnectionState>,
}

impl FrameOutlet {
    pub fn new(sender: mpsc::Sender<Frame>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
            state: RwLock::new(ConnectionState::Open),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Queue a text frame. Frames are written in the order they were queued.
    pub async fn send_text(&self, text: String) -> Result<(), OutletClosed> {
        let mut sender = self.sender.lock().await;
        let state = self.state();
        let Some(tx) = sender.as_ref().filter(|_| state == ConnectionState::Open) else {
            return Err(OutletClosed(state));
        };

        if tx.send(Frame::Text(text)).await.is_err() {
            // Writer task is gone: the socket failed underneath us.
            sender.take();
            *self.state.write() = ConnectionState::Closed;
            return Err(OutletClosed(ConnectionState::Closed));
        }
        Ok(())
    }

    /// Close the outlet. Returns `true` only for the call that emitted the close frame.
    pub async fn close(&self) -> bool {
        let mut sender = self.sender.lock().await;
        let Some(tx) = sender.take() else {
            *self.state.write() = ConnectionState::Closed;
            return false;
        };

        *self.state.write() = ConnectionState::Closing;
        let delivered = tx.send(Frame::Close).await.is_ok();
        *self.state.write() = ConnectionState::Closed;
        delivered
    }
}

/// Spawn the task that owns a socket sink and writes queued frames to it.
///
/// The task stops after writing a close frame, on the first write error, or
/// when every sender is dropped.
pub fn spawn_frame_writer<S, M>(
    mut sink: S,
    mut rx: mpsc::Receiver<Frame>,
    encode: fn(Frame) -> M,
) -> JoinHandle<()>
where
    S: Sink<M> + Unpin + Send + 'static,
    S::Error: fmt::Display,
    M: Send + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let closing = matches!(frame, Frame::Close);

            if let Err(e) = sink.send(encode(frame)).await {
                tracing::error!("Failed to write websocket frame: {}", e);
                break;
            }

            if closing {
                tracing::debug!("Close frame written");
                break;
            }
        }
    })
}
