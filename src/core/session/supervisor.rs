//! Teardown coordination for the two relay loops.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::LoopExit;
use crate::core::realtime::RealtimeSession;
use crate::core::telephony::TelephonySender;

/// Which adapter closes were performed by the supervisor.
///
/// A `false` entry means the side had already been closed elsewhere (for
/// example a failed writer) by the time the supervisor got to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CloseOutcome {
    pub ai_closed: bool,
    pub telephony_closed: bool,
}

/// Turns the end of one relay loop into the shutdown of the other.
///
/// - telephony loop ended: close the AI session and cancel the loop scope
/// - AI loop ended: close the AI session; the telephony loop stops at its
///   next receive, or right away when the AI loop ended because telephony
///   was already gone
/// - external cancellation reaches both loops through the loop scope
///
/// [`finish`](Self::finish) closes whatever is still open. Every close is
/// idempotent so the order in which the hooks fire does not matter.
pub struct LifecycleSupervisor {
    session_id: String,
    scope: CancellationToken,
    ai: RealtimeSession,
    telephony: TelephonySender,
    ai_closed: AtomicBool,
}

impl LifecycleSupervisor {
    /// `parent` is the server-wide (or per-connection) cancellation token.
    pub fn new(
        session_id: impl Into<String>,
        parent: &CancellationToken,
        ai: RealtimeSession,
        telephony: TelephonySender,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            scope: parent.child_token(),
            ai,
            telephony,
            ai_closed: AtomicBool::new(false),
        }
    }

    /// Token both relay loops select on.
    pub fn loop_scope(&self) -> &CancellationToken {
        &self.scope
    }

    async fn close_ai(&self) {
        if self.ai.close().await {
            self.ai_closed.store(true, Ordering::SeqCst);
        }
    }

    pub async fn telephony_loop_ended(&self, exit: &LoopExit) {
        info!(session_id = %self.session_id, ?exit, "Telephony loop ended");
        self.scope.cancel();
        self.close_ai().await;
    }

    pub async fn ai_loop_ended(&self, exit: &LoopExit) {
        info!(session_id = %self.session_id, ?exit, "AI loop ended");
        self.close_ai().await;
        if *exit == LoopExit::CounterpartClosed {
            debug!(session_id = %self.session_id, "Telephony already gone, stopping telephony loop");
            self.scope.cancel();
        }
    }

    /// Close both sides. Call once both loops have returned.
    pub async fn finish(&self) -> CloseOutcome {
        self.close_ai().await;
        let telephony_closed = self.telephony.close().await;

        CloseOutcome {
            ai_closed: self.ai_closed.load(Ordering::SeqCst),
            telephony_closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::telephony::stream::from_parts;
    use crate::core::transport::Frame;
    use futures::StreamExt;
    use tokio::sync::mpsc;

    fn supervisor(parent: &CancellationToken) -> (LifecycleSupervisor, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(8);
        let (telephony, _receiver) = from_parts(futures::stream::empty().boxed(), tx.clone());
        let ai = RealtimeSession::new(tx);
        (LifecycleSupervisor::new("test", parent, ai, telephony), rx)
    }

    #[tokio::test]
    async fn test_telephony_end_cancels_scope_and_closes_ai() {
        let parent = CancellationToken::new();
        let (supervisor, mut rx) = supervisor(&parent);

        supervisor.telephony_loop_ended(&LoopExit::PeerClosed).await;
        assert!(supervisor.loop_scope().is_cancelled());
        assert!(!parent.is_cancelled());
        assert_eq!(rx.recv().await, Some(Frame::Close));

        let outcome = supervisor.finish().await;
        assert_eq!(
            outcome,
            CloseOutcome {
                ai_closed: true,
                telephony_closed: true
            }
        );
        assert_eq!(rx.recv().await, Some(Frame::Close));
    }

    #[tokio::test]
    async fn test_ai_end_leaves_telephony_loop_running() {
        let parent = CancellationToken::new();
        let (supervisor, _rx) = supervisor(&parent);

        supervisor.ai_loop_ended(&LoopExit::PeerClosed).await;
        assert!(!supervisor.loop_scope().is_cancelled());

        supervisor
            .ai_loop_ended(&LoopExit::CounterpartClosed)
            .await;
        assert!(supervisor.loop_scope().is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_scope() {
        let parent = CancellationToken::new();
        let (supervisor, _rx) = supervisor(&parent);

        parent.cancel();
        assert!(supervisor.loop_scope().is_cancelled());
    }
}
