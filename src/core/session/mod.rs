//! Per-call relay session.
//!
//! One [`Session`] exists per accepted media stream. The
//! [`SessionOrchestrator`] drives it through
//! `Connecting -> Initialized -> Active -> Closing -> Closed`, running the
//! telephony-to-AI and AI-to-telephony loops concurrently while the
//! [`LifecycleSupervisor`] turns the end of either loop into an orderly
//! teardown of both sides.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use thiserror::Error;

use crate::core::realtime::RealtimeError;

pub mod orchestrator;
pub mod supervisor;

pub use orchestrator::{RelaySettings, SessionOrchestrator, connect_and_initialize};
pub use supervisor::{CloseOutcome, LifecycleSupervisor};

/// Errors returned by [`SessionOrchestrator::run`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The AI session could not be opened or initialized
    #[error("Realtime session failed: {0}")]
    Realtime(#[from] RealtimeError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Connecting,
    Initialized,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why a relay loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The side this loop reads from disconnected
    PeerClosed,
    /// The side this loop reads from failed
    TransportFailed(String),
    /// The side this loop writes to is gone
    CounterpartClosed,
    /// The loop scope was cancelled
    Cancelled,
}

/// Relay counters, updated by the loops.
#[derive(Debug, Default)]
pub struct SessionStats {
    audio_frames_to_ai: AtomicU64,
    audio_frames_to_telephony: AtomicU64,
    tool_calls: AtomicU64,
    barge_ins: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub audio_frames_to_ai: u64,
    pub audio_frames_to_telephony: u64,
    pub tool_calls: u64,
    pub barge_ins: u64,
}

impl SessionStats {
    pub fn record_audio_to_ai(&self) {
        self.audio_frames_to_ai.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_to_telephony(&self) {
        self.audio_frames_to_telephony
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_call(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_barge_in(&self) {
        self.barge_ins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            audio_frames_to_ai: self.audio_frames_to_ai.load(Ordering::Relaxed),
            audio_frames_to_telephony: self.audio_frames_to_telephony.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            barge_ins: self.barge_ins.load(Ordering::Relaxed),
        }
    }
}

/// State of one bridged call.
#[derive(Debug)]
pub struct Session {
    id: String,
    stream_id: ArcSwapOption<String>,
    phase: RwLock<SessionPhase>,
    stats: SessionStats,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stream_id: ArcSwapOption::empty(),
            phase: RwLock::new(SessionPhase::Connecting),
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Telephony stream id, unset until the `start` event arrives.
    pub fn stream_id(&self) -> Option<Arc<String>> {
        self.stream_id.load_full()
    }

    pub fn set_stream_id(&self, stream_id: String) {
        self.stream_id.store(Some(Arc::new(stream_id)));
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.read()
    }

    /// Move to `next`. Phases only move forward.
    pub fn advance(&self, next: SessionPhase) {
        let mut phase = self.phase.write();
        if next as u8 > *phase as u8 {
            tracing::debug!(session_id = %self.id, "Session {} -> {}", *phase, next);
            *phase = next;
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary returned once both sides are closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: String,
    pub stream_id: Option<String>,
    pub telephony_exit: LoopExit,
    pub ai_exit: LoopExit,
    pub closes: CloseOutcome,
    pub stats: StatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_only_move_forward() {
        let session = Session::new();
        assert_eq!(session.phase(), SessionPhase::Connecting);

        session.advance(SessionPhase::Active);
        session.advance(SessionPhase::Initialized);
        assert_eq!(session.phase(), SessionPhase::Active);

        session.advance(SessionPhase::Closed);
        assert_eq!(session.phase(), SessionPhase::Closed);
    }

    #[test]
    fn test_stream_id_unset_until_start() {
        let session = Session::new();
        assert!(session.stream_id().is_none());

        session.set_stream_id("S1".to_string());
        assert_eq!(session.stream_id().as_deref().map(String::as_str), Some("S1"));
    }

    #[test]
    fn test_stats_snapshot() {
        let session = Session::new();
        session.stats().record_audio_to_ai();
        session.stats().record_audio_to_ai();
        session.stats().record_barge_in();

        let snapshot = session.stats().snapshot();
        assert_eq!(snapshot.audio_frames_to_ai, 2);
        assert_eq!(snapshot.barge_ins, 1);
        assert_eq!(snapshot.tool_calls, 0);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(Session::new().id(), Session::new().id());
    }
}
