//! Realtime conversational AI side of the bridge.
//!
//! The [`RealtimeConnector`] trait is the seam between the session
//! orchestrator and the provider; [`OpenAIRealtime`] is the production
//! implementation.

pub mod base;
pub mod channel;
pub mod openai;

pub use base::{RealtimeConfig, RealtimeConnector, RealtimeError, RealtimeResult};
pub use channel::{RealtimeEvents, RealtimeSession};
pub use openai::OpenAIRealtime;
