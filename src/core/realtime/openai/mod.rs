//! OpenAI Realtime API provider.
//!
//! - `config`: endpoint, defaults, voice and audio format enums
//! - `messages`: client and server event types
//! - `client`: websocket connector

pub mod client;
pub mod config;
pub mod messages;

pub use client::OpenAIRealtime;
pub use config::{
    DEFAULT_INSTRUCTIONS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, MAX_TEMPERATURE, MIN_TEMPERATURE,
    OPENAI_REALTIME_URL, OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice,
};
pub use messages::{
    ApiError, ClientEvent, ConversationItem, OutputItem, ResponseConfig, ServerEvent,
    SessionConfig, SessionInfo, TurnDetection,
};
