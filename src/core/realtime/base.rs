//! Base traits and types for the realtime AI side of the bridge.
//!
//! A [`RealtimeConnector`] opens one websocket session per call and hands back
//! its two halves: a [`RealtimeSession`] for client events and a
//! [`RealtimeEvents`] stream of server events.

use async_trait::async_trait;
use thiserror::Error;

use super::channel::{RealtimeEvents, RealtimeSession};
use super::openai::config::{
    DEFAULT_INSTRUCTIONS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, OPENAI_REALTIME_URL,
    OpenAIRealtimeVoice,
};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed (including rejected handshakes)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The session is closed locally or by the provider
    #[error("Connection closed")]
    ConnectionClosed,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// A server event could not be parsed
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Connection and session settings for the realtime provider.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,

    /// WebSocket endpoint, without the model query parameter
    pub url: String,

    /// Model identifier
    pub model: String,

    pub voice: OpenAIRealtimeVoice,

    /// System instructions for the assistant
    pub instructions: String,

    /// Sampling temperature (0.6 to 1.2)
    pub temperature: f32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: OpenAIRealtimeVoice::default(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl Drop for RealtimeConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

// =============================================================================
// Connector Trait
// =============================================================================

/// Opens realtime sessions.
///
/// Implementations must return [`RealtimeError::ConnectionFailed`] when the
/// handshake fails, including authentication rejections.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self) -> RealtimeResult<(RealtimeSession, RealtimeEvents)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RealtimeConfig::default();
        assert_eq!(config.url, "wss://api.openai.com/v1/realtime");
        assert_eq!(config.model, "gpt-4o-realtime-preview-2024-10-01");
        assert_eq!(config.voice, OpenAIRealtimeVoice::Alloy);
        assert!((config.temperature - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            RealtimeError::ConnectionFailed("HTTP error: 401 Unauthorized".into()).to_string(),
            "Connection failed: HTTP error: 401 Unauthorized"
        );
        assert_eq!(RealtimeError::ConnectionClosed.to_string(), "Connection closed");
    }
}
