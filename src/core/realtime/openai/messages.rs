//! OpenAI Realtime API WebSocket message types.
//!
//! Only the events the bridge sends or acts on are modelled; every other
//! server event deserializes to [`ServerEvent::Unknown`].
//!
//! Client events (sent to server):
//! - session.update - Update session configuration
//! - input_audio_buffer.append - Append audio to buffer
//! - conversation.item.create - Add item to conversation
//! - response.create - Generate a response
//! - response.cancel - Cancel current response
//!
//! Server events (received from server):
//! - session.created / session.updated
//! - input_audio_buffer.speech_started - Speech detection started
//! - response.output_item.added - Output item added
//! - response.audio.delta - Audio data chunk
//! - response.function_call_arguments.done - Function call complete
//! - error - Error occurred

use serde::{Deserialize, Serialize};

use super::config::{OpenAIRealtimeAudioFormat, OpenAIRealtimeVoice};
use crate::core::tools::ToolDefinition;

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration for OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Turn detection configuration
    pub turn_detection: TurnDetection,

    /// Input audio format
    pub input_audio_format: OpenAIRealtimeAudioFormat,

    /// Output audio format
    pub output_audio_format: OpenAIRealtimeAudioFormat,

    /// Voice for audio output
    pub voice: OpenAIRealtimeVoice,

    /// System instructions for the assistant
    pub instructions: String,

    /// Response modalities (text, audio)
    pub modalities: Vec<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Available tools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side voice activity detection
    #[serde(rename = "server_vad")]
    ServerVad,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item created by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Item type (message, function_call_output)
    #[serde(rename = "type")]
    pub item_type: String,

    /// Call ID (for function_call_output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,

    /// Output (for function_call_output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    pub fn function_call_output(
        item_id: impl Into<String>,
        call_id: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(item_id.into()),
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.into()),
            output: Some(output.into()),
        }
    }
}

// =============================================================================
// Response Configuration
// =============================================================================

/// Per-response overrides for `response.create`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// =============================================================================
// Client Events
// =============================================================================

/// Events sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64 encoded audio, as received from telephony
        audio: String,
    },

    /// Create conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Create response
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },

    /// Cancel current response
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    /// Name of the event as sent on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate { .. } => "response.create",
            Self::ResponseCancel => "response.cancel",
        }
    }
}

// =============================================================================
// Server Events
// =============================================================================

/// Events received from server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: SessionInfo },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: Option<u64>,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: OutputItem },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64 encoded audio in the session output format
        delta: String,
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Function call arguments done.
    ///
    /// The API does not always repeat the function name here; the events
    /// stream fills it in from the matching `response.output_item.added`.
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        #[serde(default)]
        name: Option<String>,
        call_id: String,
        item_id: String,
        arguments: String,
    },

    /// Any other server event
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::SpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::OutputItemAdded { .. } => "response.output_item.added",
            Self::AudioDelta { .. } => "response.audio.delta",
            Self::FunctionCallArgumentsDone { .. } => "response.function_call_arguments.done",
            Self::Unknown => "unknown",
        }
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Session information echoed by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Output item announced by `response.output_item.added`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
