//! Plivo media stream event types.
//!
//! Inbound events (received from Plivo):
//! - start - Stream started, carries the stream id
//! - media - Base64 encoded 8kHz mu-law audio frame
//! - stop - Stream stopped
//!
//! Outbound events (sent to Plivo):
//! - playAudio - Play an audio frame on the call
//! - clearAudio - Drop any audio queued for playback

use serde::{Deserialize, Serialize};

/// Content type of the audio exchanged with Plivo.
pub const MULAW_CONTENT_TYPE: &str = "audio/x-mulaw";

/// Sample rate of the audio exchanged with Plivo.
pub const MULAW_SAMPLE_RATE: u32 = 8000;

// =============================================================================
// Inbound Events
// =============================================================================

/// Events received on the Plivo media stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum InboundTelephonyEvent {
    #[serde(rename = "media")]
    Media { media: MediaPayload },

    #[serde(rename = "start")]
    Start { start: StreamStart },

    #[serde(rename = "stop")]
    Stop,

    /// Any event kind the relay does not act on
    #[serde(other)]
    Other,
}

/// Audio carried by a `media` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Base64 encoded audio, forwarded untouched
    pub payload: String,
}

/// Metadata carried by a `start` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStart {
    #[serde(rename = "streamId")]
    pub stream_id: String,

    #[serde(rename = "callId", default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

// =============================================================================
// Outbound Events
// =============================================================================

/// Events sent back on the Plivo media stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum OutboundTelephonyEvent {
    #[serde(rename = "playAudio")]
    PlayAudio { media: PlayAudioMedia },

    #[serde(rename = "clearAudio")]
    ClearAudio { stream_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayAudioMedia {
    #[serde(rename = "contentType")]
    pub content_type: String,

    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,

    pub payload: String,
}

impl OutboundTelephonyEvent {
    pub fn play_audio(
        payload: impl Into<String>,
        sample_rate: u32,
        content_type: impl Into<String>,
    ) -> Self {
        Self::PlayAudio {
            media: PlayAudioMedia {
                content_type: content_type.into(),
                sample_rate,
                payload: payload.into(),
            },
        }
    }

    pub fn clear_audio(stream_id: impl Into<String>) -> Self {
        Self::ClearAudio {
            stream_id: stream_id.into(),
        }
    }
}
