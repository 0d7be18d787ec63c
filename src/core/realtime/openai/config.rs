//! OpenAI Realtime API configuration types.
//!
//! This module contains configuration types for OpenAI's Realtime API:
//! - Endpoint and default model
//! - Voice selection
//! - Audio format configuration

use serde::{Deserialize, Serialize};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

/// Sampling temperature used for the session and for continue directives.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Lowest temperature accepted by the Realtime API.
pub const MIN_TEMPERATURE: f32 = 0.6;

/// Highest temperature accepted by the Realtime API.
pub const MAX_TEMPERATURE: f32 = 1.2;

/// System instructions used when none are configured.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful and a friendly AI assistant who loves to chat about anything the user is interested about.";

// =============================================================================
// Voices
// =============================================================================

/// Available voices for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }
}

impl std::str::FromStr for OpenAIRealtimeVoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "alloy" => Ok(Self::Alloy),
            "ash" => Ok(Self::Ash),
            "ballad" => Ok(Self::Ballad),
            "coral" => Ok(Self::Coral),
            "echo" => Ok(Self::Echo),
            "sage" => Ok(Self::Sage),
            "shimmer" => Ok(Self::Shimmer),
            "verse" => Ok(Self::Verse),
            other => Err(format!("unknown realtime voice '{other}'")),
        }
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio format sent in `session.update` for both directions.
///
/// Plivo streams carry 8kHz mu-law, which the API calls `g711_ulaw`. Playback
/// is labelled `audio/x-mulaw` at 8000 Hz, so no other format is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenAIRealtimeAudioFormat {
    #[default]
    G711Ulaw,
}

impl OpenAIRealtimeAudioFormat {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G711Ulaw => "g711_ulaw",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_parsing() {
        assert_eq!(" Shimmer".parse::<OpenAIRealtimeVoice>(), Ok(OpenAIRealtimeVoice::Shimmer));
        assert_eq!(OpenAIRealtimeVoice::Verse.to_string(), "verse");

        let err = "nobody".parse::<OpenAIRealtimeVoice>().unwrap_err();
        assert!(err.contains("nobody"));
    }

    #[test]
    fn test_audio_format_serde_matches_as_str() {
        let json = serde_json::to_string(&OpenAIRealtimeAudioFormat::G711Ulaw).unwrap();
        assert_eq!(json, "\"g711_ulaw\"");
        assert_eq!(OpenAIRealtimeAudioFormat::G711Ulaw.as_str(), "g711_ulaw");
    }
}
