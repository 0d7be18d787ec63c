//! OpenAI Realtime API connector.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: G.711 mu-law, 8kHz, base64 encoded (passed through untouched)

use async_trait::async_trait;
use futures::future;
use futures_util::StreamExt;
use http::HeaderValue;
use http::header::{AUTHORIZATION, HeaderName};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use super::config::OpenAIRealtimeAudioFormat;
use super::messages::{SessionConfig, TurnDetection};
use crate::core::realtime::base::{
    RealtimeConfig, RealtimeConnector, RealtimeError, RealtimeResult,
};
use crate::core::realtime::channel::{RealtimeEvents, RealtimeSession};
use crate::core::tools::ToolDefinition;
use crate::core::transport::{FRAME_CHANNEL_CAPACITY, Frame, TransportError, spawn_frame_writer};

const OPENAI_BETA_HEADER: &str = "openai-beta";
const OPENAI_BETA_REALTIME: &str = "realtime=v1";

/// Connector for the OpenAI Realtime API.
///
/// Each call to [`RealtimeConnector::connect`] opens a fresh websocket; the
/// connector itself holds only configuration and is shared across calls.
#[derive(Debug, Clone)]
pub struct OpenAIRealtime {
    config: RealtimeConfig,
}

impl OpenAIRealtime {
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }
        if config.url.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "Realtime URL is required".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Build the WebSocket URL with model parameter.
    fn build_ws_url(&self) -> String {
        format!("{}?model={}", self.config.url, self.config.model)
    }

    fn build_request(&self) -> RealtimeResult<Request> {
        let mut request = self
            .build_ws_url()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|_| {
                RealtimeError::InvalidConfiguration("API key is not a valid header".to_string())
            })?;

        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            HeaderName::from_static(OPENAI_BETA_HEADER),
            HeaderValue::from_static(OPENAI_BETA_REALTIME),
        );

        Ok(request)
    }

    /// Build the `session.update` payload sent right after connecting.
    pub fn build_session_config(&self, tools: Vec<ToolDefinition>) -> SessionConfig {
        SessionConfig {
            turn_detection: TurnDetection::ServerVad,
            input_audio_format: OpenAIRealtimeAudioFormat::G711Ulaw,
            output_audio_format: OpenAIRealtimeAudioFormat::G711Ulaw,
            voice: self.config.voice,
            instructions: self.config.instructions.clone(),
            modalities: vec!["text".to_string(), "audio".to_string()],
            temperature: self.config.temperature,
            tools,
        }
    }
}

#[async_trait]
impl RealtimeConnector for OpenAIRealtime {
    async fn connect(&self) -> RealtimeResult<(RealtimeSession, RealtimeEvents)> {
        let request = self.build_request()?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        tracing::info!(model = %self.config.model, "Connected to OpenAI Realtime API");

        let (ws_sink, ws_stream) = ws_stream.split();
        let (tx, rx) = mpsc::channel::<Frame>(FRAME_CHANNEL_CAPACITY);

        spawn_frame_writer(ws_sink, rx, |frame| match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Close => Message::Close(None),
        });

        let frames = ws_stream
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(_) => None,
                    Err(e) => Some(Err(TransportError(e.to_string()))),
                }
            })
            .boxed();

        Ok((RealtimeSession::new(tx), RealtimeEvents::new(frames)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::openai::config::OpenAIRealtimeVoice;
    use crate::core::tools::ToolRegistry;

    fn test_config() -> RealtimeConfig {
        let mut config = RealtimeConfig::default();
        config.api_key = "sk-test".to_string();
        config
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = OpenAIRealtime::new(RealtimeConfig::default());
        assert!(matches!(
            result,
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_request_headers() {
        let client = OpenAIRealtime::new(test_config()).unwrap();
        let request = client.build_request().unwrap();

        assert_eq!(
            request.uri().to_string(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01"
        );
        assert_eq!(request.headers()["authorization"], "Bearer sk-test");
        assert_eq!(request.headers()["openai-beta"], "realtime=v1");
    }

    #[test]
    fn test_session_config_carries_tools() {
        let mut config = test_config();
        config.voice = OpenAIRealtimeVoice::Echo;
        let client = OpenAIRealtime::new(config).unwrap();

        let session = client.build_session_config(ToolRegistry::with_builtin_tools().definitions());
        assert_eq!(session.voice, OpenAIRealtimeVoice::Echo);
        assert_eq!(session.input_audio_format, OpenAIRealtimeAudioFormat::G711Ulaw);
        assert_eq!(session.output_audio_format, OpenAIRealtimeAudioFormat::G711Ulaw);
        assert_eq!(session.modalities, vec!["text", "audio"]);
        assert_eq!(session.tools.len(), 1);
        assert_eq!(session.tools[0].name, "calc_sum");
    }

    #[tokio::test]
    async fn test_connect_failure_is_connection_failed() {
        // Nothing listens on port 9 locally; the handshake cannot complete.
        let mut config = test_config();
        config.url = "ws://127.0.0.1:9/v1/realtime".to_string();
        let client = OpenAIRealtime::new(config).unwrap();

        assert!(matches!(
            client.connect().await,
            Err(RealtimeError::ConnectionFailed(_))
        ));
    }
}
