use serde::Deserialize;
use std::path::PathBuf;

use super::{ServerConfig, TlsConfig};
use crate::core::realtime::openai::config::OpenAIRealtimeVoice;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override the environment-derived configuration.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5000
///   public_url: "https://bridge.example.com"
///   tls:
///     cert_path: "/etc/bridge/cert.pem"
///     key_path: "/etc/bridge/key.pem"
///
/// openai:
///   api_key: "sk-..."
///   realtime_url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-10-01"
///   voice: "alloy"
///   temperature: 0.8
///   instructions: "You are a helpful assistant."
///
/// plivo:
///   auth_id: "MAXXXXXXXXXXXXXXXXXX"
///   auth_token: "your-auth-token"
///   from_number: "+15550001"
///   to_number: "+15550002"
///   answer_url: "https://bridge.example.com/webhook"
///
/// relay:
///   report_tool_errors: false
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub plivo: Option<PlivoYaml>,
    pub relay: Option<RelayYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// OpenAI Realtime configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub realtime_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<OpenAIRealtimeVoice>,
    pub temperature: Option<f32>,
    pub instructions: Option<String>,
}

/// Plivo configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlivoYaml {
    pub auth_id: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub answer_url: Option<String>,
    pub api_url: Option<String>,
}

/// Relay behavior from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayYaml {
    pub report_tool_errors: Option<bool>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }

    /// Apply every value present in the file on top of `config`
    pub fn apply_to(self, config: &mut ServerConfig) {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(public_url) = server.public_url {
                config.public_url = Some(public_url);
            }
            if let Some(TlsYaml {
                cert_path: Some(cert_path),
                key_path: Some(key_path),
            }) = server.tls
            {
                config.tls = Some(TlsConfig {
                    cert_path: PathBuf::from(cert_path),
                    key_path: PathBuf::from(key_path),
                });
            }
        }

        if let Some(openai) = self.openai {
            if let Some(api_key) = openai.api_key {
                config.openai_api_key = Some(api_key);
            }
            if let Some(url) = openai.realtime_url {
                config.realtime.url = url;
            }
            if let Some(model) = openai.model {
                config.realtime.model = model;
            }
            if let Some(voice) = openai.voice {
                config.realtime.voice = voice;
            }
            if let Some(temperature) = openai.temperature {
                config.realtime.temperature = temperature;
            }
            if let Some(instructions) = openai.instructions {
                config.realtime.instructions = instructions;
            }
        }

        if let Some(plivo) = self.plivo {
            let target = &mut config.plivo;
            target.auth_id = plivo.auth_id.or(target.auth_id.take());
            target.auth_token = plivo.auth_token.or(target.auth_token.take());
            target.from_number = plivo.from_number.or(target.from_number.take());
            target.to_number = plivo.to_number.or(target.to_number.take());
            target.answer_url = plivo.answer_url.or(target.answer_url.take());
            if let Some(api_url) = plivo.api_url {
                target.api_url = api_url;
            }
        }

        if let Some(relay) = self.relay
            && let Some(report) = relay.report_tool_errors
        {
            config.report_tool_errors = report;
        }
    }
}
