//! Configuration module for the call bridge
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading and overrides
//!
//! # Example
//! ```rust,no_run
//! use call_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::realtime::RealtimeConfig;
use crate::core::realtime::openai::config::{
    DEFAULT_INSTRUCTIONS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, MAX_TEMPERATURE, MIN_TEMPERATURE,
    OPENAI_REALTIME_URL, OpenAIRealtimeVoice,
};
use crate::core::telephony::PLIVO_API_URL;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Realtime session settings (everything but the API key)
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSettings {
    pub url: String,
    pub model: String,
    pub voice: OpenAIRealtimeVoice,
    pub instructions: String,
    pub temperature: f32,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: OpenAIRealtimeVoice::default(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Plivo account and outbound call settings
#[derive(Debug, Clone, PartialEq)]
pub struct PlivoConfig {
    pub auth_id: Option<String>,
    pub auth_token: Option<String>,
    /// Caller number for outbound calls
    pub from_number: Option<String>,
    /// Callee number for outbound calls
    pub to_number: Option<String>,
    /// URL Plivo fetches the answer XML from (normally this server's `/webhook`)
    pub answer_url: Option<String>,
    /// REST API base URL
    pub api_url: String,
}

impl Default for PlivoConfig {
    fn default() -> Self {
        Self {
            auth_id: None,
            auth_token: None,
            from_number: None,
            to_number: None,
            answer_url: None,
            api_url: PLIVO_API_URL.to_string(),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the bridge:
/// - Server settings (host, port, TLS, public URL)
/// - OpenAI Realtime credentials and session settings
/// - Plivo credentials and outbound call settings
/// - Relay behavior
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Externally reachable base URL (e.g. `https://bridge.example.com`), used
    /// to build the media stream URL in the answer XML. When unset the
    /// request's `Host` header is used.
    pub public_url: Option<String>,

    /// OpenAI API key for the Realtime API
    pub openai_api_key: Option<String>,
    pub realtime: RealtimeSettings,

    pub plivo: PlivoConfig,

    /// Report tool failures back to the model as a function output
    /// instead of only logging them. Default: false
    pub report_tool_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            tls: None,
            public_url: None,
            openai_api_key: None,
            realtime: RealtimeSettings::default(),
            plivo: PlivoConfig::default(),
            report_tool_errors: false,
        }
    }
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.plivo.auth_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // Note: .env file is loaded in main.rs at application startup
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let mut config = env::load_from_env()?;
        yaml_config.apply_to(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Realtime connector configuration, or an error if no API key is set
    pub fn realtime_config(&self) -> Result<RealtimeConfig, String> {
        let api_key = self
            .openai_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| "OPENAI_API_KEY is not configured".to_string())?;

        let mut config = RealtimeConfig::default();
        config.api_key = api_key;
        config.url = self.realtime.url.clone();
        config.model = self.realtime.model.clone();
        config.voice = self.realtime.voice;
        config.instructions = self.realtime.instructions.clone();
        config.temperature = self.realtime.temperature;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        let temperature = self.realtime.temperature;
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(format!(
                "Realtime temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}, got {temperature}"
            ));
        }

        let realtime_url = url::Url::parse(&self.realtime.url)
            .map_err(|e| format!("Invalid realtime URL '{}': {e}", self.realtime.url))?;
        if !matches!(realtime_url.scheme(), "ws" | "wss") {
            return Err(format!(
                "Realtime URL must use ws or wss, got '{}'",
                realtime_url.scheme()
            ));
        }

        if let Some(ref public_url) = self.public_url {
            url::Url::parse(public_url)
                .map_err(|e| format!("Invalid public URL '{public_url}': {e}"))?;
        }

        if let Some(ref tls) = self.tls {
            if !tls.cert_path.exists() {
                return Err(format!(
                    "TLS certificate not found: {}",
                    tls.cert_path.display()
                ));
            }
            if !tls.key_path.exists() {
                return Err(format!("TLS key not found: {}", tls.key_path.display()));
            }
        }

        Ok(())
    }
}
