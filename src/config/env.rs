//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{PlivoConfig, RealtimeSettings, ServerConfig, TlsConfig};

/// Every environment variable read by [`load_from_env`].
pub(crate) const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "PUBLIC_URL",
    "TLS_CERT_PATH",
    "TLS_KEY_PATH",
    "OPENAI_API_KEY",
    "OPENAI_REALTIME_URL",
    "OPENAI_REALTIME_MODEL",
    "OPENAI_REALTIME_VOICE",
    "OPENAI_TEMPERATURE",
    "SYSTEM_INSTRUCTIONS",
    "PLIVO_AUTH_ID",
    "PLIVO_AUTH_TOKEN",
    "PLIVO_FROM_NUMBER",
    "PLIVO_TO_NUMBER",
    "PLIVO_ANSWER_XML",
    "PLIVO_API_URL",
    "REPORT_TOOL_ERRORS",
];

/// Read a non-empty environment variable.
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| format!("Invalid value for {key} ('{value}'): {e}"))
        })
        .transpose()
}

fn parse_bool(key: &str) -> Result<Option<bool>, String> {
    var(key)
        .map(|value| match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(format!("Invalid boolean for {key}: '{value}'")),
        })
        .transpose()
}

/// Build a [`ServerConfig`] from environment variables, falling back to defaults.
pub(crate) fn load_from_env() -> Result<ServerConfig, String> {
    let defaults = RealtimeSettings::default();

    let tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string());
        }
    };

    let realtime = RealtimeSettings {
        url: var("OPENAI_REALTIME_URL").unwrap_or_else(|| defaults.url.clone()),
        model: var("OPENAI_REALTIME_MODEL").unwrap_or_else(|| defaults.model.clone()),
        voice: parse_var("OPENAI_REALTIME_VOICE")?.unwrap_or(defaults.voice),
        instructions: var("SYSTEM_INSTRUCTIONS").unwrap_or_else(|| defaults.instructions.clone()),
        temperature: parse_var("OPENAI_TEMPERATURE")?.unwrap_or(defaults.temperature),
    };

    let plivo = PlivoConfig {
        auth_id: var("PLIVO_AUTH_ID"),
        auth_token: var("PLIVO_AUTH_TOKEN"),
        from_number: var("PLIVO_FROM_NUMBER"),
        to_number: var("PLIVO_TO_NUMBER"),
        answer_url: var("PLIVO_ANSWER_XML"),
        api_url: var("PLIVO_API_URL").unwrap_or_else(|| PlivoConfig::default().api_url),
    };

    let mut config = ServerConfig::default();
    if let Some(host) = var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_var("PORT")? {
        config.port = port;
    }
    config.tls = tls;
    config.public_url = var("PUBLIC_URL");
    config.openai_api_key = var("OPENAI_API_KEY");
    config.realtime = realtime;
    config.plivo = plivo;
    config.report_tool_errors = parse_bool("REPORT_TOOL_ERRORS")?.unwrap_or(false);

    Ok(config)
}
