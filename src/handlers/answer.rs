//! Plivo answer webhook
//!
//! When a call is answered Plivo fetches this document and opens a
//! bidirectional audio stream to the `/media-stream` websocket it names.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use tracing::{debug, warn};
use url::Url;

use crate::core::telephony::{MULAW_CONTENT_TYPE, MULAW_SAMPLE_RATE};
use crate::state::AppState;

/// Path of the media stream websocket route.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

/// Seconds Plivo keeps the stream open.
const STREAM_TIMEOUT_SECS: u32 = 86400;

/// Answer XML for an incoming or outbound call.
pub async fn answer_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| state.config.address());

    let base = stream_base_url(state.config.public_url.as_deref(), &host);
    debug!(stream_url = %base, "Serving answer XML");

    (
        [(header::CONTENT_TYPE, "application/xml")],
        answer_xml(&format!("{base}{MEDIA_STREAM_PATH}")),
    )
}

/// Websocket base URL the media stream should connect back to.
///
/// A configured public URL wins, with `http` mapped to `ws` and `https` to
/// `wss`. Otherwise the request's `Host` is used over plain `ws`.
pub fn stream_base_url(public_url: Option<&str>, host: &str) -> String {
    if let Some(public_url) = public_url {
        match Url::parse(public_url) {
            Ok(mut url) => {
                let scheme = match url.scheme() {
                    "https" | "wss" => "wss",
                    _ => "ws",
                };
                if url.set_scheme(scheme).is_ok() {
                    return url.as_str().trim_end_matches('/').to_string();
                }
                warn!(%public_url, "Cannot use public URL as a websocket base");
            }
            Err(e) => warn!(%public_url, "Invalid public URL: {}", e),
        }
    }

    format!("ws://{host}")
}

/// The `<Response><Stream>` document for `stream_url`.
pub fn answer_xml(stream_url: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n<Response>\n",
            r#"    <Stream streamTimeout="{timeout}" keepCallAlive="true" bidirectional="true" contentType="{content_type};rate={rate}" audioTrack="inbound">"#,
            "{url}</Stream>\n",
            "</Response>\n"
        ),
        timeout = STREAM_TIMEOUT_SECS,
        content_type = MULAW_CONTENT_TYPE,
        rate = MULAW_SAMPLE_RATE,
        url = stream_url,
    )
}
