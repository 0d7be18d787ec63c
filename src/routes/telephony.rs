//! Plivo-facing routes
//!
//! `GET|POST /webhook` returns the answer XML that points Plivo at
//! `GET /media-stream`, the websocket carrying the call audio.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::answer::MEDIA_STREAM_PATH;
use crate::handlers::{answer_handler, media_stream_handler};
use crate::state::AppState;
use std::sync::Arc;

/// Create the telephony router
pub fn create_telephony_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook", get(answer_handler).post(answer_handler))
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
