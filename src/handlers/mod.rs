//! HTTP and WebSocket request handlers
//!
//! - `answer` - Plivo answer webhook returning the stream XML
//! - `media_stream` - Plivo bidirectional audio websocket
//! - `api` - Health check endpoint

pub mod answer;
pub mod api;
pub mod media_stream;

pub use answer::answer_handler;
pub use media_stream::media_stream_handler;
