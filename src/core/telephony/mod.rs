//! Plivo telephony side of the bridge.
//!
//! - `messages`: media stream event types
//! - `stream`: websocket adapter for the media stream
//! - `outbound`: REST client for placing outbound calls

pub mod messages;
pub mod outbound;
pub mod stream;

pub use messages::{
    InboundTelephonyEvent, MULAW_CONTENT_TYPE, MULAW_SAMPLE_RATE, MediaPayload,
    OutboundTelephonyEvent, PlayAudioMedia, StreamStart,
};
pub use outbound::{CallResponse, OutboundCall, OutboundCallError, PLIVO_API_URL, PlivoClient};
pub use stream::{TelephonyError, TelephonyReceiver, TelephonyResult, TelephonySender};
