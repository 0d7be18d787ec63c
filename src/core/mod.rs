pub mod realtime;
pub mod session;
pub mod telephony;
pub mod tools;
pub mod transport;

// Re-export commonly used types for convenience
pub use realtime::{
    OpenAIRealtime, RealtimeConfig, RealtimeConnector, RealtimeError, RealtimeEvents,
    RealtimeResult, RealtimeSession,
};

pub use session::{
    LifecycleSupervisor, LoopExit, RelaySettings, Session, SessionError, SessionOrchestrator,
    SessionPhase, SessionReport,
};

pub use telephony::{
    InboundTelephonyEvent, OutboundTelephonyEvent, PlivoClient, TelephonyError,
    TelephonyReceiver, TelephonySender,
};

pub use tools::{CalcSum, ToolError, ToolHandler, ToolInvocation, ToolRegistry, ToolResult};

pub use transport::{ConnectionState, Frame, InboundFrames, TransportError};
