//! Live voice sessions: lifecycle, transport, inbound dispatch and transcript.

pub mod error;
pub mod event;
pub mod handle;
pub mod live;
pub mod preset;
pub mod protocol;
pub mod state;
pub mod transcript;
pub mod transport;
pub mod websocket;

pub use error::{ErrorReporter, SessionFault, TracingReporter};
pub use event::{
    AudioFragment, ControlSignal, InboundEvent, SessionUpdate, Speaker, TextFragment,
    TranscriptEntry, TransportEvent,
};
pub use handle::{SessionCommand, SessionHandle, SessionReport, spawn};
pub use live::{LiveSession, SessionStats};
pub use preset::SessionPreset;
pub use protocol::{ClientMessage, ResponseModality, ServerMessage, SessionSetup};
pub use state::{SessionFailure, SessionState, StateMachine};
pub use transcript::TranscriptAccumulator;
pub use transport::{
    MockTransport, MockTransportHandle, Outbound, OutboundQueue, OutboundSink, Transport,
    TransportLink, outbound_channel,
};
pub use websocket::WebSocketTransport;
