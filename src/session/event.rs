//! Events flowing through a live session.

use crate::session::state::SessionState;
use std::fmt;

/// Who produced a piece of transcript text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Speaker {
    User,
    Assistant,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Assistant => write!(f, "assistant"),
        }
    }
}

/// Base64 PCM16 speech from the remote model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFragment {
    pub data: String,
    pub mime_type: Option<String>,
}

/// Streamed transcript or text-modality output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// The model finished one conversational turn.
    TurnComplete,
    /// The user barged in; pending model audio must stop.
    Interrupted,
}

/// Content received while the session is open, in one of three classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Audio(AudioFragment),
    Text(TextFragment),
    Control(ControlSignal),
}

/// Everything a transport reports, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Remote acknowledged the session setup.
    Opened,
    Inbound(InboundEvent),
    /// Remote announced it will close soon.
    GoAway { time_left: Option<String> },
    /// Remote closed the connection.
    Closed { reason: Option<String> },
    /// Connection-level failure; nothing further will arrive.
    Failed { message: String },
}

impl From<InboundEvent> for TransportEvent {
    fn from(event: InboundEvent) -> Self {
        TransportEvent::Inbound(event)
    }
}

/// One committed transcript turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// Non-blocking notifications for whoever renders the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Status(SessionState),
    TranscriptDelta { speaker: Speaker, text: String },
    TranscriptCommitted(TranscriptEntry),
    Interrupted { cancelled: usize },
    PlaybackScheduled { start_at: f64, duration: f64 },
    FragmentDropped { reason: String },
}
