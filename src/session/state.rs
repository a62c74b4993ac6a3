//! Session lifecycle state machine.
//!
//! ```text
//! idle ──start──▶ connecting ──setup complete──▶ open
//!  │                 │                            │
//!  │ permission      │ failure / stop             │ stop, remote close, failure
//!  ▼ denied, fault   ▼                            ▼
//! closed | error  closed | error              closed | error
//! ```
//!
//! `closed` and `error` are terminal. A new session needs a new machine.

use crate::error::{CognitaError, Result};
use std::fmt;
use tokio::sync::watch;

/// Why a session ended in `error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    /// Microphone access was denied; the session never connected.
    PermissionDenied(String),
    /// The connection failed to open or dropped.
    Transport(String),
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFailure::PermissionDenied(msg) => {
                write!(f, "microphone permission denied: {}", msg)
            }
            SessionFailure::Transport(msg) => write!(f, "transport failure: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Error(SessionFailure),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Error(_))
    }

    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }

    /// Stable lowercase name, without failure detail.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Error(_) => "error",
        }
    }

    fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Connecting) | (Idle, Closed) | (Idle, Error(_)) => true,
            (Connecting, Open) | (Connecting, Closed) | (Connecting, Error(_)) => true,
            (Open, Closed) | (Open, Error(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Error(failure) => write!(f, "error: {}", failure),
            other => f.write_str(other.name()),
        }
    }
}

/// Owns the current state and publishes every change.
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<SessionState>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Idle);
        Self { tx }
    }

    pub fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&self, next: SessionState) -> Result<()> {
        let current = self.current();
        if !current.can_transition_to(&next) {
            return Err(CognitaError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        tracing::info!(from = %current, to = %next, "session state");
        self.tx.send_replace(next);
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
