//! Fault classification and reporting for a live session's dispatch loop.

use std::fmt;

/// A failure observed while handling one session event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFault {
    /// The event is dropped and the session keeps running.
    Recoverable(String),
    /// The session must tear down.
    Fatal(String),
}

impl SessionFault {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionFault::Fatal(_))
    }
}

impl fmt::Display for SessionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFault::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            SessionFault::Fatal(msg) => write!(f, "Fatal error: {}", msg),
        }
    }
}

impl std::error::Error for SessionFault {}

/// Receives faults raised by a session component.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, component: &str, fault: &SessionFault);
}

/// Reports faults through `tracing`: recoverable as warnings, fatal as errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, component: &str, fault: &SessionFault) {
        match fault {
            SessionFault::Recoverable(msg) => tracing::warn!(component, "{}", msg),
            SessionFault::Fatal(msg) => tracing::error!(component, "{}", msg),
        }
    }
}
