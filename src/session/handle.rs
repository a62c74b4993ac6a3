//! Run a [`LiveSession`] on its own task and control it through a handle.
//!
//! The task is the session's dispatch loop: it owns the session and
//! interleaves caller commands with inbound transport events. Dropping every
//! handle stops the session.

use crate::error::{CognitaError, Result};
use crate::session::event::TranscriptEntry;
use crate::session::live::{LiveSession, SessionStats};
use crate::session::state::SessionState;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum SessionCommand {
    SendText {
        text: String,
        reply: oneshot::Sender<bool>,
    },
    Stop,
}

/// Final state of a session once its task has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub state: SessionState,
    pub transcript: Vec<TranscriptEntry>,
    pub stats: SessionStats,
}

pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    status: watch::Receiver<SessionState>,
    muted: Arc<AtomicBool>,
    task: Option<JoinHandle<SessionReport>>,
}

/// Start `session` on a new task.
pub fn spawn(session: LiveSession) -> SessionHandle {
    let (commands, command_rx) = mpsc::unbounded_channel();
    let status = session.subscribe();
    let muted = session.mute_flag();
    let task = tokio::spawn(drive(session, command_rx));
    SessionHandle {
        commands,
        status,
        muted,
        task: Some(task),
    }
}

async fn drive(
    mut session: LiveSession,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
) -> SessionReport {
    // A stop while connecting abandons the connection attempt.
    let started = {
        let start = session.start();
        tokio::pin!(start);
        loop {
            tokio::select! {
                result = &mut start => break Some(result),
                command = commands.recv() => match command {
                    Some(SessionCommand::SendText { reply, .. }) => {
                        let _ = reply.send(false);
                    }
                    Some(SessionCommand::Stop) | None => break None,
                },
            }
        }
    };

    match started {
        None => session.stop(),
        Some(Err(e)) => tracing::error!("session failed to start: {}", e),
        Some(Ok(())) => {
            while !session.status().is_terminal() {
                tokio::select! {
                    biased;
                    command = commands.recv() => match command {
                        Some(SessionCommand::SendText { text, reply }) => {
                            let _ = reply.send(session.send_text(text));
                        }
                        Some(SessionCommand::Stop) | None => session.stop(),
                    },
                    event = session.next_event() => match event {
                        Some(event) => session.handle_event(event),
                        None => session.connection_lost(),
                    },
                }
            }
        }
    }

    SessionReport {
        state: session.status(),
        transcript: session.transcript().to_vec(),
        stats: session.stats(),
    }
}

impl SessionHandle {
    /// Send text to the model. False unless the session is open.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        let (reply, rx) = oneshot::channel();
        let command = SessionCommand::SendText {
            text: text.into(),
            reply,
        };
        if self.commands.send(command).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Mute or unmute the microphone. Capture keeps running either way.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
        tracing::info!(muted, "microphone");
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Ask the session to stop. Safe to call any number of times.
    pub fn stop(&self) {
        let _ = self.commands.send(SessionCommand::Stop);
    }

    pub fn status(&self) -> SessionState {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.status.clone()
    }

    /// Wait until the status satisfies `predicate`, or the session task is
    /// gone. Returns the status seen last.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionState) -> bool,
    ) -> SessionState {
        let mut rx = self.status.clone();
        let seen = rx
            .wait_for(|state| predicate(state))
            .await
            .map(|state| state.clone());
        seen.unwrap_or_else(|_| rx.borrow().clone())
    }

    /// Wait for the session to open or end.
    pub async fn opened(&self) -> Result<()> {
        match self
            .wait_for(|state| state.is_open() || state.is_terminal())
            .await
        {
            SessionState::Open => Ok(()),
            other => Err(CognitaError::SessionNotOpen {
                state: other.to_string(),
            }),
        }
    }

    /// Wait for the session task to finish and return what it ended with.
    ///
    /// # Errors
    /// `Other` if the task panicked or was already joined.
    pub async fn join(mut self) -> Result<SessionReport> {
        let task = self
            .task
            .take()
            .ok_or_else(|| CognitaError::Other("session already joined".to_string()))?;
        task.await
            .map_err(|e| CognitaError::Other(format!("session task failed: {}", e)))
    }

    /// Stop and wait for teardown to complete.
    pub async fn shutdown(self) -> Result<SessionReport> {
        self.stop();
        self.join().await
    }
}
