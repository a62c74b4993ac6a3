//! Transport abstraction between a live session and the remote endpoint.
//!
//! A connected transport is a [`TransportLink`]: an outbound sink with two
//! lanes (text, audio) and an inbound event receiver. Text always leaves
//! ahead of queued audio; each lane keeps its own order.

use crate::audio::encode::AudioChunk;
use crate::audio::pipeline::ChunkSink;
use crate::error::{CognitaError, Result};
use crate::session::event::TransportEvent;
use crate::session::protocol::SessionSetup;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One outbound item, in the order the writer should send it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Audio(AudioChunk),
}

/// Producer side of the outbound lanes. Cheap to clone.
#[derive(Debug, Clone)]
pub struct OutboundSink {
    text: mpsc::UnboundedSender<String>,
    audio: mpsc::UnboundedSender<AudioChunk>,
}

impl OutboundSink {
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.text.send(text.into()).is_ok()
    }

    pub fn send_audio(&self, chunk: AudioChunk) -> bool {
        self.audio.send(chunk).is_ok()
    }
}

impl ChunkSink for OutboundSink {
    fn send_chunk(&self, chunk: AudioChunk) -> bool {
        self.send_audio(chunk)
    }
}

/// Consumer side of the outbound lanes.
#[derive(Debug)]
pub struct OutboundQueue {
    text: mpsc::UnboundedReceiver<String>,
    audio: mpsc::UnboundedReceiver<AudioChunk>,
}

impl OutboundQueue {
    /// Wait for the next item, text first. `None` once every sink is gone
    /// and both lanes are drained.
    pub async fn next(&mut self) -> Option<Outbound> {
        tokio::select! {
            biased;
            Some(text) = self.text.recv() => Some(Outbound::Text(text)),
            Some(chunk) = self.audio.recv() => Some(Outbound::Audio(chunk)),
            else => None,
        }
    }

    /// Non-blocking variant of [`next`](Self::next).
    pub fn try_next(&mut self) -> Option<Outbound> {
        if let Ok(text) = self.text.try_recv() {
            return Some(Outbound::Text(text));
        }
        self.audio.try_recv().ok().map(Outbound::Audio)
    }
}

pub fn outbound_channel() -> (OutboundSink, OutboundQueue) {
    let (text_tx, text_rx) = mpsc::unbounded_channel();
    let (audio_tx, audio_rx) = mpsc::unbounded_channel();
    (
        OutboundSink {
            text: text_tx,
            audio: audio_tx,
        },
        OutboundQueue {
            text: text_rx,
            audio: audio_rx,
        },
    )
}

/// A live connection owned by one session.
///
/// Closing (or dropping) the link signals the writer to shut down and stops
/// any reader tasks; no further inbound events are delivered afterwards.
pub struct TransportLink {
    outbound: OutboundSink,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl TransportLink {
    pub fn new(
        outbound: OutboundSink,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            shutdown: Some(shutdown),
            tasks: Vec::new(),
        }
    }

    /// Tie a background task's lifetime to the link.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn outbound(&self) -> &OutboundSink {
        &self.outbound
    }

    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.inbound.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none()
    }

    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            self.inbound.close();
            for task in self.tasks.drain(..) {
                task.abort();
            }
            tracing::debug!("transport link closed");
        }
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens connections to a live endpoint.
#[async_trait]
pub trait Transport: Send {
    /// Connect and send `setup`. The link reports [`TransportEvent::Opened`]
    /// once the remote acknowledges it.
    async fn connect(&mut self, setup: &SessionSetup) -> Result<TransportLink>;
}

#[derive(Default)]
struct MockTransportState {
    connects: usize,
    setups: Vec<SessionSetup>,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    queue: Option<OutboundQueue>,
    shutdown: Option<oneshot::Receiver<()>>,
    sent: Vec<Outbound>,
}

impl MockTransportState {
    fn drain(&mut self) {
        if let Some(queue) = self.queue.as_mut() {
            while let Some(item) = queue.try_next() {
                self.sent.push(item);
            }
        }
    }
}

/// Test-side view of a [`MockTransport`].
#[derive(Clone, Default)]
pub struct MockTransportHandle {
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransportHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, MockTransportState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver an event to the connected session. False if not connected
    /// or the session has stopped listening.
    pub fn push(&self, event: impl Into<TransportEvent>) -> bool {
        self.lock()
            .events
            .as_ref()
            .is_some_and(|tx| tx.send(event.into()).is_ok())
    }

    pub fn open(&self) -> bool {
        self.push(TransportEvent::Opened)
    }

    /// Simulate the remote dropping the connection.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.push(TransportEvent::Failed {
            message: message.into(),
        })
    }

    /// Close the inbound stream without a close event.
    pub fn hang_up(&self) {
        self.lock().events = None;
    }

    /// Everything the session has sent so far, in send order.
    pub fn sent(&self) -> Vec<Outbound> {
        let mut state = self.lock();
        state.drain();
        state.sent.clone()
    }

    pub fn sent_text(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Text(text) => Some(text),
                Outbound::Audio(_) => None,
            })
            .collect()
    }

    pub fn sent_audio(&self) -> Vec<AudioChunk> {
        self.sent()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Audio(chunk) => Some(chunk),
                Outbound::Text(_) => None,
            })
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn setups(&self) -> Vec<SessionSetup> {
        self.lock().setups.clone()
    }

    /// True once the session closed or dropped its link.
    pub fn link_closed(&self) -> bool {
        let mut state = self.lock();
        match state.shutdown.as_mut() {
            Some(rx) => !matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)),
            None => false,
        }
    }
}

/// In-memory transport for tests.
#[derive(Default)]
pub struct MockTransport {
    handle: MockTransportHandle,
    connect_error: Option<String>,
    open_on_connect: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every connection attempt.
    pub fn with_connect_error(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    /// Queue `Opened` immediately after connecting.
    pub fn with_open_on_connect(mut self) -> Self {
        self.open_on_connect = true;
        self
    }

    pub fn handle(&self) -> MockTransportHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, setup: &SessionSetup) -> Result<TransportLink> {
        let mut state = self.handle.lock();
        state.connects += 1;
        state.setups.push(setup.clone());

        if let Some(message) = &self.connect_error {
            return Err(CognitaError::TransportConnect {
                message: message.clone(),
            });
        }

        let (sink, queue) = outbound_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        if self.open_on_connect {
            let _ = events_tx.send(TransportEvent::Opened);
        }

        state.events = Some(events_tx);
        state.queue = Some(queue);
        state.shutdown = Some(shutdown_rx);
        state.sent.clear();

        Ok(TransportLink::new(sink, events_rx, shutdown_tx))
    }
}
