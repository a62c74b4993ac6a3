//! One live voice session: capture, transport, playback and transcript.
//!
//! `LiveSession` is the single owner of everything a session holds. Inbound
//! events are handled one at a time through [`LiveSession::handle_event`], so
//! playback scheduling and transcript updates follow arrival order. Teardown
//! is synchronous and runs at most once, whatever path triggers it.

use crate::audio::device::CaptureDevice;
use crate::audio::pipeline::CapturePipeline;
use crate::defaults;
use crate::error::{CognitaError, Result};
use crate::playback::output::AudioOutput;
use crate::playback::scheduler::PlaybackScheduler;
use crate::session::error::{ErrorReporter, SessionFault, TracingReporter};
use crate::session::event::{
    AudioFragment, ControlSignal, InboundEvent, SessionUpdate, Speaker, TextFragment,
    TranscriptEntry, TransportEvent,
};
use crate::session::protocol::SessionSetup;
use crate::session::state::{SessionFailure, SessionState, StateMachine};
use crate::session::transcript::TranscriptAccumulator;
use crate::session::transport::{Transport, TransportLink};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::watch;

/// Counters across all parts of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub blocks_captured: u64,
    pub chunks_sent: u64,
    pub muted_drops: u64,
    pub fragments_scheduled: u64,
    pub fragments_dropped: u64,
    pub interruptions: u64,
    pub turns_committed: u64,
}

pub struct LiveSession {
    setup: SessionSetup,
    priming_text: Option<String>,
    state: StateMachine,
    capture: CapturePipeline,
    transport: Box<dyn Transport>,
    link: Option<TransportLink>,
    playback: PlaybackScheduler,
    transcript: TranscriptAccumulator,
    updates: Option<Sender<SessionUpdate>>,
    reporter: Arc<dyn ErrorReporter>,
    fragments_dropped: u64,
    turns_committed: u64,
}

impl LiveSession {
    pub fn new(
        setup: SessionSetup,
        capture: Box<dyn CaptureDevice>,
        transport: Box<dyn Transport>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        Self {
            setup,
            priming_text: Some(defaults::PRIMING_TEXT.to_string()),
            state: StateMachine::new(),
            capture: CapturePipeline::new(capture),
            transport,
            link: None,
            playback: PlaybackScheduler::new(output),
            transcript: TranscriptAccumulator::new(),
            updates: None,
            reporter: Arc::new(TracingReporter),
            fragments_dropped: 0,
            turns_committed: 0,
        }
    }

    /// Text sent as soon as the session opens. `None` sends nothing.
    pub fn with_priming_text(mut self, text: Option<String>) -> Self {
        self.priming_text = text.filter(|t| !t.is_empty());
        self
    }

    pub fn with_muted(self, muted: bool) -> Self {
        self.capture.set_muted(muted);
        self
    }

    /// Receive non-blocking [`SessionUpdate`]s. Updates that do not fit are
    /// dropped.
    pub fn with_updates(mut self, updates: Sender<SessionUpdate>) -> Self {
        self.updates = Some(updates);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn setup(&self) -> &SessionSetup {
        &self.setup
    }

    pub fn status(&self) -> SessionState {
        self.state.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Committed transcript turns.
    pub fn transcript(&self) -> &[TranscriptEntry] {
        self.transcript.entries()
    }

    /// In-progress text for `speaker`.
    pub fn pending_text(&self, speaker: Speaker) -> &str {
        self.transcript.pending(speaker)
    }

    pub fn playback(&self) -> &PlaybackScheduler {
        &self.playback
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_attached()
    }

    pub fn set_muted(&self, muted: bool) {
        self.capture.set_muted(muted);
        tracing::info!(muted, "microphone");
    }

    pub fn is_muted(&self) -> bool {
        self.capture.is_muted()
    }

    /// Shared mute flag, for toggling from another task.
    pub fn mute_flag(&self) -> Arc<AtomicBool> {
        self.capture.mute_flag()
    }

    pub fn stats(&self) -> SessionStats {
        let capture = self.capture.stats();
        let playback = self.playback.counts();
        SessionStats {
            blocks_captured: capture.blocks,
            chunks_sent: capture.sent,
            muted_drops: capture.muted_drops,
            fragments_scheduled: playback.scheduled,
            fragments_dropped: self.fragments_dropped,
            interruptions: playback.interruptions,
            turns_committed: self.turns_committed,
        }
    }

    /// Acquire the microphone, then connect.
    ///
    /// The session is `connecting` when this returns `Ok`; it opens once the
    /// transport reports [`TransportEvent::Opened`].
    ///
    /// # Errors
    /// - `CapturePermissionDenied` (or another capture error) if the device
    ///   cannot be acquired; the session is then `error` and never connects.
    /// - `TransportConnect` if the connection fails; the session is `error`.
    /// - `InvalidTransition` if the session was already started.
    pub async fn start(&mut self) -> Result<()> {
        let current = self.state.current();
        if current != SessionState::Idle {
            return Err(CognitaError::InvalidTransition {
                from: current.to_string(),
                to: SessionState::Connecting.to_string(),
            });
        }

        if let Err(e) = self.capture.acquire() {
            let message = match &e {
                CognitaError::CapturePermissionDenied { message } => message.clone(),
                other => other.to_string(),
            };
            self.fail(SessionFailure::PermissionDenied(message));
            return Err(e);
        }

        self.set_state(SessionState::Connecting);

        match self.transport.connect(&self.setup).await {
            Ok(link) => {
                self.link = Some(link);
                Ok(())
            }
            Err(e) => {
                self.fail(SessionFailure::Transport(e.to_string()));
                Err(e)
            }
        }
    }

    /// Wait for the next transport event. `None` means the link is gone.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        match self.link.as_mut() {
            Some(link) => link.recv().await,
            None => None,
        }
    }

    /// Handle events until the session reaches a terminal state.
    ///
    /// Returns at once if the session was never started.
    pub async fn run(&mut self) {
        if self.status() == SessionState::Idle {
            tracing::debug!("run called before start");
            return;
        }
        while !self.status().is_terminal() {
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => self.connection_lost(),
            }
        }
    }

    /// Apply one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        let state = self.state.current();
        if state.is_terminal() {
            tracing::debug!(?event, %state, "event after session ended");
            return;
        }

        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Inbound(inbound) => {
                if state.is_open() {
                    self.dispatch(inbound);
                } else {
                    tracing::debug!(?inbound, %state, "inbound event before open");
                }
            }
            TransportEvent::GoAway { time_left } => {
                tracing::warn!(
                    time_left = time_left.as_deref().unwrap_or("unknown"),
                    "server will close the session soon"
                );
            }
            TransportEvent::Closed { reason } => {
                tracing::info!(reason = reason.as_deref().unwrap_or(""), "remote closed session");
                self.stop();
            }
            TransportEvent::Failed { message } => {
                self.reporter
                    .report("transport", &SessionFault::Fatal(message.clone()));
                self.fail(SessionFailure::Transport(message));
            }
        }
    }

    /// The inbound stream ended without a close or failure event.
    pub fn connection_lost(&mut self) {
        if self.status().is_terminal() {
            return;
        }
        let message = "connection lost".to_string();
        self.reporter
            .report("transport", &SessionFault::Fatal(message.clone()));
        self.fail(SessionFailure::Transport(message));
    }

    /// Send a text message. Returns false unless the session is open.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        if !self.status().is_open() {
            tracing::debug!("send_text ignored: session not open");
            return false;
        }
        self.link
            .as_ref()
            .is_some_and(|link| link.outbound().send_text(text))
    }

    /// End the session and release everything it owns. Idempotent.
    pub fn stop(&mut self) {
        self.teardown();
        if !self.status().is_terminal() {
            self.set_state(SessionState::Closed);
        }
    }

    fn on_opened(&mut self) {
        if self.state.current() != SessionState::Connecting {
            tracing::debug!("duplicate open acknowledgement");
            return;
        }
        let Some(sink) = self.link.as_ref().map(|link| link.outbound().clone()) else {
            self.fail(SessionFailure::Transport("no transport link".to_string()));
            return;
        };

        if let Some(text) = &self.priming_text
            && !sink.send_text(text.clone())
        {
            tracing::warn!("priming text not delivered");
        }

        if let Err(e) = self.capture.attach(Box::new(sink)) {
            self.reporter
                .report("capture", &SessionFault::Fatal(e.to_string()));
            self.fail(SessionFailure::PermissionDenied(e.to_string()));
            return;
        }

        self.set_state(SessionState::Open);
    }

    fn dispatch(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Audio(fragment) => self.on_audio(fragment),
            InboundEvent::Text(fragment) => self.on_text(fragment),
            InboundEvent::Control(ControlSignal::TurnComplete) => self.on_turn_complete(),
            InboundEvent::Control(ControlSignal::Interrupted) => self.on_interrupted(),
        }
    }

    fn on_audio(&mut self, fragment: AudioFragment) {
        match self
            .playback
            .enqueue(&fragment.data, fragment.mime_type.as_deref())
        {
            Ok(unit) => {
                tracing::debug!(start = unit.start_at, duration = unit.duration, "scheduled");
                self.publish(SessionUpdate::PlaybackScheduled {
                    start_at: unit.start_at,
                    duration: unit.duration,
                });
            }
            Err(e) => {
                self.fragments_dropped += 1;
                self.reporter
                    .report("playback", &SessionFault::Recoverable(e.to_string()));
                self.publish(SessionUpdate::FragmentDropped {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn on_text(&mut self, fragment: TextFragment) {
        self.transcript.push_delta(fragment.speaker, &fragment.text);
        self.publish(SessionUpdate::TranscriptDelta {
            speaker: fragment.speaker,
            text: fragment.text,
        });
    }

    fn on_turn_complete(&mut self) {
        for entry in self.transcript.complete_turn() {
            tracing::debug!(speaker = %entry.speaker, "turn committed");
            self.turns_committed += 1;
            self.publish(SessionUpdate::TranscriptCommitted(entry));
        }
    }

    fn on_interrupted(&mut self) {
        self.transcript.discard(Speaker::Assistant);
        let cancelled = self.playback.interrupt();
        tracing::info!(cancelled, "interrupted");
        self.publish(SessionUpdate::Interrupted { cancelled });
    }

    fn fail(&mut self, failure: SessionFailure) {
        self.teardown();
        self.set_state(SessionState::Error(failure));
    }

    fn teardown(&mut self) {
        self.capture.release();
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.playback.close();
    }

    fn set_state(&mut self, next: SessionState) {
        match self.state.transition(next.clone()) {
            Ok(()) => self.publish(SessionUpdate::Status(next)),
            Err(e) => tracing::debug!("{}", e),
        }
    }

    fn publish(&self, update: SessionUpdate) {
        let Some(updates) = &self.updates else {
            return;
        };
        match updates.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::trace!("update channel full, dropping update"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::MockCaptureDevice;
    use crate::audio::encode::pcm16_to_bytes;
    use crate::playback::output::{ManualClock, MockAudioOutput, MockOutputProbe};
    use crate::session::transport::{MockTransport, MockTransportHandle};
    use base64::prelude::*;

    struct Rig {
        session: LiveSession,
        transport: MockTransportHandle,
        output: MockOutputProbe,
        clock: ManualClock,
    }

    fn rig(capture: MockCaptureDevice) -> Rig {
        rig_with(capture, None)
    }

    fn rig_with(capture: MockCaptureDevice, updates: Option<Sender<SessionUpdate>>) -> Rig {
        let clock = ManualClock::new(1.0);
        let output = MockAudioOutput::new(clock.clone());
        let output_probe = output.probe();
        let transport = MockTransport::new();
        let handle = transport.handle();
        let mut session = LiveSession::new(
            SessionSetup::new("models/test"),
            Box::new(capture),
            Box::new(transport),
            Box::new(output),
        );
        if let Some(updates) = updates {
            session = session.with_updates(updates);
        }
        Rig {
            session,
            transport: handle,
            output: output_probe,
            clock,
        }
    }

    fn fragment(seconds: f64) -> TransportEvent {
        let samples = vec![1000i16; (seconds * 24000.0) as usize];
        InboundEvent::Audio(AudioFragment {
            data: BASE64_STANDARD.encode(pcm16_to_bytes(&samples)),
            mime_type: Some("audio/pcm;rate=24000".to_string()),
        })
        .into()
    }

    fn text(speaker: Speaker, text: &str) -> TransportEvent {
        InboundEvent::Text(TextFragment {
            speaker,
            text: text.to_string(),
        })
        .into()
    }

    fn control(signal: ControlSignal) -> TransportEvent {
        InboundEvent::Control(signal).into()
    }

    async fn open(rig: &mut Rig) {
        rig.session.start().await.unwrap();
        rig.session.handle_event(TransportEvent::Opened);
        assert_eq!(rig.session.status(), SessionState::Open);
    }

    #[tokio::test]
    async fn start_connects_and_open_primes() {
        let capture = MockCaptureDevice::new();
        let probe = capture.probe();
        let mut rig = rig(capture);

        rig.session.start().await.unwrap();
        assert_eq!(rig.session.status(), SessionState::Connecting);
        assert!(!probe.is_attached());

        rig.session.handle_event(TransportEvent::Opened);
        assert_eq!(rig.session.status(), SessionState::Open);
        assert!(probe.is_attached());
        assert_eq!(rig.transport.sent_text(), vec!["Begin now.".to_string()]);
    }

    #[tokio::test]
    async fn permission_denied_never_connects() {
        let capture = MockCaptureDevice::new().with_permission_denied();
        let probe = capture.probe();
        let mut rig = rig(capture);

        let err = rig.session.start().await.unwrap_err();
        assert!(matches!(err, CognitaError::CapturePermissionDenied { .. }));
        assert!(matches!(
            rig.session.status(),
            SessionState::Error(SessionFailure::PermissionDenied(_))
        ));
        assert_eq!(rig.transport.connects(), 0);
        assert_eq!(probe.attach_calls(), 0);
        assert!(!probe.push_block(&[0.5; 16]));
    }

    #[tokio::test]
    async fn connect_failure_is_transport_error() {
        let clock = ManualClock::new(0.0);
        let output = MockAudioOutput::new(clock);
        let output_probe = output.probe();
        let capture = MockCaptureDevice::new();
        let probe = capture.probe();
        let mut session = LiveSession::new(
            SessionSetup::new("m"),
            Box::new(capture),
            Box::new(MockTransport::new().with_connect_error("refused")),
            Box::new(output),
        );

        assert!(session.start().await.is_err());
        assert_eq!(
            session.status(),
            SessionState::Error(SessionFailure::Transport(
                "Live connection failed: refused".to_string()
            ))
        );
        assert!(probe.release_calls() >= 1);
        assert!(output_probe.is_closed());
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut rig = rig(MockCaptureDevice::new());
        rig.session.start().await.unwrap();
        assert!(matches!(
            rig.session.start().await,
            Err(CognitaError::InvalidTransition { .. })
        ));
        assert_eq!(rig.transport.connects(), 1);
    }

    #[tokio::test]
    async fn fragments_schedule_back_to_back_then_interrupt() {
        let mut rig = rig(MockCaptureDevice::new());
        open(&mut rig).await;

        for _ in 0..3 {
            rig.session.handle_event(fragment(0.5));
        }
        let starts: Vec<f64> = rig.output.active().iter().map(|u| u.start_at).collect();
        assert_eq!(starts, vec![1.0, 1.5, 2.0]);

        rig.clock.advance(0.25);
        rig.session.handle_event(control(ControlSignal::Interrupted));
        assert_eq!(rig.session.playback().pending(), 0);
        assert!(rig.output.active().is_empty());
        assert_eq!(rig.session.playback().cursor(), 1.25);
        assert_eq!(rig.session.stats().interruptions, 1);
    }

    #[tokio::test]
    async fn transcript_commits_on_turn_complete() {
        let mut rig = rig(MockCaptureDevice::new());
        open(&mut rig).await;

        rig.session.handle_event(text(Speaker::Assistant, "Hel"));
        rig.session.handle_event(text(Speaker::Assistant, "lo"));
        rig.session.handle_event(control(ControlSignal::TurnComplete));
        rig.session.handle_event(control(ControlSignal::TurnComplete));

        assert_eq!(
            rig.session.transcript(),
            &[TranscriptEntry {
                speaker: Speaker::Assistant,
                text: "Hello".to_string()
            }]
        );
        assert_eq!(rig.session.stats().turns_committed, 1);
    }

    #[tokio::test]
    async fn interruption_discards_assistant_text_only() {
        let mut rig = rig(MockCaptureDevice::new());
        open(&mut rig).await;

        rig.session.handle_event(text(Speaker::User, "wait"));
        rig.session.handle_event(text(Speaker::Assistant, "As I was"));
        rig.session.handle_event(control(ControlSignal::Interrupted));

        assert_eq!(rig.session.pending_text(Speaker::Assistant), "");
        assert_eq!(rig.session.pending_text(Speaker::User), "wait");
    }

    #[tokio::test]
    async fn bad_fragment_is_dropped_and_session_continues() {
        let mut rig = rig(MockCaptureDevice::new());
        open(&mut rig).await;

        rig.session.handle_event(
            InboundEvent::Audio(AudioFragment {
                data: "not base64!".to_string(),
                mime_type: None,
            })
            .into(),
        );
        rig.session.handle_event(fragment(0.25));

        assert_eq!(rig.session.status(), SessionState::Open);
        let stats = rig.session.stats();
        assert_eq!(stats.fragments_dropped, 1);
        assert_eq!(stats.fragments_scheduled, 1);
    }

    #[tokio::test]
    async fn inbound_before_open_is_ignored() {
        let mut rig = rig(MockCaptureDevice::new());
        rig.session.start().await.unwrap();
        rig.session.handle_event(fragment(0.5));
        assert!(rig.output.history().is_empty());
    }

    #[tokio::test]
    async fn stop_twice_is_same_as_once() {
        let capture = MockCaptureDevice::new();
        let probe = capture.probe();
        let mut rig = rig(capture);
        open(&mut rig).await;
        rig.session.handle_event(fragment(0.5));

        rig.session.stop();
        rig.session.stop();

        assert_eq!(rig.session.status(), SessionState::Closed);
        assert_eq!(probe.release_calls(), 1);
        assert_eq!(rig.output.close_calls(), 1);
        assert!(rig.output.active().is_empty());
        assert!(rig.transport.link_closed());
        assert!(!rig.session.send_text("late"));
    }

    #[tokio::test]
    async fn remote_failure_tears_down() {
        let capture = MockCaptureDevice::new();
        let probe = capture.probe();
        let mut rig = rig(capture);
        open(&mut rig).await;

        rig.session.handle_event(TransportEvent::Failed {
            message: "reset".to_string(),
        });
        assert_eq!(
            rig.session.status(),
            SessionState::Error(SessionFailure::Transport("reset".to_string()))
        );
        assert!(!probe.is_attached());
        assert!(rig.output.is_closed());

        rig.session.stop();
        assert!(matches!(rig.session.status(), SessionState::Error(_)));
    }

    #[tokio::test]
    async fn run_ends_on_remote_close() {
        let mut rig = rig(MockCaptureDevice::new());
        rig.session.start().await.unwrap();
        rig.transport.open();
        rig.transport.push(TransportEvent::Closed { reason: None });

        rig.session.run().await;
        assert_eq!(rig.session.status(), SessionState::Closed);
    }

    #[tokio::test]
    async fn run_treats_hang_up_as_failure() {
        let mut rig = rig(MockCaptureDevice::new());
        rig.session.start().await.unwrap();
        rig.transport.open();
        rig.transport.hang_up();

        rig.session.run().await;
        assert_eq!(
            rig.session.status(),
            SessionState::Error(SessionFailure::Transport("connection lost".to_string()))
        );
    }

    #[tokio::test]
    async fn updates_are_published() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut rig = rig_with(MockCaptureDevice::new(), Some(tx));
        open(&mut rig).await;
        rig.session.handle_event(text(Speaker::Assistant, "Hi"));
        rig.session.handle_event(control(ControlSignal::TurnComplete));

        let updates: Vec<SessionUpdate> = rx.try_iter().collect();
        assert_eq!(updates[0], SessionUpdate::Status(SessionState::Connecting));
        assert_eq!(updates[1], SessionUpdate::Status(SessionState::Open));
        assert!(updates.contains(&SessionUpdate::TranscriptCommitted(TranscriptEntry {
            speaker: Speaker::Assistant,
            text: "Hi".to_string()
        })));
    }

    #[tokio::test]
    async fn full_update_channel_never_blocks() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let mut session = LiveSession::new(
            SessionSetup::new("m"),
            Box::new(MockCaptureDevice::new()),
            Box::new(MockTransport::new()),
            Box::new(MockAudioOutput::new(ManualClock::new(0.0))),
        )
        .with_updates(tx);
        session.start().await.unwrap();
        session.handle_event(TransportEvent::Opened);
        session.stop();
        assert_eq!(session.status(), SessionState::Closed);
    }

    #[tokio::test]
    async fn run_before_start_returns() {
        let mut rig = rig(MockCaptureDevice::new());
        let finished =
            tokio::time::timeout(std::time::Duration::from_secs(1), rig.session.run()).await;
        assert!(finished.is_ok());
        assert_eq!(rig.session.status(), SessionState::Idle);
        assert_eq!(rig.transport.connects(), 0);
    }

    #[tokio::test]
    async fn failure_while_idle_is_terminal() {
        let mut rig = rig(MockCaptureDevice::new());
        rig.session.handle_event(TransportEvent::Failed {
            message: "stray".to_string(),
        });
        assert_eq!(
            rig.session.status(),
            SessionState::Error(SessionFailure::Transport("stray".to_string()))
        );
        assert!(rig.session.start().await.is_err());
        assert_eq!(rig.transport.connects(), 0);
    }

    #[tokio::test]
    async fn lost_connection_before_start_is_terminal() {
        let mut rig = rig(MockCaptureDevice::new());
        rig.session.connection_lost();
        assert!(rig.session.status().is_terminal());
    }

    #[tokio::test]
    async fn attach_failure_at_open_tears_down() {
        let capture = MockCaptureDevice::new().with_attach_failure();
        let probe = capture.probe();
        let mut rig = rig(capture);

        rig.session.start().await.unwrap();
        assert_eq!(rig.session.status(), SessionState::Connecting);
        rig.session.handle_event(TransportEvent::Opened);

        assert!(matches!(
            rig.session.status(),
            SessionState::Error(SessionFailure::PermissionDenied(_))
        ));
        assert_eq!(probe.attach_calls(), 1);
        assert_eq!(probe.release_calls(), 1);
        assert!(!probe.is_attached());
        assert!(rig.transport.link_closed());
        assert!(rig.output.is_closed());
        assert!(!rig.session.is_capturing());
        assert!(!rig.session.send_text("hello?"));
    }

    #[tokio::test]
    async fn starts_muted_when_built_muted() {
        let capture = MockCaptureDevice::new().with_blocks(vec![vec![0.5; 64]; 2]);
        let clock = ManualClock::new(0.0);
        let transport = MockTransport::new();
        let remote = transport.handle();
        let mut session = LiveSession::new(
            SessionSetup::new("m"),
            Box::new(capture),
            Box::new(transport),
            Box::new(MockAudioOutput::new(clock)),
        )
        .with_muted(true);
        assert!(session.is_muted());

        session.start().await.unwrap();
        session.handle_event(TransportEvent::Opened);

        assert!(session.is_capturing());
        assert!(remote.sent_audio().is_empty());
        let stats = session.stats();
        assert_eq!(stats.blocks_captured, 2);
        assert_eq!(stats.muted_drops, 2);
    }
}
