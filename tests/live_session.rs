//! End-to-end session behavior through the public API, with mock devices and
//! an in-memory transport.

use base64::prelude::*;
use cognita::audio::encode::pcm16_to_bytes;
use cognita::audio::{CaptureDevice, MockCaptureDevice, MockCaptureProbe};
use cognita::playback::{ManualClock, MockAudioOutput, MockOutputProbe};
use cognita::session::protocol::parse_server_frame;
use cognita::session::{
    AudioFragment, ControlSignal, InboundEvent, LiveSession, MockTransport, MockTransportHandle,
    Outbound, SessionFailure, SessionPreset, SessionSetup, SessionState, Speaker, TextFragment,
    TranscriptEntry, TransportEvent, spawn,
};
use cognita::CognitaError;
use serde_json::json;

struct Harness {
    session: LiveSession,
    capture: MockCaptureProbe,
    transport: MockTransportHandle,
    output: MockOutputProbe,
    clock: ManualClock,
}

fn harness(capture: MockCaptureDevice) -> Harness {
    harness_with(capture, |session| session)
}

fn harness_with(
    capture: MockCaptureDevice,
    configure: impl FnOnce(LiveSession) -> LiveSession,
) -> Harness {
    let clock = ManualClock::new(10.0);
    let output = MockAudioOutput::new(clock.clone());
    let transport = MockTransport::new();
    let capture_probe = capture.probe();
    let transport_handle = transport.handle();
    let output_probe = output.probe();
    let session = configure(LiveSession::new(
        SessionSetup::new("models/live-test"),
        Box::new(capture),
        Box::new(transport),
        Box::new(output),
    ));
    Harness {
        session,
        capture: capture_probe,
        transport: transport_handle,
        output: output_probe,
        clock,
    }
}

async fn open(h: &mut Harness) {
    h.session.start().await.unwrap();
    h.session.handle_event(TransportEvent::Opened);
    assert_eq!(h.session.status(), SessionState::Open);
}

/// `seconds` of 24kHz speech as an inbound fragment.
fn speech(seconds: f64) -> TransportEvent {
    let samples = vec![-1200i16; (seconds * 24000.0) as usize];
    InboundEvent::Audio(AudioFragment {
        data: BASE64_STANDARD.encode(pcm16_to_bytes(&samples)),
        mime_type: Some("audio/pcm;rate=24000".to_string()),
    })
    .into()
}

fn assistant(text: &str) -> TransportEvent {
    InboundEvent::Text(TextFragment {
        speaker: Speaker::Assistant,
        text: text.to_string(),
    })
    .into()
}

#[tokio::test]
async fn denied_microphone_ends_in_error_without_connecting() {
    let mut h = harness(MockCaptureDevice::new().with_permission_denied());

    let err = h.session.start().await.unwrap_err();

    assert!(matches!(err, CognitaError::CapturePermissionDenied { .. }));
    assert!(matches!(
        h.session.status(),
        SessionState::Error(SessionFailure::PermissionDenied(_))
    ));
    assert_eq!(h.transport.connects(), 0);
    assert!(!h.capture.push_block(&[0.1; 64]));
    assert!(!h.session.send_text("anyone there?"));
}

#[tokio::test]
async fn speech_plays_gaplessly_and_interruption_flushes_it() {
    let mut h = harness(MockCaptureDevice::new());
    open(&mut h).await;

    for _ in 0..3 {
        h.session.handle_event(speech(0.5));
    }
    let starts: Vec<f64> = h.output.active().iter().map(|u| u.start_at).collect();
    assert_eq!(starts, vec![10.0, 10.5, 11.0]);

    h.clock.advance(0.75);
    h.session
        .handle_event(InboundEvent::Control(ControlSignal::Interrupted).into());

    assert!(h.output.active().is_empty());
    assert_eq!(h.output.cancelled().len(), 3);
    assert_eq!(h.session.playback().cursor(), 10.75);

    // The next answer starts right away, not after the flushed audio.
    h.session.handle_event(speech(0.5));
    assert_eq!(h.output.active()[0].start_at, 10.75);
}

#[tokio::test]
async fn late_fragment_starts_at_now() {
    let mut h = harness(MockCaptureDevice::new());
    open(&mut h).await;

    h.session.handle_event(speech(0.5));
    h.clock.advance(2.0);
    h.session.handle_event(speech(0.5));

    let starts: Vec<f64> = h.output.history().iter().map(|u| u.start_at).collect();
    assert_eq!(starts, vec![10.0, 12.0]);
}

#[tokio::test]
async fn assistant_text_accumulates_into_one_turn() {
    let mut h = harness(MockCaptureDevice::new());
    open(&mut h).await;

    h.session.handle_event(assistant("Hel"));
    h.session.handle_event(assistant("lo"));
    assert_eq!(h.session.pending_text(Speaker::Assistant), "Hello");

    h.session
        .handle_event(InboundEvent::Control(ControlSignal::TurnComplete).into());

    assert_eq!(
        h.session.transcript(),
        &[TranscriptEntry {
            speaker: Speaker::Assistant,
            text: "Hello".to_string(),
        }]
    );
    assert_eq!(h.session.pending_text(Speaker::Assistant), "");
}

#[tokio::test]
async fn muted_capture_sends_nothing_but_keeps_running() {
    let blocks = vec![vec![0.25f32; 512]; 4];
    let mut h = harness(
        MockCaptureDevice::new()
            .with_block_size(512)
            .with_blocks(blocks.clone()),
    );
    h.session.set_muted(true);
    open(&mut h).await;

    assert!(h.session.is_capturing());
    assert!(h.transport.sent_audio().is_empty());
    assert_eq!(h.session.stats().muted_drops, 4);

    h.session.set_muted(false);
    for block in &blocks {
        assert!(h.capture.push_block(block));
    }

    let sent = h.transport.sent_audio();
    assert_eq!(sent.len(), 4);
    for chunk in &sent {
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
        assert_eq!(chunk.byte_len(), 512 * 2);
        assert_eq!(BASE64_STANDARD.decode(&chunk.data).unwrap().len(), 1024);
    }
}

#[tokio::test]
async fn open_sends_priming_text_before_audio() {
    let capture = MockCaptureDevice::new().with_blocks(vec![vec![0.5; 128]]);
    let mut h = harness_with(capture, |session| {
        session.with_priming_text(Some(SessionPreset::Quest.priming_text().to_string()))
    });
    open(&mut h).await;

    let sent = h.transport.sent();
    assert_eq!(h.transport.sent_text(), vec!["Start the quiz.".to_string()]);
    assert!(matches!(sent.first(), Some(Outbound::Text(_))));
    assert_eq!(sent.len(), 2);
}

#[tokio::test]
async fn stop_is_idempotent_and_releases_everything() {
    let mut h = harness(MockCaptureDevice::new());
    open(&mut h).await;
    h.session.handle_event(speech(0.5));

    h.session.stop();
    h.session.stop();

    assert_eq!(h.session.status(), SessionState::Closed);
    assert_eq!(h.capture.release_calls(), 1);
    assert_eq!(h.output.close_calls(), 1);
    assert!(h.output.active().is_empty());
    assert!(h.transport.link_closed());
    assert!(!h.session.send_text("too late"));
}

#[tokio::test]
async fn server_frames_drive_the_session() {
    let mut h = harness(MockCaptureDevice::new());
    h.session.start().await.unwrap();

    let samples = BASE64_STANDARD.encode(pcm16_to_bytes(&[100i16; 2400]));
    let frames = [
        json!({ "setupComplete": {} }),
        json!({ "serverContent": { "modelTurn": { "parts": [
            { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": samples } },
            { "text": "Photosynthesis " }
        ] } } }),
        json!({ "serverContent": {
            "outputTranscription": { "text": "turns light into sugar." },
            "turnComplete": true
        } }),
    ];
    for frame in &frames {
        let bytes = serde_json::to_vec(frame).unwrap();
        for event in parse_server_frame(&bytes).unwrap() {
            h.session.handle_event(event);
        }
    }

    assert_eq!(h.session.status(), SessionState::Open);
    assert_eq!(h.output.history().len(), 1);
    assert_eq!(h.output.history()[0].samples, 2400);
    assert_eq!(
        h.session.transcript(),
        &[TranscriptEntry {
            speaker: Speaker::Assistant,
            text: "Photosynthesis turns light into sugar.".to_string(),
        }]
    );
}

#[tokio::test]
async fn spawned_session_round_trip() {
    let transport = MockTransport::new().with_open_on_connect();
    let remote = transport.handle();
    let capture = MockCaptureDevice::new();
    let capture_probe = capture.probe();
    let session = LiveSession::new(
        SessionSetup::new("models/live-test"),
        Box::new(capture),
        Box::new(transport),
        Box::new(MockAudioOutput::new(ManualClock::new(0.0))),
    );
    assert_eq!(capture_probe.attach_calls(), 0);

    let handle = spawn(session);
    handle.opened().await.unwrap();
    assert!(handle.send_text("Explain osmosis").await);

    remote.push(assistant("Water moves"));
    remote.push(InboundEvent::Control(ControlSignal::TurnComplete));
    remote.push(TransportEvent::Closed { reason: None });

    let state = handle.wait_for(|s| s.is_terminal()).await;
    assert_eq!(state, SessionState::Closed);

    let report = handle.join().await.unwrap();
    assert_eq!(report.transcript.len(), 1);
    assert_eq!(report.transcript[0].text, "Water moves");
    assert_eq!(
        remote.sent_text(),
        vec!["Begin now.".to_string(), "Explain osmosis".to_string()]
    );
    assert!(!capture_probe.is_attached());
}

#[test]
fn mock_device_reports_block_size() {
    let device = MockCaptureDevice::new().with_block_size(1024);
    assert_eq!(device.block_size(), 1024);
}
