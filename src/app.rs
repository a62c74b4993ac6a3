//! Live lecture entry point.
//!
//! Wires the CPAL microphone and speaker, the WebSocket transport, and a
//! console front end around one [`LiveSession`]:
//! stdin lines → text messages, committed transcript turns → stdout.

use crate::audio::capture::CpalCaptureDevice;
use crate::cli::{ConsoleInput, LectureArgs};
use crate::config::Config;
use crate::defaults;
use crate::error::{CognitaError, Result};
use crate::playback::cpal_output::CpalAudioOutput;
use crate::session::event::{SessionUpdate, Speaker, TranscriptEntry};
use crate::session::handle::{SessionHandle, spawn};
use crate::session::live::{LiveSession, SessionStats};
use crate::session::protocol::ResponseModality;
use crate::session::state::SessionState;
use crate::session::websocket::WebSocketTransport;
use owo_colors::OwoColorize;
use std::thread;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Apply command-line overrides on top of the loaded configuration.
pub fn apply_overrides(mut config: Config, args: &LectureArgs) -> Config {
    if let Some(device) = &args.device {
        config.audio.input_device = Some(device.clone());
    }
    if let Some(preset) = args.preset {
        config.live.preset = preset;
    }
    if args.text_only {
        config.live.response_modality = ResponseModality::Text;
    }
    if args.muted {
        config.audio.start_muted = true;
    }
    config
}

/// Build a session for `config` on the real devices.
fn build_session(config: &Config, args: &LectureArgs) -> Result<LiveSession> {
    let preset = config.live.preset;
    let instruction = preset.instruction(args.topic.as_deref(), args.instruction.as_deref());
    let setup = config.live.session_setup(Some(instruction));

    let capture = CpalCaptureDevice::new(config.audio.input_device.as_deref())
        .with_block_size(config.audio.block_size);
    let output = CpalAudioOutput::open(config.audio.output_device.as_deref())?;
    if output.device_rate() != defaults::OUTPUT_SAMPLE_RATE {
        tracing::info!(
            device_rate = output.device_rate(),
            "speaker runs at a different rate, resampling model speech"
        );
    }
    let transport =
        WebSocketTransport::new(config.live.endpoint.clone(), config.live.api_key.clone());

    Ok(LiveSession::new(
        setup,
        Box::new(capture),
        Box::new(transport),
        Box::new(output),
    )
    .with_priming_text(Some(preset.priming_text().to_string()))
    .with_muted(config.audio.start_muted))
}

fn speaker_label(speaker: Speaker) -> String {
    match speaker {
        Speaker::User => "you:".cyan().bold().to_string(),
        Speaker::Assistant => "cognita:".green().bold().to_string(),
    }
}

fn print_entry(entry: &TranscriptEntry) {
    println!("{} {}", speaker_label(entry.speaker), entry.text.trim());
}

fn print_status(state: &SessionState) {
    match state {
        SessionState::Error(_) => eprintln!("{} {}", "status:".dimmed(), state.red()),
        other => eprintln!("{} {}", "status:".dimmed(), other),
    }
}

/// Print updates from a plain thread so a slow terminal never stalls the
/// dispatch loop.
fn spawn_printer(
    updates: crossbeam_channel::Receiver<SessionUpdate>,
    quiet: bool,
    verbosity: u8,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for update in updates {
            match update {
                SessionUpdate::TranscriptCommitted(entry) => print_entry(&entry),
                SessionUpdate::Status(state) if !quiet => print_status(&state),
                SessionUpdate::Interrupted { cancelled } if verbosity >= 1 => {
                    eprintln!("{}", format!("[interrupted, {} cancelled]", cancelled).dimmed());
                }
                SessionUpdate::FragmentDropped { reason } if verbosity >= 1 => {
                    eprintln!("{}", format!("[dropped fragment: {}]", reason).yellow());
                }
                _ => {}
            }
        }
    })
}

fn print_summary(stats: &SessionStats) {
    eprintln!(
        "{} {} blocks captured, {} sent, {} muted, {} fragments played, {} dropped, {} interruptions",
        "session:".dimmed(),
        stats.blocks_captured,
        stats.chunks_sent,
        stats.muted_drops,
        stats.fragments_scheduled,
        stats.fragments_dropped,
        stats.interruptions,
    );
}

/// Read console lines until the session ends, Ctrl+C, /quit or EOF.
async fn console_loop(handle: &SessionHandle, quiet: bool) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut status = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("\nShutting down...");
                }
                return Ok(());
            }
            _ = status.wait_for(|s| s.is_terminal()) => return Ok(()),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                match ConsoleInput::parse(&line) {
                    ConsoleInput::Text(text) => {
                        if !handle.send_text(text).await {
                            eprintln!("{}", "session is not open; message dropped".yellow());
                        }
                    }
                    ConsoleInput::Mute => handle.set_muted(true),
                    ConsoleInput::Unmute => handle.set_muted(false),
                    ConsoleInput::Quit => return Ok(()),
                    ConsoleInput::Unknown(cmd) => {
                        eprintln!("unknown command {} (try /mute, /unmute, /quit)", cmd);
                    }
                    ConsoleInput::Empty => {}
                }
            }
        }
    }
}

/// Run a live lecture until the user quits or the session ends.
pub async fn run_lecture(
    config: Config,
    args: LectureArgs,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    let config = apply_overrides(config, &args);
    config.validate()?;

    let (updates_tx, updates_rx) = crossbeam_channel::bounded(defaults::UPDATE_BUFFER);
    let session = build_session(&config, &args)?.with_updates(updates_tx);

    if !quiet {
        eprintln!(
            "Starting {} session with {}...",
            config.live.preset.green(),
            config.live.model
        );
    }

    let printer = spawn_printer(updates_rx, quiet, verbosity);
    let handle = spawn(session);

    let console = console_loop(&handle, quiet).await;
    let report = handle.shutdown().await?;

    // The session task dropped its update sender, so the printer drains and exits.
    if printer.join().is_err() {
        tracing::warn!("transcript printer panicked");
    }

    if !quiet {
        print_summary(&report.stats);
    }
    console?;

    match report.state {
        SessionState::Error(failure) => Err(CognitaError::Other(failure.to_string())),
        _ => Ok(()),
    }
}
