//! cognita - live voice lectures for the Cognita study assistant
//!
//! Streams microphone audio to a remote live model over a WebSocket and plays
//! its spoken answers back gaplessly, with barge-in and running transcripts.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(all(feature = "cpal-audio", feature = "cli"))]
pub mod app;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod playback;
pub mod session;

// Device seams (capture → transport → playback)
pub use audio::device::CaptureDevice;
pub use playback::output::{AudioClock, AudioOutput};
pub use session::transport::Transport;

// Session
pub use session::handle::{SessionHandle, SessionReport, spawn};
pub use session::live::{LiveSession, SessionStats};
pub use session::state::{SessionFailure, SessionState};

// Error handling
pub use error::{CognitaError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(ver.contains('+'), "expected '+' in {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
