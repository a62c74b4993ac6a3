//! Error types for cognita.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CognitaError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Microphone permission denied: {message}")]
    CapturePermissionDenied { message: String },

    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Playback errors
    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    #[error("Failed to decode audio fragment: {message}")]
    AudioDecode { message: String },

    // Live transport errors
    #[error("Live connection failed: {message}")]
    TransportConnect { message: String },

    #[error("Live protocol error: {message}")]
    Protocol { message: String },

    #[error("Session is not open (state: {state})")]
    SessionNotOpen { state: String },

    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for CognitaError {
    fn from(err: serde_json::Error) -> Self {
        CognitaError::Protocol {
            message: err.to_string(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, CognitaError>;
