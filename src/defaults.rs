//! Default configuration constants for cognita.
//!
//! Shared by the config types, the capture pipeline, and the playback
//! scheduler so the wire format is declared in exactly one place.

/// Outbound (microphone) sample rate in Hz expected by the live endpoint.
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Inbound (model speech) sample rate in Hz used when a fragment does not
/// declare its own rate.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Samples per captured block.
///
/// 4096 samples at 16kHz is 256ms of audio per outbound chunk.
pub const BLOCK_SIZE: usize = 4096;

/// MIME label attached to every outbound audio chunk.
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";

/// Scale factor applied to float samples before truncation to i16.
pub const PCM16_SCALE: f32 = 32768.0;

/// Default live endpoint.
pub const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default live model.
pub const LIVE_MODEL: &str = "models/gemini-2.0-flash-exp";

/// Default prebuilt voice for spoken responses.
pub const VOICE: &str = "Puck";

/// Text sent right after the session opens so the model starts speaking.
pub const PRIMING_TEXT: &str = "Begin now.";

/// Capacity of the non-blocking observer channel used by the CLI.
pub const UPDATE_BUFFER: usize = 256;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "COGNITA_API_KEY";

/// Fallback environment variable for the API key.
pub const API_KEY_FALLBACK_ENV: &str = "GEMINI_API_KEY";
