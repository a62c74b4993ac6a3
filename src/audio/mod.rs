//! Microphone capture and PCM16 wire encoding.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod device;
pub mod encode;
pub mod pipeline;
pub mod resample;

pub use device::{CaptureDevice, MockCaptureDevice, MockCaptureProbe};
pub use encode::AudioChunk;
pub use pipeline::{CaptureCounts, CaptureEncoder, CapturePipeline, ChunkSink};
