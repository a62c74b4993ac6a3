//! Gapless playback of streamed model speech.

#[cfg(feature = "cpal-audio")]
pub mod cpal_output;
pub mod output;
pub mod scheduler;

pub use output::{
    AudioClock, AudioOutput, ManualClock, MockAudioOutput, MockOutputProbe, RecordedUnit, UnitId,
};
pub use scheduler::{PlaybackCounts, PlaybackScheduler, ScheduledUnit};
