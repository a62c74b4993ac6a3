//! Gapless playback scheduling against the output clock.
//!
//! Every fragment starts at `max(cursor, now)` and advances the cursor by its
//! own duration, so back-to-back fragments abut exactly and a late fragment
//! starts as soon as it arrives. Scheduling calls are applied in the order
//! fragments are handed in; the caller serializes arrival order.

use crate::audio::encode::{decode_to_f32, rate_from_mime};
use crate::defaults;
use crate::error::{CognitaError, Result};
use crate::playback::output::{AudioOutput, UnitId};
use std::collections::BTreeMap;

/// One buffer handed to the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledUnit {
    pub id: UnitId,
    /// Start time on the output clock, in seconds.
    pub start_at: f64,
    /// Duration in seconds.
    pub duration: f64,
}

impl ScheduledUnit {
    pub fn end(&self) -> f64 {
        self.start_at + self.duration
    }
}

/// Counters for the playback side of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackCounts {
    pub scheduled: u64,
    pub decode_failures: u64,
    pub interruptions: u64,
    pub cancelled: u64,
}

pub struct PlaybackScheduler {
    output: Box<dyn AudioOutput>,
    default_rate: u32,
    cursor: f64,
    units: BTreeMap<UnitId, ScheduledUnit>,
    next_id: u64,
    closed: bool,
    counts: PlaybackCounts,
}

impl PlaybackScheduler {
    /// Create a scheduler; the cursor is seeded from the output clock.
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        let cursor = output.now();
        Self {
            output,
            default_rate: defaults::OUTPUT_SAMPLE_RATE,
            cursor,
            units: BTreeMap::new(),
            next_id: 0,
            closed: false,
            counts: PlaybackCounts::default(),
        }
    }

    /// Rate assumed for fragments whose MIME label carries none.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.default_rate = sample_rate;
        self
    }

    /// Decode a base64 PCM16 fragment and schedule it.
    ///
    /// # Errors
    /// `AudioDecode` for malformed payloads; the scheduler state is unchanged.
    pub fn enqueue(&mut self, data: &str, mime_type: Option<&str>) -> Result<ScheduledUnit> {
        let samples = match decode_to_f32(data) {
            Ok(samples) => samples,
            Err(e) => {
                self.counts.decode_failures += 1;
                return Err(e);
            }
        };
        let rate = mime_type
            .and_then(rate_from_mime)
            .unwrap_or(self.default_rate);
        self.schedule_samples(samples, rate)
    }

    /// Schedule already-decoded mono samples.
    pub fn schedule_samples(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<ScheduledUnit> {
        if self.closed {
            return Err(CognitaError::Playback {
                message: "scheduler closed".to_string(),
            });
        }
        if samples.is_empty() || sample_rate == 0 {
            return Err(CognitaError::AudioDecode {
                message: "fragment has no playable samples".to_string(),
            });
        }

        self.reap();

        let now = self.output.now();
        let start_at = self.cursor.max(now);
        let duration = samples.len() as f64 / sample_rate as f64;
        let id = UnitId(self.next_id);

        self.output.schedule(id, samples, sample_rate, start_at)?;

        self.next_id += 1;
        self.cursor = start_at + duration;
        let unit = ScheduledUnit {
            id,
            start_at,
            duration,
        };
        self.units.insert(id, unit);
        self.counts.scheduled += 1;
        Ok(unit)
    }

    /// Cancel every tracked unit and reset the cursor to now.
    ///
    /// Returns the number of units cancelled.
    pub fn interrupt(&mut self) -> usize {
        let cancelled = self.cancel_all();
        self.cursor = self.output.now();
        self.counts.interruptions += 1;
        cancelled
    }

    /// Cancel everything and release the output. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.cancel_all();
        self.output.close();
        self.closed = true;
    }

    /// Drop units that finished playing.
    pub fn reap(&mut self) -> usize {
        let now = self.output.now();
        let before = self.units.len();
        self.units.retain(|_, unit| unit.end() > now);
        before - self.units.len()
    }

    /// Tracked units that may still be sounding or waiting to start.
    pub fn pending(&self) -> usize {
        self.units.len()
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn now(&self) -> f64 {
        self.output.now()
    }

    /// Seconds of audio queued beyond the current clock time.
    pub fn buffered(&self) -> f64 {
        (self.cursor - self.output.now()).max(0.0)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn counts(&self) -> PlaybackCounts {
        self.counts
    }

    fn cancel_all(&mut self) -> usize {
        let ids: Vec<UnitId> = self.units.keys().copied().collect();
        for id in &ids {
            self.output.cancel(*id);
        }
        self.units.clear();
        self.counts.cancelled += ids.len() as u64;
        ids.len()
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.close();
    }
}
