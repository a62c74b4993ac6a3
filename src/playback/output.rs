//! Audio output abstraction: a clock plus start-time scheduling of buffers.

use crate::error::{CognitaError, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Identifier of one scheduled buffer on an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub u64);

/// Monotonic audio clock, in seconds.
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Playback device that can start buffers at precise clock times.
///
/// Implementations play `samples` (mono f32 at `sample_rate`) beginning at
/// `start_at` on their own clock, mixing overlapping units if asked to.
pub trait AudioOutput: AudioClock {
    fn schedule(
        &mut self,
        id: UnitId,
        samples: Vec<f32>,
        sample_rate: u32,
        start_at: f64,
    ) -> Result<()>;

    /// Stop a unit immediately. Unknown or finished ids are ignored.
    fn cancel(&mut self, id: UnitId);

    /// Stop everything and release the device. Idempotent.
    fn close(&mut self);
}

/// Manually advanced clock for deterministic tests and offline use.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    current: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, seconds: f64) {
        if let Ok(mut t) = self.current.lock() {
            *t += seconds;
        }
    }

    pub fn set(&self, seconds: f64) {
        if let Ok(mut t) = self.current.lock() {
            *t = seconds;
        }
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.current.lock().map(|t| *t).unwrap_or(0.0)
    }
}

/// A unit as recorded by `MockAudioOutput`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUnit {
    pub id: UnitId,
    pub start_at: f64,
    pub samples: usize,
    pub sample_rate: u32,
}

#[derive(Debug, Default)]
struct MockOutputState {
    active: BTreeMap<UnitId, RecordedUnit>,
    history: Vec<RecordedUnit>,
    cancelled: Vec<UnitId>,
    closed: bool,
    close_calls: usize,
}

/// Test-side view of a `MockAudioOutput`.
#[derive(Debug, Clone, Default)]
pub struct MockOutputProbe {
    state: Arc<Mutex<MockOutputState>>,
}

impl MockOutputProbe {
    /// Units scheduled and not cancelled.
    pub fn active(&self) -> Vec<RecordedUnit> {
        self.state
            .lock()
            .map(|s| s.active.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every unit ever scheduled, in scheduling order.
    pub fn history(&self) -> Vec<RecordedUnit> {
        self.state
            .lock()
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    pub fn cancelled(&self) -> Vec<UnitId> {
        self.state
            .lock()
            .map(|s| s.cancelled.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(false)
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().map(|s| s.close_calls).unwrap_or(0)
    }
}

/// Mock output that records scheduling calls against a `ManualClock`.
#[derive(Debug, Clone)]
pub struct MockAudioOutput {
    clock: ManualClock,
    probe: MockOutputProbe,
    fail_schedule: bool,
}

impl MockAudioOutput {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            probe: MockOutputProbe::default(),
            fail_schedule: false,
        }
    }

    /// Configure the mock to reject every schedule call.
    pub fn with_schedule_failure(mut self) -> Self {
        self.fail_schedule = true;
        self
    }

    pub fn probe(&self) -> MockOutputProbe {
        self.probe.clone()
    }
}

impl AudioClock for MockAudioOutput {
    fn now(&self) -> f64 {
        self.clock.now()
    }
}

impl AudioOutput for MockAudioOutput {
    fn schedule(
        &mut self,
        id: UnitId,
        samples: Vec<f32>,
        sample_rate: u32,
        start_at: f64,
    ) -> Result<()> {
        let mut state = self.probe.state.lock().map_err(|e| CognitaError::Playback {
            message: format!("mock state poisoned: {}", e),
        })?;
        if state.closed {
            return Err(CognitaError::Playback {
                message: "output closed".to_string(),
            });
        }
        if self.fail_schedule {
            return Err(CognitaError::Playback {
                message: "mock schedule failure".to_string(),
            });
        }
        let unit = RecordedUnit {
            id,
            start_at,
            samples: samples.len(),
            sample_rate,
        };
        state.active.insert(id, unit.clone());
        state.history.push(unit);
        Ok(())
    }

    fn cancel(&mut self, id: UnitId) {
        if let Ok(mut state) = self.probe.state.lock()
            && state.active.remove(&id).is_some()
        {
            state.cancelled.push(id);
        }
    }

    fn close(&mut self) {
        if let Ok(mut state) = self.probe.state.lock() {
            state.close_calls += 1;
            state.active.clear();
            state.closed = true;
        }
    }
}
