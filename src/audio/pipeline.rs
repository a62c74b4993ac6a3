//! Capture & encode pipeline: device blocks → PCM16 base64 chunks → sink.
//!
//! Muting gates transmission only. The device keeps delivering blocks while
//! muted so unmuting resumes instantly without reopening the stream.

use crate::audio::device::CaptureDevice;
use crate::audio::encode::{AudioChunk, encode_block};
use crate::error::{CognitaError, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Destination for encoded chunks.
///
/// Returns false when the chunk could not be delivered (receiver gone).
pub trait ChunkSink: Send + Sync {
    fn send_chunk(&self, chunk: AudioChunk) -> bool;
}

impl ChunkSink for crossbeam_channel::Sender<AudioChunk> {
    fn send_chunk(&self, chunk: AudioChunk) -> bool {
        self.send(chunk).is_ok()
    }
}

impl ChunkSink for tokio::sync::mpsc::UnboundedSender<AudioChunk> {
    fn send_chunk(&self, chunk: AudioChunk) -> bool {
        self.send(chunk).is_ok()
    }
}

/// Running counters for the capture side of a session.
#[derive(Debug, Default)]
pub struct CaptureStats {
    blocks: AtomicU64,
    sent: AtomicU64,
    muted_drops: AtomicU64,
    send_failures: AtomicU64,
}

/// Point-in-time copy of `CaptureStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureCounts {
    pub blocks: u64,
    pub sent: u64,
    pub muted_drops: u64,
    pub send_failures: u64,
}

impl CaptureStats {
    pub fn snapshot(&self) -> CaptureCounts {
        CaptureCounts {
            blocks: self.blocks.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            muted_drops: self.muted_drops.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

struct EncoderShared {
    sink: Box<dyn ChunkSink>,
    muted: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

/// Per-block encoder handed to a capture device.
///
/// Cheap to clone; device callbacks call `push_block` from the audio thread.
#[derive(Clone)]
pub struct CaptureEncoder {
    inner: Arc<EncoderShared>,
}

impl CaptureEncoder {
    pub fn new(
        sink: Box<dyn ChunkSink>,
        muted: Arc<AtomicBool>,
        stats: Arc<CaptureStats>,
    ) -> Self {
        Self {
            inner: Arc::new(EncoderShared { sink, muted, stats }),
        }
    }

    /// Encode and forward one block. Returns true if a chunk was sent.
    pub fn push_block(&self, block: &[f32]) -> bool {
        let shared = &self.inner;
        let sequence = shared.stats.blocks.fetch_add(1, Ordering::Relaxed);

        if shared.muted.load(Ordering::Relaxed) {
            shared.stats.muted_drops.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if shared.sink.send_chunk(encode_block(block, sequence)) {
            shared.stats.sent.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            shared.stats.send_failures.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

impl fmt::Debug for CaptureEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureEncoder")
            .field("muted", &self.inner.muted.load(Ordering::Relaxed))
            .field("stats", &self.inner.stats.snapshot())
            .finish()
    }
}

/// Owns the capture device for one session.
pub struct CapturePipeline {
    device: Box<dyn CaptureDevice>,
    muted: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
    acquired: bool,
    attached: bool,
}

impl CapturePipeline {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device,
            muted: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(CaptureStats::default()),
            acquired: false,
            attached: false,
        }
    }

    /// Request device access. Must succeed before `attach`.
    pub fn acquire(&mut self) -> Result<()> {
        if self.acquired {
            return Ok(());
        }
        self.device.acquire()?;
        self.acquired = true;
        Ok(())
    }

    /// Bind the device's output to `sink` and start streaming blocks.
    pub fn attach(&mut self, sink: Box<dyn ChunkSink>) -> Result<()> {
        if !self.acquired {
            return Err(CognitaError::AudioCapture {
                message: "capture device not acquired".to_string(),
            });
        }
        if self.attached {
            return Ok(());
        }
        let encoder = CaptureEncoder::new(sink, self.muted.clone(), self.stats.clone());
        self.device.attach(encoder)?;
        self.attached = true;
        tracing::debug!(block_size = self.device.block_size(), "capture attached");
        Ok(())
    }

    /// Stop the device and release its handles. Idempotent.
    pub fn release(&mut self) {
        if !self.acquired && !self.attached {
            return;
        }
        self.device.release();
        self.acquired = false;
        self.attached = false;
        tracing::debug!("capture released");
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Shared mute flag, for handles that toggle it from other tasks.
    pub fn mute_flag(&self) -> Arc<AtomicBool> {
        self.muted.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn stats(&self) -> CaptureCounts {
        self.stats.snapshot()
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.release();
    }
}
