use crate::audio::pipeline::CaptureEncoder;
use crate::defaults;
use crate::error::{CognitaError, Result};
use std::sync::{Arc, Mutex};

/// Trait for microphone capture devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
/// Access is split in two steps so a session can check permission before it
/// connects, and only start delivering audio once the remote end is ready.
pub trait CaptureDevice: Send {
    /// Request access to the device.
    ///
    /// # Errors
    /// `CognitaError::CapturePermissionDenied` when the device cannot be opened.
    fn acquire(&mut self) -> Result<()>;

    /// Start delivering fixed-size mono blocks at 16kHz into `encoder`.
    fn attach(&mut self, encoder: CaptureEncoder) -> Result<()>;

    /// Stop the stream and release the device. Safe to call repeatedly.
    fn release(&mut self);

    /// Samples per delivered block.
    fn block_size(&self) -> usize {
        defaults::BLOCK_SIZE
    }
}

#[derive(Debug, Default)]
struct MockCaptureState {
    encoder: Option<CaptureEncoder>,
    acquired: bool,
    acquire_calls: usize,
    attach_calls: usize,
    release_calls: usize,
}

/// Test-side view of a `MockCaptureDevice`.
///
/// Lets a test feed blocks after the device has been handed to a session.
#[derive(Debug, Clone, Default)]
pub struct MockCaptureProbe {
    state: Arc<Mutex<MockCaptureState>>,
}

impl MockCaptureProbe {
    /// Deliver one block through the attached encoder.
    ///
    /// Returns false when no encoder is attached (device never attached or
    /// already released) or when the block was not sent.
    pub fn push_block(&self, block: &[f32]) -> bool {
        let encoder = match self.state.lock() {
            Ok(state) => state.encoder.clone(),
            Err(_) => None,
        };
        encoder.is_some_and(|enc| enc.push_block(block))
    }

    /// Whether an encoder is currently attached.
    pub fn is_attached(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.encoder.is_some())
            .unwrap_or(false)
    }

    pub fn acquire_calls(&self) -> usize {
        self.state.lock().map(|s| s.acquire_calls).unwrap_or(0)
    }

    pub fn attach_calls(&self) -> usize {
        self.state.lock().map(|s| s.attach_calls).unwrap_or(0)
    }

    pub fn release_calls(&self) -> usize {
        self.state.lock().map(|s| s.release_calls).unwrap_or(0)
    }
}

/// Mock capture device for testing
#[derive(Debug, Clone)]
pub struct MockCaptureDevice {
    probe: MockCaptureProbe,
    deny_permission: bool,
    fail_attach: bool,
    initial_blocks: Vec<Vec<f32>>,
    block_size: usize,
}

impl MockCaptureDevice {
    /// Create a new mock device that grants permission.
    pub fn new() -> Self {
        Self {
            probe: MockCaptureProbe::default(),
            deny_permission: false,
            fail_attach: false,
            initial_blocks: Vec::new(),
            block_size: defaults::BLOCK_SIZE,
        }
    }

    /// Configure the mock to deny microphone permission.
    pub fn with_permission_denied(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    /// Configure the mock to fail when the stream is attached.
    pub fn with_attach_failure(mut self) -> Self {
        self.fail_attach = true;
        self
    }

    /// Blocks delivered synchronously as soon as the device is attached.
    pub fn with_blocks(mut self, blocks: Vec<Vec<f32>>) -> Self {
        self.initial_blocks = blocks;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Handle for feeding and inspecting the device from a test.
    pub fn probe(&self) -> MockCaptureProbe {
        self.probe.clone()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockCaptureState>> {
        self.probe.state.lock().map_err(|e| CognitaError::AudioCapture {
            message: format!("mock state poisoned: {}", e),
        })
    }
}

impl Default for MockCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for MockCaptureDevice {
    fn acquire(&mut self) -> Result<()> {
        let mut state = self.lock()?;
        state.acquire_calls += 1;
        if self.deny_permission {
            return Err(CognitaError::CapturePermissionDenied {
                message: "mock device denied access".to_string(),
            });
        }
        state.acquired = true;
        Ok(())
    }

    fn attach(&mut self, encoder: CaptureEncoder) -> Result<()> {
        {
            let mut state = self.lock()?;
            state.attach_calls += 1;
            if !state.acquired {
                return Err(CognitaError::AudioCapture {
                    message: "attach before acquire".to_string(),
                });
            }
            if self.fail_attach {
                return Err(CognitaError::AudioCapture {
                    message: "mock attach failure".to_string(),
                });
            }
            state.encoder = Some(encoder.clone());
        }

        for block in &self.initial_blocks {
            encoder.push_block(block);
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Ok(mut state) = self.probe.state.lock() {
            state.release_calls += 1;
            state.encoder = None;
            state.acquired = false;
        }
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}
