//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::device::CaptureDevice;
use crate::audio::pipeline::CaptureEncoder;
use crate::audio::resample::{BlockAccumulator, mix_to_mono, resample};
use crate::defaults;
use crate::error::{CognitaError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::RuntimeFlavor;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// CPAL probing makes ALSA/JACK print harmless but confusing messages.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
/// Safe as long as no other thread is concurrently manipulating fd 2.
pub(crate) fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Preferred device names for PipeWire/PulseAudio desktops.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns that are never useful for a voice session.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

pub(crate) fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

pub(crate) fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

fn label_devices(names: impl Iterator<Item = String>) -> Vec<String> {
    names
        .filter(|name| !should_filter_device(name))
        .map(|name| {
            if is_preferred_device(&name) {
                format!("{} [recommended]", name)
            } else {
                name
            }
        })
        .collect()
}

/// List usable input devices, marking preferred ones with "\[recommended\]".
pub fn list_input_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| cpal::default_host().input_devices());
    let devices = devices.map_err(|e| CognitaError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;
    Ok(label_devices(devices.filter_map(|d| d.name().ok())))
}

/// List usable output devices, marking preferred ones with "\[recommended\]".
pub fn list_output_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| cpal::default_host().output_devices());
    let devices = devices.map_err(|e| CognitaError::Playback {
        message: format!("Failed to enumerate output devices: {}", e),
    })?;
    Ok(label_devices(devices.filter_map(|d| d.name().ok())))
}

/// Find an input device by exact name, or the best default.
fn find_input_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let devices = host
                .input_devices()
                .map_err(|e| CognitaError::AudioCapture {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;
            return devices
                .into_iter()
                .find(|dev| dev.name().is_ok_and(|n| n == name))
                .ok_or_else(|| CognitaError::AudioDeviceNotFound {
                    device: name.to_string(),
                });
        }

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| CognitaError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// How long a fresh stream gets to deliver its first callback.
const CALLBACK_TIMEOUT: Duration = Duration::from_millis(200);
const CALLBACK_POLL: Duration = Duration::from_millis(10);

/// Wait until `counter` moves or `timeout` passes. Returns true if it moved.
///
/// On a multi-threaded runtime the wait runs in `block_in_place`, so tasks
/// sharing the worker keep running.
fn wait_for_callbacks(counter: &AtomicU64, timeout: Duration) -> bool {
    let poll = || {
        let deadline = Instant::now() + timeout;
        loop {
            if counter.load(Ordering::Relaxed) > 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(CALLBACK_POLL);
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(poll)
        }
        _ => poll(),
    }
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched from the thread that owns the
/// `CpalCaptureDevice`, which is itself owned by a single session.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Turns variable-length device callbacks into fixed blocks for the encoder.
#[derive(Clone)]
struct BlockSink {
    encoder: CaptureEncoder,
    accumulator: Arc<Mutex<BlockAccumulator>>,
    counter: Arc<AtomicU64>,
}

impl BlockSink {
    fn deliver(&self, mono_16k: &[f32]) {
        self.counter.fetch_add(1, Ordering::Relaxed);
        let blocks = match self.accumulator.lock() {
            Ok(mut acc) => acc.push(mono_16k),
            Err(_) => return,
        };
        for block in blocks {
            self.encoder.push_block(&block);
        }
    }
}

/// Microphone capture delivering 4096-sample f32 blocks at 16kHz mono.
///
/// Tries the wire format first (f32 or i16 at 16kHz mono), then falls back to
/// the device's native config with software mixing and resampling.
pub struct CpalCaptureDevice {
    device_name: Option<String>,
    device: Option<cpal::Device>,
    stream: Option<SendableStream>,
    block_size: usize,
    sample_rate: u32,
}

impl CpalCaptureDevice {
    /// Create a capture device. Nothing is opened until `acquire`.
    pub fn new(device_name: Option<&str>) -> Self {
        Self {
            device_name: device_name.map(str::to_string),
            device: None,
            stream: None,
            block_size: defaults::BLOCK_SIZE,
            sample_rate: defaults::INPUT_SAMPLE_RATE,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    fn device(&self) -> Result<&cpal::Device> {
        self.device.as_ref().ok_or_else(|| CognitaError::AudioCapture {
            message: "capture device not acquired".to_string(),
        })
    }

    fn block_sink(&self, encoder: &CaptureEncoder, counter: &Arc<AtomicU64>) -> BlockSink {
        BlockSink {
            encoder: encoder.clone(),
            accumulator: Arc::new(Mutex::new(BlockAccumulator::new(self.block_size))),
            counter: counter.clone(),
        }
    }

    /// Build the stream at the wire format, falling back to native.
    fn build_stream(
        &self,
        encoder: &CaptureEncoder,
        counter: &Arc<AtomicU64>,
    ) -> Result<cpal::Stream> {
        let device = self.device()?;
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            tracing::error!("Audio input stream error: {}", err);
        };

        let sink = self.block_sink(encoder, counter);
        if let Ok(stream) = device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| sink.deliver(data),
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        let sink = self.block_sink(encoder, counter);
        if let Ok(stream) = device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data
                    .iter()
                    .map(|&s| s as f32 / defaults::PCM16_SCALE)
                    .collect();
                sink.deliver(&floats);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native(encoder, counter)
    }

    /// Build a stream at the device's native config, mixing to mono and
    /// resampling to 16kHz in software.
    fn build_stream_native(
        &self,
        encoder: &CaptureEncoder,
        counter: &Arc<AtomicU64>,
    ) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let device = self.device()?;
        let default_config =
            device
                .default_input_config()
                .map_err(|e| CognitaError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        tracing::info!(
            channels = native_channels,
            rate = native_rate,
            format = ?default_config.sample_format(),
            "using native input format, converting in software"
        );

        let err_callback = |err| {
            tracing::error!("Audio input stream error: {}", err);
        };
        let sink = self.block_sink(encoder, counter);

        match default_config.sample_format() {
            SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mono = mix_to_mono(data, native_channels);
                        sink.deliver(&resample(&mono, native_rate, target_rate));
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| CognitaError::AudioCapture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            SampleFormat::I16 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let floats: Vec<f32> = data
                            .iter()
                            .map(|&s| s as f32 / defaults::PCM16_SCALE)
                            .collect();
                        let mono = mix_to_mono(&floats, native_channels);
                        sink.deliver(&resample(&mono, native_rate, target_rate));
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| CognitaError::AudioCapture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            fmt => Err(CognitaError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try selecting another input device.",
                    fmt
                ),
            }),
        }
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn acquire(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }
        let device = find_input_device(self.device_name.as_deref()).map_err(|e| {
            CognitaError::CapturePermissionDenied {
                message: e.to_string(),
            }
        })?;
        // Opening the default config is the closest CPAL gets to a permission
        // check; sandboxed or busy devices fail here.
        device
            .default_input_config()
            .map_err(|e| CognitaError::CapturePermissionDenied {
                message: format!("input device refused access: {}", e),
            })?;
        self.device = Some(device);
        Ok(())
    }

    fn attach(&mut self, encoder: CaptureEncoder) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let counter = Arc::new(AtomicU64::new(0));
        let stream = self.build_stream(&encoder, &counter)?;
        stream.play().map_err(|e| CognitaError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        // Some PipeWire-ALSA setups accept non-native configs but never
        // fire the data callback.
        let final_stream = if !wait_for_callbacks(&counter, CALLBACK_TIMEOUT) {
            drop(stream);
            let native = self.build_stream_native(&encoder, &counter)?;
            native.play().map_err(|e| CognitaError::AudioCapture {
                message: format!("Failed to start native audio stream: {}", e),
            })?;
            native
        } else {
            stream
        };

        self.stream = Some(SendableStream(final_stream));
        Ok(())
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take()
            && let Err(e) = stream.0.pause()
        {
            tracing::warn!("Failed to pause input stream during release: {}", e);
        }
        self.device = None;
    }

    fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Drop for CpalCaptureDevice {
    fn drop(&mut self) {
        self.release();
    }
}
