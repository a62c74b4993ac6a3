//! Speaker output using CPAL, with sample-accurate start times.
//!
//! The output clock is the number of frames rendered by the device callback,
//! so scheduled start times and `now()` share one timeline by construction.

use crate::audio::capture::{is_preferred_device, with_suppressed_stderr};
use crate::audio::resample::resample;
use crate::defaults;
use crate::error::{CognitaError, Result};
use crate::playback::output::{AudioClock, AudioOutput, UnitId};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

struct Voice {
    id: UnitId,
    start_frame: u64,
    samples: Vec<f32>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

#[derive(Default)]
struct Mixer {
    voices: Vec<Voice>,
}

impl Mixer {
    /// Mix every voice overlapping `[base, base + frames)` into `out`.
    fn render(&mut self, base: u64, channels: usize, out: &mut [f32]) {
        out.fill(0.0);
        let frames = (out.len() / channels.max(1)) as u64;
        let window_end = base + frames;

        for voice in &self.voices {
            let from = voice.start_frame.max(base);
            let to = voice.end_frame().min(window_end);
            for pos in from..to {
                let sample = voice.samples[(pos - voice.start_frame) as usize];
                let frame = (pos - base) as usize;
                for ch in 0..channels {
                    out[frame * channels + ch] += sample;
                }
            }
        }

        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
        self.voices.retain(|v| v.end_frame() > window_end);
    }
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched behind the output's Mutex.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

fn find_output_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let devices = host.output_devices().map_err(|e| CognitaError::Playback {
                message: format!("Failed to enumerate output devices: {}", e),
            })?;
            return devices
                .into_iter()
                .find(|dev| dev.name().is_ok_and(|n| n == name))
                .ok_or_else(|| CognitaError::AudioDeviceNotFound {
                    device: name.to_string(),
                });
        }

        if let Ok(devices) = host.output_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_output_device()
            .ok_or_else(|| CognitaError::AudioDeviceNotFound {
                device: "default output".to_string(),
            })
    })
}

/// Speaker output that plays scheduled mono buffers at exact clock times.
pub struct CpalAudioOutput {
    device_rate: u32,
    frames_played: Arc<AtomicU64>,
    mixer: Arc<Mutex<Mixer>>,
    stream: Mutex<Option<SendableStream>>,
}

impl CpalAudioOutput {
    /// Open the output device and start its (silent) stream.
    ///
    /// Prefers f32 mono at 24kHz; otherwise uses the device's default config
    /// and resamples scheduled buffers to it.
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let device = find_output_device(device_name)?;
        let frames_played = Arc::new(AtomicU64::new(0));
        let mixer = Arc::new(Mutex::new(Mixer::default()));

        let preferred = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(defaults::OUTPUT_SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let (stream, device_rate) = match build_f32_stream(
            &device,
            &preferred,
            mixer.clone(),
            frames_played.clone(),
        ) {
            Ok(stream) => (stream, defaults::OUTPUT_SAMPLE_RATE),
            Err(_) => build_native_stream(&device, mixer.clone(), frames_played.clone())?,
        };

        stream.play().map_err(|e| CognitaError::Playback {
            message: format!("Failed to start output stream: {}", e),
        })?;

        tracing::debug!(rate = device_rate, "output stream started");

        Ok(Self {
            device_rate,
            frames_played,
            mixer,
            stream: Mutex::new(Some(SendableStream(stream))),
        })
    }

    /// Rate the device is actually running at.
    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }
}

fn err_callback(err: cpal::StreamError) {
    tracing::error!("Audio output stream error: {}", err);
}

fn build_f32_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
    frames_played: Arc<AtomicU64>,
) -> Result<cpal::Stream> {
    let channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let base = frames_played.load(Ordering::Acquire);
                match mixer.lock() {
                    Ok(mut m) => m.render(base, channels, data),
                    Err(_) => data.fill(0.0),
                }
                frames_played.fetch_add((data.len() / channels) as u64, Ordering::Release);
            },
            err_callback,
            None,
        )
        .map_err(|e| CognitaError::Playback {
            message: format!("Failed to build output stream: {}", e),
        })
}

fn build_native_stream(
    device: &cpal::Device,
    mixer: Arc<Mutex<Mixer>>,
    frames_played: Arc<AtomicU64>,
) -> Result<(cpal::Stream, u32)> {
    use cpal::SampleFormat;

    let default_config = device
        .default_output_config()
        .map_err(|e| CognitaError::Playback {
            message: format!("Failed to query default output config: {}", e),
        })?;
    let rate = default_config.sample_rate().0;
    let channels = default_config.channels() as usize;
    let config: cpal::StreamConfig = default_config.clone().into();

    tracing::info!(
        channels,
        rate,
        format = ?default_config.sample_format(),
        "using native output format"
    );

    let stream = match default_config.sample_format() {
        SampleFormat::F32 => build_f32_stream(device, &config, mixer, frames_played)?,
        SampleFormat::I16 => {
            let mut scratch: Vec<f32> = Vec::new();
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0.0);
                        let base = frames_played.load(Ordering::Acquire);
                        match mixer.lock() {
                            Ok(mut m) => m.render(base, channels, &mut scratch),
                            Err(_) => scratch.fill(0.0),
                        }
                        for (out, s) in data.iter_mut().zip(&scratch) {
                            *out = (s * i16::MAX as f32) as i16;
                        }
                        frames_played
                            .fetch_add((data.len() / channels) as u64, Ordering::Release);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| CognitaError::Playback {
                    message: format!("Failed to build native i16 output stream: {}", e),
                })?
        }
        fmt => {
            return Err(CognitaError::Playback {
                message: format!("Unsupported output sample format: {:?}", fmt),
            });
        }
    };
    Ok((stream, rate))
}

impl AudioClock for CpalAudioOutput {
    fn now(&self) -> f64 {
        self.frames_played.load(Ordering::Acquire) as f64 / self.device_rate as f64
    }
}

impl AudioOutput for CpalAudioOutput {
    fn schedule(
        &mut self,
        id: UnitId,
        samples: Vec<f32>,
        sample_rate: u32,
        start_at: f64,
    ) -> Result<()> {
        let is_open = self.stream.lock().map(|s| s.is_some()).unwrap_or(false);
        if !is_open {
            return Err(CognitaError::Playback {
                message: "output closed".to_string(),
            });
        }

        let samples = if sample_rate == self.device_rate {
            samples
        } else {
            resample(&samples, sample_rate, self.device_rate)
        };
        let start_frame = (start_at * self.device_rate as f64).round().max(0.0) as u64;

        let mut mixer = self.mixer.lock().map_err(|e| CognitaError::Playback {
            message: format!("Failed to lock mixer: {}", e),
        })?;
        mixer.voices.push(Voice {
            id,
            start_frame,
            samples,
        });
        Ok(())
    }

    fn cancel(&mut self, id: UnitId) {
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.voices.retain(|v| v.id != id);
        }
    }

    fn close(&mut self) {
        let stream = self.stream.lock().ok().and_then(|mut s| s.take());
        if let Some(stream) = stream
            && let Err(e) = stream.0.pause()
        {
            tracing::warn!("Failed to pause output stream during close: {}", e);
        }
        if let Ok(mut mixer) = self.mixer.lock() {
            mixer.voices.clear();
        }
    }
}

impl Drop for CpalAudioOutput {
    fn drop(&mut self) {
        self.close();
    }
}
