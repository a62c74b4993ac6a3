//! Channel mixing and linear resampling for float audio.

/// Average interleaved multi-channel frames down to mono.
pub fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[samples.len() - 1]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}

/// Accumulates variable-sized device callbacks into fixed-size blocks.
#[derive(Debug)]
pub struct BlockAccumulator {
    block_size: usize,
    pending: Vec<f32>,
}

impl BlockAccumulator {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            pending: Vec::with_capacity(block_size * 2),
        }
    }

    /// Append samples and return every block that became complete.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        self.pending.extend_from_slice(samples);
        let mut blocks = Vec::new();
        while self.pending.len() >= self.block_size {
            let rest = self.pending.split_off(self.block_size);
            blocks.push(std::mem::replace(&mut self.pending, rest));
        }
        blocks
    }

    /// Samples waiting for the next full block.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
