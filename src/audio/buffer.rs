// Immutable decoded waveform
// Everything downstream (playback clock, annotation bounds) works against
// a single mono buffer at a fixed rate

use std::path::Path;

use log::{debug, info};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::decoder::{self, DecodeError};

/// Fixed session sample rate, matching diarization tooling conventions.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Mono waveform, normalized to [-1, 1], immutable once constructed.
#[derive(Debug)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Decode an audio file, downmix to mono and resample to the session rate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let decoded = decoder::decode_mono(path)?;
        debug!(
            "decoded {} frames at {} Hz from {:?}",
            decoded.samples.len(),
            decoded.sample_rate,
            path
        );

        let samples = resample(decoded.samples, decoded.sample_rate, TARGET_SAMPLE_RATE)?;
        let buffer = Self {
            samples,
            sample_rate: TARGET_SAMPLE_RATE,
        };
        info!(
            "loaded {:?}: {:.2}s at {} Hz",
            path.file_name().unwrap_or(path.as_os_str()),
            buffer.duration_secs(),
            buffer.sample_rate
        );
        Ok(buffer)
    }

    /// Build a buffer from raw mono samples.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total duration, derived from the stored samples.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Whole-buffer sinc resample of a mono waveform
fn resample(input: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>, DecodeError> {
    if from_rate == to_rate || input.is_empty() {
        return Ok(input);
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input.len(), 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let output = resampler
        .process(&[input], None)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let samples = output.into_iter().next().unwrap_or_default();
    debug!(
        "resampled {} Hz -> {} Hz ({} samples)",
        from_rate,
        to_rate,
        samples.len()
    );
    Ok(samples)
}
