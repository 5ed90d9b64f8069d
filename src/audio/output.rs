// Audio output using cpal
// Mono session-rate samples go in; the device layout (rate, channel count)
// is produced in front of a ring buffer drained by the cpal callback

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use log::warn;
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapRb,
};
use thiserror::Error;

const RING_BUFFER_SIZE: usize = 48000 * 2 / 4; // ~250ms of stereo audio at 48kHz

// Source samples converted per write call before pushing to the ring
const CONVERT_CHUNK: usize = 1024;

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// Errors from the audio output device, surfaced to the caller rather than
/// swallowed inside the playback worker.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("failed to query output config: {0}")]
    DeviceConfig(String),
    #[error("unsupported output sample format: {0}")]
    UnsupportedFormat(String),
    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Destination for mono samples at the session sample rate.
///
/// `write` may accept fewer samples than offered when the device buffer is
/// full; callers retry on their next tick.
pub trait AudioSink {
    fn write(&mut self, samples: &[f32]) -> usize;
}

pub struct CpalOutput {
    _stream: Stream,
    producer: RingProducer,
    src_rate: u32,
    device_rate: u32,
    channels: u16,
    // Linear-interpolation state carried across write calls
    prev: f32,
    frac: f64,
    staged: Vec<f32>,
    staged_pos: usize,
}

impl CpalOutput {
    /// Open the default output device for mono input at `src_rate`.
    pub fn open(src_rate: u32) -> Result<Self, PlaybackError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(PlaybackError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| PlaybackError::DeviceConfig(e.to_string()))?;

        let device_rate = config.sample_rate().0;
        let channels = config.channels();

        // Ring buffer for passing samples to the audio thread
        let rb = HeapRb::<f32>::new(RING_BUFFER_SIZE);
        let (producer, consumer) = rb.split();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), consumer)?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), consumer)?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), consumer)?
            }
            format => return Err(PlaybackError::UnsupportedFormat(format!("{:?}", format))),
        };

        stream
            .play()
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            producer,
            src_rate,
            device_rate,
            channels,
            prev: 0.0,
            frac: 0.0,
            staged: Vec::new(),
            staged_pos: 0,
        })
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut consumer: RingConsumer,
    ) -> Result<Stream, PlaybackError> {
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // Zero-fill on underrun
                    for sample in data.iter_mut() {
                        let value = consumer.try_pop().unwrap_or(0.0);
                        *sample = T::from_sample(value);
                    }
                },
                move |err| {
                    warn!("audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;

        Ok(stream)
    }

    // Convert a mono source chunk to the device rate and channel count,
    // appending to the staged buffer
    fn convert(&mut self, chunk: &[f32]) {
        let step = self.src_rate as f64 / self.device_rate as f64;
        for &s in chunk {
            while self.frac < 1.0 {
                let value = self.prev + (s - self.prev) * self.frac as f32;
                for _ in 0..self.channels {
                    self.staged.push(value);
                }
                self.frac += step;
            }
            self.frac -= 1.0;
            self.prev = s;
        }
    }
}

impl AudioSink for CpalOutput {
    fn write(&mut self, samples: &[f32]) -> usize {
        let mut consumed = 0;

        loop {
            // Flush staged device samples first
            while self.staged_pos < self.staged.len() {
                if self.producer.try_push(self.staged[self.staged_pos]).is_ok() {
                    self.staged_pos += 1;
                } else {
                    // Device buffer full; leftovers flush on the next call
                    return consumed;
                }
            }
            self.staged.clear();
            self.staged_pos = 0;

            if consumed == samples.len() {
                return consumed;
            }

            let end = (consumed + CONVERT_CHUNK).min(samples.len());
            self.convert(&samples[consumed..end]);
            consumed = end;
        }
    }
}
