// Audio pipeline
// Symphonia decode, rubato resample to the session rate, cpal output

pub mod buffer;
pub mod controller;
pub mod decoder;
pub mod output;

pub use buffer::{AudioBuffer, TARGET_SAMPLE_RATE};
pub use controller::{PlaybackController, PlaybackTick, DEFAULT_POLL_INTERVAL};
pub use decoder::DecodeError;
pub use output::{AudioSink, CpalOutput, PlaybackError};
