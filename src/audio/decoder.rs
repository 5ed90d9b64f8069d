// Audio decoder using Symphonia
// Decodes audio files to mono f32 samples at the source sample rate

use symphonia::core::audio::{AudioBufferRef, AudioPlanes, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use std::fs::File;
use std::path::Path;

use log::warn;
use thiserror::Error;

/// Errors raised while turning an audio file into usable samples.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open audio file: {0}")]
    Open(#[from] std::io::Error),
    #[error("failed to probe file format: {0}")]
    Probe(String),
    #[error("no audio track found")]
    NoTrack,
    #[error("audio track has no sample rate")]
    UnknownSampleRate,
    #[error("failed to decode audio: {0}")]
    Codec(String),
    #[error("audio stream contains no samples")]
    EmptyStream,
    #[error("failed to resample audio: {0}")]
    Resample(String),
}

/// Mono samples as decoded, before any rate conversion.
#[derive(Debug)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a whole audio file, averaging channels down to mono
pub fn decode_mono(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path)?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint using the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    // Probe the media source
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;

    // Create decoder for the track
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // End of stream
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        };

        // Skip packets from other tracks
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => downmix_into(&decoded, &mut samples),
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Codec(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::EmptyStream);
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Downmix any AudioBufferRef to mono f32 by averaging channels
fn downmix_into(buf: &AudioBufferRef, out: &mut Vec<f32>) {
    match buf {
        AudioBufferRef::F32(b) => {
            mix_planes(b.planes(), b.frames(), out, |s: f32| s)
        }
        AudioBufferRef::F64(b) => {
            mix_planes(b.planes(), b.frames(), out, |s: f64| s as f32)
        }
        AudioBufferRef::S8(b) => {
            let scale = 1.0 / 128.0;
            mix_planes(b.planes(), b.frames(), out, |s: i8| s as f32 * scale)
        }
        AudioBufferRef::S16(b) => {
            let scale = 1.0 / 32768.0;
            mix_planes(b.planes(), b.frames(), out, |s: i16| s as f32 * scale)
        }
        AudioBufferRef::S24(b) => {
            let scale = 1.0 / 8388608.0;
            mix_planes(b.planes(), b.frames(), out, |s| s.inner() as f32 * scale)
        }
        AudioBufferRef::S32(b) => {
            let scale = 1.0 / 2147483648.0;
            mix_planes(b.planes(), b.frames(), out, |s: i32| s as f32 * scale)
        }
        AudioBufferRef::U8(b) => {
            mix_planes(b.planes(), b.frames(), out, |s: u8| (s as f32 - 128.0) / 128.0)
        }
        AudioBufferRef::U16(b) => {
            mix_planes(b.planes(), b.frames(), out, |s: u16| (s as f32 - 32768.0) / 32768.0)
        }
        AudioBufferRef::U24(b) => {
            mix_planes(b.planes(), b.frames(), out, |s| (s.inner() as f32 - 8388608.0) / 8388608.0)
        }
        AudioBufferRef::U32(b) => {
            mix_planes(b.planes(), b.frames(), out, |s: u32| {
                (s as f64 - 2147483648.0) as f32 / 2147483648.0
            })
        }
    }
}

fn mix_planes<T: Sample + Copy, F: Fn(T) -> f32>(
    planes: AudioPlanes<T>,
    frames: usize,
    out: &mut Vec<f32>,
    convert: F,
) {
    let channels = planes.planes();
    let num_channels = channels.len();
    if num_channels == 0 || frames == 0 {
        return;
    }

    out.reserve(frames);

    for frame in 0..frames {
        let mut acc = 0.0f32;
        for plane in channels {
            acc += convert(plane[frame]);
        }
        out.push(acc / num_channels as f32);
    }
}
