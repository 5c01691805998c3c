//! Audio chunk decoding
//!
//! Stream chunks arrive as base64-encoded little-endian PCM16, interleaved.
//! Decode to f32 in [-1.0, 1.0] and, when the output device runs at a
//! different rate than the stream's native one, resample with rubato.

use crate::error::{Error, Result};
use crate::session::AudioChunkData;
use base64::{engine::general_purpose, Engine as _};
use rubato::{FastFixedIn, Resampler as RubatoResampler};
use tracing::debug;

/// A decoded, playback-ready audio chunk
#[derive(Debug, Clone)]
pub struct DecodedChunk {
    /// Interleaved f32 samples
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedChunk {
    /// Chunk duration in seconds
    pub fn duration(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (self.samples.len() / self.channels as usize) as f64 / self.sample_rate as f64
    }
}

/// Decode one stream chunk to f32 samples
pub fn decode_chunk(chunk: &AudioChunkData) -> Result<DecodedChunk> {
    if chunk.channels == 0 {
        return Err(Error::Decode("Chunk has zero channels".to_string()));
    }

    let bytes = general_purpose::STANDARD
        .decode(&chunk.data)
        .map_err(|e| Error::Decode(format!("Invalid base64 payload: {}", e)))?;

    if bytes.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "PCM16 payload has odd byte length {}",
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect();

    if samples.len() % chunk.channels as usize != 0 {
        return Err(Error::Decode(format!(
            "Sample count {} not divisible by {} channels",
            samples.len(),
            chunk.channels
        )));
    }

    Ok(DecodedChunk {
        samples,
        channels: chunk.channels,
        sample_rate: chunk.sample_rate,
    })
}

/// Resample a decoded chunk to the device rate
///
/// Returns the input untouched when rates already match.
pub fn resample(chunk: DecodedChunk, output_rate: u32) -> Result<DecodedChunk> {
    if chunk.sample_rate == output_rate {
        return Ok(chunk);
    }

    debug!(
        "Resampling chunk from {}Hz to {}Hz ({} channels)",
        chunk.sample_rate, output_rate, chunk.channels
    );

    let planar_input = deinterleave(&chunk.samples, chunk.channels);
    let input_frames = planar_input[0].len();

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / chunk.sample_rate as f64,
        1.0,
        rubato::PolynomialDegree::Septic,
        input_frames,
        chunk.channels as usize,
    )
    .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

    Ok(DecodedChunk {
        samples: interleave(planar_output),
        channels: chunk.channels,
        sample_rate: output_rate,
    })
}

/// Split interleaved samples into per-channel buffers
fn deinterleave(input: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let channels = channels as usize;
    let frames = input.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];

    for frame in input.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch].push(sample);
        }
    }
    planar
}

/// Merge per-channel buffers back into interleaved samples
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    let channels = planar.len();
    let frames = planar.first().map(|c| c.len()).unwrap_or(0);
    let mut interleaved = Vec::with_capacity(frames * channels);

    for i in 0..frames {
        for channel in &planar {
            interleaved.push(channel[i]);
        }
    }
    interleaved
}
