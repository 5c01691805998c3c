//! Audio output sink
//!
//! The playback controller talks to the output through the [`AudioSink`]
//! trait: an output clock, timed sample scheduling, a gain stage with a
//! short pause fade, and an RMS level tap for the knob halos. The real
//! implementation drives a cpal device from a lock-free ring buffer;
//! tests substitute a simulated sink with a scripted clock.
//!
//! The output clock counts frames emitted by the device callback (silence
//! included), so it plays the role of the audio context's `currentTime`:
//! it only advances when the device consumes audio.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Duration of the pause fade to silence
pub const PAUSE_FADE: Duration = Duration::from_millis(100);

/// Ring capacity in seconds of audio; must comfortably exceed the
/// look-ahead cushion plus chunk jitter
const RING_SECONDS: usize = 16;

/// Output sink contract used by the playback controller
pub trait AudioSink: Send {
    /// Output clock in seconds (frames emitted / sample rate)
    fn clock(&self) -> f64;

    /// Schedule interleaved samples to start at `start_at` seconds on the
    /// output clock; silence is inserted up to the start time
    fn schedule(&mut self, samples: &[f32], start_at: f64);

    /// Ramp the gain stage to silence over `duration`
    fn fade_out(&mut self, duration: Duration);

    /// Rebuild the gain stage: discard scheduled-but-unplayed audio and
    /// restore unity gain, so a subsequent resume starts clean
    fn reset(&mut self);

    /// Set master volume (0.0-1.0)
    fn set_volume(&mut self, volume: f32);

    /// RMS level of the most recent output buffer
    fn level(&self) -> f32;

    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;
}

/// State shared between the control side and the audio callback
struct SinkShared {
    /// Total frames emitted by the device callback
    frames_emitted: AtomicU64,
    /// Gain stage: current, target, per-frame step (f32 bit patterns)
    gain_bits: AtomicU32,
    gain_target_bits: AtomicU32,
    gain_step_bits: AtomicU32,
    /// Master volume (f32 bit pattern)
    volume_bits: AtomicU32,
    /// Request the callback to drain pending audio before reading
    flush: AtomicBool,
    /// RMS of the last callback buffer (f32 bit pattern)
    level_bits: AtomicU32,
}

impl SinkShared {
    fn new(volume: f32) -> Self {
        Self {
            frames_emitted: AtomicU64::new(0),
            gain_bits: AtomicU32::new(1.0f32.to_bits()),
            gain_target_bits: AtomicU32::new(1.0f32.to_bits()),
            gain_step_bits: AtomicU32::new(1.0f32.to_bits()),
            volume_bits: AtomicU32::new(volume.to_bits()),
            flush: AtomicBool::new(false),
            level_bits: AtomicU32::new(0.0f32.to_bits()),
        }
    }

    fn load_f32(cell: &AtomicU32) -> f32 {
        f32::from_bits(cell.load(Ordering::Relaxed))
    }

    fn store_f32(cell: &AtomicU32, value: f32) {
        cell.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// cpal-backed audio sink
pub struct CpalSink {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    /// Kept alive for playback, never accessed after creation
    _stream: Option<Stream>,
    producer: ringbuf::HeapProd<f32>,
    shared: Arc<SinkShared>,
    /// Frames written to the scheduled timeline (silence padding included)
    written_frames: u64,
}

// SAFETY: CpalSink can be sent between threads because all fields except
// `stream` are Send, and `stream` is only kept alive after creation; the
// cpal callback thread owns its own consumer and shared handles.
unsafe impl Send for CpalSink {}

impl CpalSink {
    /// Open the output device and start the stream
    ///
    /// Falls back to the default device when the requested one is missing.
    pub fn new(device_name: Option<String>, buffer_size: Option<u32>) -> Result<Self> {
        let host = cpal::default_host();

        let device = if let Some(name) = device_name.as_ref() {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                Some(dev) => {
                    info!("Found requested audio device: {}", name);
                    dev
                }
                None => {
                    warn!(
                        "Requested device '{}' not found, falling back to default device",
                        name
                    );
                    host.default_output_device().ok_or_else(|| {
                        Error::AudioOutput(format!(
                            "Device '{}' not found and no default device available",
                            name
                        ))
                    })?
                }
            }
        } else {
            host.default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?
        };

        let (mut config, sample_format) = Self::best_config(&device)?;
        if let Some(size) = buffer_size {
            config.buffer_size = cpal::BufferSize::Fixed(size);
        }

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let capacity = config.sample_rate.0 as usize * config.channels as usize * RING_SECONDS;
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        let shared = Arc::new(SinkShared::new(0.75));

        let mut sink = Self {
            device,
            config,
            sample_format,
            _stream: None,
            producer,
            shared,
            written_frames: 0,
        };
        sink.start(consumer)?;
        Ok(sink)
    }

    /// Prefer 48kHz stereo f32 (the stream's native rate), otherwise the
    /// device default
    fn best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported.find(|c| {
            c.channels() == 2
                && c.min_sample_rate().0 <= 48_000
                && c.max_sample_rate().0 >= 48_000
                && c.sample_format() == SampleFormat::F32
        });

        if let Some(config) = preferred {
            let sample_format = config.sample_format();
            let config = config.with_sample_rate(cpal::SampleRate(48_000)).config();
            return Ok((config, sample_format));
        }

        let config = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = config.sample_format();
        Ok((config.config(), sample_format))
    }

    fn start(&mut self, consumer: ringbuf::HeapCons<f32>) -> Result<()> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream_f32(consumer)?,
            SampleFormat::I16 => self.build_stream_i16(consumer)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
        self._stream = Some(stream);
        info!("Audio stream started");
        Ok(())
    }

    fn build_stream_f32(&self, mut consumer: ringbuf::HeapCons<f32>) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let shared = Arc::clone(&self.shared);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    Self::fill(&mut consumer, &shared, data, channels, |s| s);
                },
                move |err| {
                    warn!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;
        Ok(stream)
    }

    fn build_stream_i16(&self, mut consumer: ringbuf::HeapCons<f32>) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let shared = Arc::clone(&self.shared);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    Self::fill(&mut consumer, &shared, data, channels, |s| {
                        (s * i16::MAX as f32) as i16
                    });
                },
                move |err| {
                    warn!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;
        Ok(stream)
    }

    /// Shared callback body: drain on flush, apply gain ramp and volume,
    /// advance the output clock, publish the RMS level
    fn fill<T>(
        consumer: &mut ringbuf::HeapCons<f32>,
        shared: &SinkShared,
        data: &mut [T],
        channels: usize,
        convert: impl Fn(f32) -> T,
    ) {
        if shared.flush.swap(false, Ordering::AcqRel) {
            while consumer.try_pop().is_some() {}
        }

        let mut gain = SinkShared::load_f32(&shared.gain_bits);
        let target = SinkShared::load_f32(&shared.gain_target_bits);
        let step = SinkShared::load_f32(&shared.gain_step_bits);
        let volume = SinkShared::load_f32(&shared.volume_bits);

        let mut sum_squares = 0.0f32;
        let frames = data.len() / channels;

        for frame in data.chunks_mut(channels) {
            if gain < target {
                gain = (gain + step).min(target);
            } else if gain > target {
                gain = (gain - step).max(target);
            }

            for slot in frame.iter_mut() {
                let sample = consumer.try_pop().unwrap_or(0.0) * gain * volume;
                let sample = sample.clamp(-1.0, 1.0);
                sum_squares += sample * sample;
                *slot = convert(sample);
            }
        }

        SinkShared::store_f32(&shared.gain_bits, gain);
        shared
            .frames_emitted
            .fetch_add(frames as u64, Ordering::Relaxed);

        let rms = (sum_squares / data.len().max(1) as f32).sqrt();
        SinkShared::store_f32(&shared.level_bits, rms);
    }
}

impl AudioSink for CpalSink {
    fn clock(&self) -> f64 {
        let frames = self.shared.frames_emitted.load(Ordering::Relaxed);
        frames as f64 / self.config.sample_rate.0 as f64
    }

    fn schedule(&mut self, samples: &[f32], start_at: f64) {
        let rate = self.config.sample_rate.0 as u64;
        let channels = self.config.channels as usize;
        let target_frame = (start_at * rate as f64).round() as u64;

        // Pad silence up to the requested start time
        if target_frame > self.written_frames {
            let gap_samples = (target_frame - self.written_frames) as usize * channels;
            for _ in 0..gap_samples {
                if self.producer.try_push(0.0).is_err() {
                    warn!("Audio ring full while padding; dropping silence");
                    break;
                }
            }
            self.written_frames = target_frame;
        }

        let mut pushed = 0usize;
        for &sample in samples {
            if self.producer.try_push(sample).is_err() {
                warn!(
                    "Audio ring full; dropped {} of {} samples",
                    samples.len() - pushed,
                    samples.len()
                );
                break;
            }
            pushed += 1;
        }
        self.written_frames += (pushed / channels) as u64;
    }

    fn fade_out(&mut self, duration: Duration) {
        let rate = self.config.sample_rate.0 as f32;
        let frames = (duration.as_secs_f32() * rate).max(1.0);
        SinkShared::store_f32(&self.shared.gain_target_bits, 0.0);
        SinkShared::store_f32(&self.shared.gain_step_bits, 1.0 / frames);
    }

    fn reset(&mut self) {
        self.shared.flush.store(true, Ordering::Release);
        SinkShared::store_f32(&self.shared.gain_bits, 1.0);
        SinkShared::store_f32(&self.shared.gain_target_bits, 1.0);
        SinkShared::store_f32(&self.shared.gain_step_bits, 1.0);
        // Re-align the write head with the device clock; the next scheduled
        // chunk carries its own look-ahead cushion
        self.written_frames = self.shared.frames_emitted.load(Ordering::Relaxed);
    }

    fn set_volume(&mut self, volume: f32) {
        SinkShared::store_f32(&self.shared.volume_bits, volume.clamp(0.0, 1.0));
    }

    fn level(&self) -> f32 {
        SinkShared::load_f32(&self.shared.level_bits)
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }
}

/// List available output device names
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();
    debug!("Found {} output devices", devices.len());
    Ok(devices)
}
