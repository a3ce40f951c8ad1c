//! Sample sources feeding the analyser: decoded file, live microphone, synth.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use glicol::Engine;
use tracing::{info, warn};

use super::synthesis::{build_engine, GLICOL_COMPOSITION};
use crate::error::{Result, VisynthError};
use crate::params::{audio_constants::BLOCK_SIZE, CaptureConfig};

/// Seconds of microphone audio kept if nobody drains the tap
const MIC_BACKLOG_SECS: u32 = 1;

/// Synth output limiter (hard clip)
const SYNTH_CLIP: f32 = 0.5;

/// Where capture audio comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioInput {
    /// Decoded WAV file
    File(PathBuf),
    /// Default input device
    Microphone,
    /// Built-in procedural composition
    Synth,
}

impl AudioInput {
    /// Analyser settings for this input, starting from `base`
    ///
    /// The microphone gets its own smoothing, dB ceiling and gain.
    pub fn capture_config(&self, base: &CaptureConfig) -> CaptureConfig {
        match self {
            AudioInput::Microphone => {
                let mic = CaptureConfig::microphone();
                CaptureConfig {
                    smoothing_time_constant: mic.smoothing_time_constant,
                    max_decibels: mic.max_decibels,
                    input_gain: mic.input_gain,
                    ..base.clone()
                }
            }
            _ => base.clone(),
        }
    }
}

impl std::fmt::Display for AudioInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioInput::File(path) => write!(f, "file {}", path.display()),
            AudioInput::Microphone => f.write_str("microphone"),
            AudioInput::Synth => f.write_str("synth"),
        }
    }
}

/// Mono sample stream pulled by the capture thread
pub trait SampleSource: Send {
    /// Append audio for `frames` sample periods to `out`
    ///
    /// Live sources append whatever has arrived instead.
    fn pull(&mut self, frames: usize, out: &mut Vec<f32>);

    fn sample_rate(&self) -> u32;

    /// Playback position (seconds)
    fn position_secs(&self) -> f64;
}

/// Fully decoded clip played once, then silence
pub struct ClipSource {
    samples: Vec<f32>,
    sample_rate: u32,
    cursor: usize,
}

impl ClipSource {
    /// Decode a WAV file, downmixing to mono
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decode_err = |source| VisynthError::AudioDecode {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = hound::WavReader::open(path).map_err(decode_err)?;
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(decode_err)?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(decode_err)?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        info!(
            path = %path.display(),
            sample_rate = spec.sample_rate,
            channels,
            duration_secs = samples.len() as f32 / spec.sample_rate as f32,
            "decoded audio file"
        );
        Ok(Self::from_samples(samples, spec.sample_rate))
    }

    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            cursor: 0,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.samples.len()
    }
}

impl SampleSource for ClipSource {
    fn pull(&mut self, frames: usize, out: &mut Vec<f32>) {
        let end = (self.cursor + frames).min(self.samples.len());
        out.extend_from_slice(&self.samples[self.cursor..end]);
        out.resize(out.len() + frames - (end - self.cursor), 0.0);
        self.cursor = end;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn position_secs(&self) -> f64 {
        self.cursor as f64 / self.sample_rate as f64
    }
}

/// Procedural music rendered block by block
pub struct SynthSource {
    engine: Engine<BLOCK_SIZE>,
    pending: Vec<f32>,
    sample_rate: u32,
    produced: u64,
}

impl SynthSource {
    pub fn new(sample_rate: usize) -> Result<Self> {
        Self::with_composition(GLICOL_COMPOSITION, sample_rate)
    }

    pub fn with_composition(composition: &str, sample_rate: usize) -> Result<Self> {
        let engine = build_engine(composition, sample_rate)?;
        info!(sample_rate, "synth engine ready");
        Ok(Self {
            engine,
            pending: Vec::with_capacity(BLOCK_SIZE * 2),
            sample_rate: sample_rate as u32,
            produced: 0,
        })
    }
}

impl SampleSource for SynthSource {
    fn pull(&mut self, frames: usize, out: &mut Vec<f32>) {
        while self.pending.len() < frames {
            let (buffers, _) = self.engine.next_block(vec![]);
            for i in 0..BLOCK_SIZE {
                self.pending.push(buffers[0][i].clamp(-SYNTH_CLIP, SYNTH_CLIP));
            }
        }
        out.extend(self.pending.drain(..frames));
        self.produced += frames as u64;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn position_secs(&self) -> f64 {
        self.produced as f64 / self.sample_rate as f64
    }
}

/// Read side of a live input stream
#[derive(Clone)]
pub struct LiveTap {
    backlog: Arc<Mutex<Vec<f32>>>,
    consumed: Arc<AtomicU64>,
    sample_rate: u32,
}

impl LiveTap {
    fn new(sample_rate: u32) -> Self {
        Self {
            backlog: Arc::new(Mutex::new(Vec::new())),
            consumed: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Append samples, dropping the oldest beyond the backlog limit
    pub fn push(&self, samples: impl IntoIterator<Item = f32>) {
        let limit = (self.sample_rate * MIC_BACKLOG_SECS) as usize;
        let mut backlog = self.backlog.lock().unwrap_or_else(PoisonError::into_inner);
        backlog.extend(samples);
        if backlog.len() > limit {
            let excess = backlog.len() - limit;
            backlog.drain(..excess);
        }
    }
}

impl SampleSource for LiveTap {
    fn pull(&mut self, _frames: usize, out: &mut Vec<f32>) {
        let mut backlog = self.backlog.lock().unwrap_or_else(PoisonError::into_inner);
        self.consumed.fetch_add(backlog.len() as u64, Ordering::Relaxed);
        out.append(&mut backlog);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn position_secs(&self) -> f64 {
        self.consumed.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }
}

/// An open input stream; dropping it releases the device
pub struct Microphone {
    _stream: cpal::Stream,
    tap: LiveTap,
    device_name: String,
}

impl Microphone {
    /// Open the default input device
    ///
    /// Any host refusal (no device, permission, unsupported format) comes
    /// back as [`VisynthError::CaptureUnavailable`].
    pub fn open() -> Result<Self> {
        let unavailable = |e: &dyn std::fmt::Display| VisynthError::CaptureUnavailable(e.to_string());

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VisynthError::CaptureUnavailable("no input device found".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device.default_input_config().map_err(|e| unavailable(&e))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let tap = LiveTap::new(config.sample_rate.0);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_tap_stream::<f32>(&device, &config, tap.clone()),
            cpal::SampleFormat::I16 => build_tap_stream::<i16>(&device, &config, tap.clone()),
            cpal::SampleFormat::U16 => build_tap_stream::<u16>(&device, &config, tap.clone()),
            other => Err(VisynthError::CaptureUnavailable(format!(
                "unsupported sample format {other:?}"
            ))),
        }?;
        stream.play().map_err(|e| unavailable(&e))?;

        info!(device = %device_name, sample_rate = config.sample_rate.0, "microphone open");
        Ok(Self {
            _stream: stream,
            tap,
            device_name,
        })
    }

    pub fn tap(&self) -> LiveTap {
        self.tap.clone()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn build_tap_stream<T>(device: &cpal::Device, config: &cpal::StreamConfig, tap: LiveTap) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                tap.push(data.chunks(channels).map(|frame| {
                    frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>() / frame.len() as f32
                }));
            },
            |err| warn!(%err, "microphone stream error"),
            None,
        )
        .map_err(|e| VisynthError::CaptureUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_pads_with_silence_after_end() {
        let mut clip = ClipSource::from_samples(vec![0.5; 10], 10);
        let mut out = Vec::new();
        clip.pull(6, &mut out);
        clip.pull(6, &mut out);
        assert_eq!(out.len(), 12);
        assert!(out[..10].iter().all(|&s| s == 0.5));
        assert!(out[10..].iter().all(|&s| s == 0.0));
        assert!(clip.is_finished());
        assert_eq!(clip.position_secs(), 1.0);
    }

    #[test]
    fn test_wav_decode_downmixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let clip = ClipSource::open(&path).unwrap();
        assert_eq!(clip.sample_rate(), 8000);
        assert!((clip.duration_secs() - 0.1).abs() < 1e-9);
        assert!((clip.samples[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_missing_wav_is_decode_error() {
        let err = ClipSource::open("/nonexistent/clip.wav").err().unwrap();
        assert!(matches!(err, VisynthError::AudioDecode { .. }));
    }

    #[test]
    fn test_live_tap_drains_and_bounds_backlog() {
        let mut tap = LiveTap::new(100);
        tap.push((0..250).map(|i| i as f32));
        let mut out = Vec::new();
        tap.pull(0, &mut out);
        assert_eq!(out.len(), 100);
        assert_eq!(out[0], 150.0);
        assert_eq!(tap.position_secs(), 1.0);

        out.clear();
        tap.pull(0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_microphone_input_tuning() {
        let base = CaptureConfig {
            fft_size: 1024,
            ..CaptureConfig::default()
        };
        let mic = AudioInput::Microphone.capture_config(&base);
        assert_eq!(mic.fft_size, 1024);
        assert_eq!(mic.input_gain, 3.0);
        assert_eq!(mic.smoothing_time_constant, 0.1);
        assert_eq!(AudioInput::Synth.capture_config(&base).input_gain, 1.0);
    }
}
