//! Audio capture and spectrum analysis configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisynthError};

/// Spectrum analyser configuration for the capture thread
///
/// Mirrors a browser analyser node: the FFT output is smoothed over time,
/// converted to decibels and mapped linearly onto 0..=255.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// FFT window size (must be power of 2); the buffer has `fft_size / 2` bins
    pub fft_size: usize,

    /// Interval between published buffers (milliseconds)
    /// 33 ms ≈ 30 Hz
    pub update_interval_ms: u64,

    /// Blend factor with the previous frame's magnitudes (0 = no smoothing)
    pub smoothing_time_constant: f32,

    /// Magnitude mapped to byte 0 (dBFS)
    pub min_decibels: f32,

    /// Magnitude mapped to byte 255 (dBFS)
    pub max_decibels: f32,

    /// Linear gain applied to input samples before analysis
    pub input_gain: f32,

    /// Sample rate for the procedural synth source (Hz)
    pub synth_sample_rate_hz: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            update_interval_ms: 33,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            input_gain: 1.0,
            synth_sample_rate_hz: 44100,
        }
    }
}

impl CaptureConfig {
    /// Settings tuned for a live microphone: less smoothing, hotter range, 3x gain
    pub fn microphone() -> Self {
        Self {
            smoothing_time_constant: 0.1,
            max_decibels: -5.0,
            input_gain: 3.0,
            ..Self::default()
        }
    }

    /// Number of frequency bins delivered per buffer
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Validate configuration (FFT size must be power of 2, etc.)
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || self.fft_size < 32 {
            return Err(VisynthError::Config(format!(
                "FFT size must be a power of 2 and at least 32, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(VisynthError::Config(format!(
                "smoothing time constant must be in [0, 1], got {}",
                self.smoothing_time_constant
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(VisynthError::Config(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        if self.update_interval_ms == 0 {
            return Err(VisynthError::Config(
                "update interval must be > 0".to_string(),
            ));
        }
        if self.synth_sample_rate_hz == 0 {
            return Err(VisynthError::Config(
                "synth sample rate must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Audio constants (compile-time, match Glicol engine setup)
pub mod audio_constants {
    /// Audio block size (samples per buffer)
    /// 128 = 2.9ms @ 44.1kHz
    pub const BLOCK_SIZE: usize = 128;
}
