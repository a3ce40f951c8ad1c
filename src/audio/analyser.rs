//! Byte-valued spectrum analysis.
//!
//! Produces the same shape of data a browser analyser node does: a
//! Blackman-windowed FFT, magnitudes smoothed over time, converted to
//! decibels and mapped linearly from `[min_decibels, max_decibels]` onto
//! 0..=255.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::features::FrequencyBuffer;
use crate::params::CaptureConfig;

/// Windowed FFT with temporal smoothing
pub struct SpectrumAnalyser {
    config: CaptureConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(config: CaptureConfig) -> Self {
        let size = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self {
            window: (0..size).map(|i| blackman_window(i, size)).collect(),
            scratch: vec![Complex::new(0.0, 0.0); size],
            smoothed: vec![0.0; config.bin_count()],
            fft,
            config,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }

    /// Analyse the most recent `fft_size` samples of `history`
    ///
    /// Shorter histories are zero-padded at the front.
    pub fn analyse(&mut self, history: &[f32]) -> FrequencyBuffer {
        let size = self.config.fft_size;
        let take = history.len().min(size);
        let pad = size - take;
        let recent = &history[history.len() - take..];
        let gain = self.config.input_gain;

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { recent[i - pad] * gain };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.config.smoothing_time_constant;
        let scale = 1.0 / size as f32;
        let min_db = self.config.min_decibels;
        let range_db = self.config.max_decibels - min_db;

        let bytes = self
            .smoothed
            .iter_mut()
            .zip(&self.scratch)
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() * scale;
                *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
                let db = 20.0 * smoothed.log10();
                let scaled = 255.0 / range_db * (db - min_db);
                // NaN and -inf (silent bins) land on 0
                if scaled.is_nan() {
                    0
                } else {
                    scaled.clamp(0.0, 255.0) as u8
                }
            })
            .collect::<Vec<u8>>();
        FrequencyBuffer::new(bytes)
    }
}

/// Blackman window (alpha = 0.16)
fn blackman_window(index: usize, size: usize) -> f32 {
    let x = index as f32 / size as f32;
    0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
}
