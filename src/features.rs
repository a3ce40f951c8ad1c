//! Spectral feature extraction shared by every visualization.
//!
//! A [`FrequencyBuffer`] is one analyser frame of `u8` magnitudes. The
//! helpers here turn it into the band energies each consumer needs:
//! normalized bass/mid/treble/amplitude for general use, the 128-centred
//! deviation bands that drive the fish, and the dithering threshold.

use std::ops::{Deref, Range};
use std::time::Duration;

/// Upper bound of the bass band, as a fraction of the buffer
pub const BASS_END: f32 = 0.1;

/// Upper bound of the mid band, as a fraction of the buffer
pub const MID_END: f32 = 0.4;

/// Midline of an 8-bit analyser frame
pub const MIDLINE: f32 = 128.0;

/// Motion volume below this counts as silence
pub const SILENCE_FLOOR: f32 = 5.0;

/// Motion volume above this counts as silence (flat-lined input)
pub const SILENCE_CEILING: f32 = 126.0;

/// One frame of frequency magnitudes (0..=255 per bin)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrequencyBuffer {
    samples: Vec<u8>,
}

impl FrequencyBuffer {
    pub fn new(samples: Vec<u8>) -> Self {
        Self { samples }
    }

    /// Buffer of `len` bins all set to `value`
    pub fn filled(len: usize, value: u8) -> Self {
        Self {
            samples: vec![value; len],
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.samples
    }

    /// Mean raw level (0..=255); 0 for an empty buffer
    pub fn mean_level(&self) -> f32 {
        mean(&self.samples)
    }
}

impl From<Vec<u8>> for FrequencyBuffer {
    fn from(samples: Vec<u8>) -> Self {
        Self::new(samples)
    }
}

impl Deref for FrequencyBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.samples
    }
}

/// Normalized band features for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioFeatures {
    /// Mean of the lowest 10% of bins, in [0, 1]
    pub bass: f32,
    /// Mean of bins 10%..40%, in [0, 1]
    pub mid: f32,
    /// Mean of bins 40%..N-1, in [0, 1]
    pub treble: f32,
    /// Mean of the whole buffer, in [0, 1]
    pub amplitude: f32,
    /// Motion-volume silence rule (see [`MotionFeatures`])
    pub is_silent: bool,
    /// Set by [`FeatureExtractor`]; always false from [`extract_features`]
    pub beat_detected: bool,
}

impl AudioFeatures {
    /// Features of a missing or empty buffer
    pub fn quiet() -> Self {
        Self {
            is_silent: true,
            ..Self::default()
        }
    }
}

/// Extract normalized band features from a frame
///
/// Total: an empty buffer yields [`AudioFeatures::quiet`].
pub fn extract_features(buffer: &[u8]) -> AudioFeatures {
    if buffer.is_empty() {
        return AudioFeatures::quiet();
    }

    let n = buffer.len();
    let bass = band_range(n, 0, ratio_index(n, BASS_END));
    let mid = band_range(n, ratio_index(n, BASS_END), ratio_index(n, MID_END));
    // Treble stops one short of the last bin
    let treble = band_range(n, ratio_index(n, MID_END), n - 1);

    AudioFeatures {
        bass: mean(&buffer[bass]) / 255.0,
        mid: mean(&buffer[mid]) / 255.0,
        treble: mean(&buffer[treble]) / 255.0,
        amplitude: mean(buffer) / 255.0,
        is_silent: MotionFeatures::from_buffer(buffer).is_silent,
        beat_detected: false,
    }
}

/// Deviation-from-midline features that drive the schooling simulation
///
/// Values are on a 0..=128 scale: the mean of `|v - 128|` over a band.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionFeatures {
    /// Whole-buffer deviation
    pub volume: f32,
    /// Deviation over the lowest quarter of bins
    pub bass: f32,
    /// Deviation over the highest quarter of bins
    pub treble: f32,
    pub is_silent: bool,
}

impl MotionFeatures {
    pub fn from_buffer(buffer: &[u8]) -> Self {
        if buffer.is_empty() {
            return Self {
                is_silent: true,
                ..Self::default()
            };
        }

        let n = buffer.len();
        let volume = mean_deviation(buffer);
        let bass = mean_deviation(&buffer[band_range(n, 0, ratio_index(n, 0.25))]);
        let treble = mean_deviation(&buffer[band_range(n, ratio_index(n, 0.75), n)]);

        Self {
            volume,
            bass,
            treble,
            is_silent: is_silent_volume(volume),
        }
    }
}

/// Silence rule: near-zero deviation, or a flat-lined extreme
///
/// The upper bound is suspiciously narrow but intentional to match the
/// established look of the fish mode.
pub fn is_silent_volume(volume: f32) -> bool {
    volume < SILENCE_FLOOR || volume > SILENCE_CEILING
}

/// Threshold the dithering algorithms split luminance at
///
/// `128 + (mean - 128) * 0.5`, which stays within [64, 191.5] for 8-bit input.
pub fn dither_threshold(buffer: &[u8]) -> f32 {
    MIDLINE + (mean(buffer) - MIDLINE) * 0.5
}

/// Energy-over-threshold beat detector with a refractory interval
#[derive(Debug, Clone)]
pub struct BeatDetector {
    /// Bass energy (0..=1) a beat must exceed
    pub energy_threshold: f32,
    /// Minimum gap between two beats
    pub min_interval: Duration,
    last_beat: Option<Duration>,
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self {
            energy_threshold: 0.6,
            min_interval: Duration::from_millis(250),
            last_beat: None,
        }
    }
}

impl BeatDetector {
    /// Feed one frame's bass energy at monotonic time `now`
    pub fn detect(&mut self, energy: f32, now: Duration) -> bool {
        let rested = match self.last_beat {
            Some(last) => now.saturating_sub(last) > self.min_interval,
            None => true,
        };
        if energy > self.energy_threshold && rested {
            self.last_beat = Some(now);
            true
        } else {
            false
        }
    }

    pub fn last_beat(&self) -> Option<Duration> {
        self.last_beat
    }
}

/// Extractor that also runs beat detection on caller-supplied timestamps
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    beats: BeatDetector,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(BeatDetector::default())
    }
}

impl FeatureExtractor {
    pub fn new(beats: BeatDetector) -> Self {
        Self { beats }
    }

    /// Extract features for a frame stamped `now`
    ///
    /// Stamps must come from one monotonic clock; a clock that jumps
    /// backwards holds beats off until it passes the last beat again.
    pub fn extract_at(&mut self, buffer: &[u8], now: Duration) -> AudioFeatures {
        let mut features = extract_features(buffer);
        features.beat_detected = self.beats.detect(features.bass, now);
        features
    }
}

fn ratio_index(len: usize, ratio: f32) -> usize {
    (len as f32 * ratio).floor() as usize
}

/// Clamp a band to the buffer; a band that would be empty covers the one
/// sample at its start so tiny buffers still report every band
fn band_range(len: usize, start: usize, end: usize) -> Range<usize> {
    let end = end.min(len);
    if start < end {
        start..end
    } else {
        let start = start.min(len.saturating_sub(1));
        start..(start + 1).min(len)
    }
}

fn mean(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples.iter().map(|&v| v as u64).sum();
    sum as f32 / samples.len() as f32
}

fn mean_deviation(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|&v| (v as f32 - MIDLINE).abs()).sum();
    sum / samples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_empty_buffer_is_quiet() {
        let features = extract_features(&[]);
        assert_eq!(features.bass, 0.0);
        assert_eq!(features.amplitude, 0.0);
        assert!(features.is_silent);
        assert!(!features.beat_detected);
    }

    #[test]
    fn test_all_zero_buffer() {
        let features = extract_features(&vec![0; 1024]);
        assert_eq!(features.bass, 0.0);
        assert_eq!(features.mid, 0.0);
        assert_eq!(features.treble, 0.0);
        assert_eq!(features.amplitude, 0.0);
    }

    #[test]
    fn test_band_boundaries() {
        // 10 bins: bass = [0,1), mid = [1,4), treble = [4,9)
        let buffer = [255, 0, 0, 0, 51, 51, 51, 51, 51, 200];
        let features = extract_features(&buffer);
        assert_relative_eq!(features.bass, 1.0);
        assert_relative_eq!(features.mid, 0.0);
        // Last bin is excluded from treble
        assert_relative_eq!(features.treble, 0.2);
    }

    #[test]
    fn test_flat_midline_is_silent() {
        let motion = MotionFeatures::from_buffer(&vec![128; 1024]);
        assert_eq!(motion.volume, 0.0);
        assert!(motion.is_silent);

        let features = extract_features(&vec![128; 1024]);
        assert_relative_eq!(features.amplitude, 128.0 / 255.0);
        assert!(features.is_silent);
    }

    #[test]
    fn test_silence_band_edges() {
        assert!(is_silent_volume(4.9));
        assert!(!is_silent_volume(5.0));
        assert!(!is_silent_volume(126.0));
        assert!(is_silent_volume(126.5));
    }

    #[test]
    fn test_motion_bands() {
        // 8 bins: bass = [0,2), treble = [6,8)
        let buffer = [188, 68, 128, 128, 128, 128, 138, 118];
        let motion = MotionFeatures::from_buffer(&buffer);
        assert_relative_eq!(motion.bass, 60.0);
        assert_relative_eq!(motion.treble, 10.0);
        assert_relative_eq!(motion.volume, 17.5);
        assert!(!motion.is_silent);
    }

    #[test]
    fn test_dither_threshold_midline() {
        assert_relative_eq!(dither_threshold(&vec![128; 64]), 128.0);
        assert_relative_eq!(dither_threshold(&vec![0; 64]), 64.0);
        assert_relative_eq!(dither_threshold(&vec![255; 64]), 191.5);
    }

    #[test]
    fn test_beat_refractory_interval() {
        let mut beats = BeatDetector::default();
        assert!(beats.detect(0.9, Duration::from_millis(0)));
        assert!(!beats.detect(0.9, Duration::from_millis(100)));
        // Exactly the interval is not enough
        assert!(!beats.detect(0.9, Duration::from_millis(250)));
        assert!(beats.detect(0.9, Duration::from_millis(251)));
        assert_eq!(beats.last_beat(), Some(Duration::from_millis(251)));
    }

    #[test]
    fn test_beat_needs_energy_above_threshold() {
        let mut beats = BeatDetector::default();
        assert!(!beats.detect(0.6, Duration::from_secs(1)));
        assert!(beats.detect(0.61, Duration::from_secs(2)));
    }

    #[test]
    fn test_extractor_flags_bass_beats() {
        let mut extractor = FeatureExtractor::default();
        let loud = vec![250; 1024];
        let quiet = vec![10; 1024];
        assert!(extractor.extract_at(&loud, Duration::from_millis(10)).beat_detected);
        assert!(!extractor.extract_at(&quiet, Duration::from_millis(400)).beat_detected);
        assert!(extractor.extract_at(&loud, Duration::from_millis(500)).beat_detected);
    }

    proptest! {
        #[test]
        fn prop_constant_buffer_bands_match(len in 1usize..2048, value in any::<u8>()) {
            let features = extract_features(&vec![value; len]);
            let expected = value as f32 / 255.0;
            prop_assert!((features.bass - expected).abs() < 1e-5);
            prop_assert!((features.mid - expected).abs() < 1e-5);
            prop_assert!((features.treble - expected).abs() < 1e-5);
            prop_assert!((features.amplitude - expected).abs() < 1e-5);
        }

        #[test]
        fn prop_threshold_in_range(buffer in proptest::collection::vec(any::<u8>(), 1..512)) {
            let t = dither_threshold(&buffer);
            prop_assert!((64.0..=191.5).contains(&t));
        }

        #[test]
        fn prop_features_normalized(buffer in proptest::collection::vec(any::<u8>(), 1..512)) {
            let f = extract_features(&buffer);
            for v in [f.bass, f.mid, f.treble, f.amplitude] {
                prop_assert!((0.0..=1.0).contains(&v));
            }
        }
    }
}
