//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use visynth::audio::AudioInput;
use visynth::params::{DitherMode, RecordingConfig, SandballLayout, VisynthConfig};
use visynth::session::Timing;
use visynth::views::Mode;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "visynth")]
#[command(about = "Audio-reactive visualizations rendered to PNG frames", long_about = None)]
pub struct Args {
    /// Visualization to render
    #[arg(long, value_enum, default_value_t = Mode::Sandball)]
    pub mode: Mode,

    /// WAV file to analyse
    #[arg(long, value_name = "WAV", conflicts_with_all = ["mic", "synth"])]
    pub input: Option<PathBuf>,

    /// Listen to the default input device (always real time)
    #[arg(long, conflicts_with = "synth")]
    pub mic: bool,

    /// Use the built-in procedural composition
    #[arg(long)]
    pub synth: bool,

    /// Image to dither (dither mode)
    #[arg(long, value_name = "IMAGE")]
    pub image: Option<PathBuf>,

    /// Number of frames to render
    #[arg(long, default_value_t = 90)]
    pub frames: usize,

    /// Output directory; frames go to <OUTPUT>/frames
    #[arg(long, value_name = "DIR", default_value = "output")]
    pub output: PathBuf,

    /// JSON configuration file (flags below override it)
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Pace frames on the wall clock instead of stepping audio per frame
    #[arg(long)]
    pub realtime: bool,

    /// Dithering algorithm: threshold, floyd-steinberg, atkinson, bayer
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Dithering colour mode
    #[arg(long, value_enum)]
    pub dither_mode: Option<DitherMode>,

    /// Palette size in colour mode (2-16)
    #[arg(long)]
    pub colors: Option<usize>,

    /// Dark colour for two-tone dithering (#rgb or #rrggbb)
    #[arg(long, value_name = "HEX")]
    pub color0: Option<String>,

    /// Light colour for two-tone dithering
    #[arg(long, value_name = "HEX")]
    pub color1: Option<String>,

    /// Number of fish (1-20)
    #[arg(long)]
    pub fish: Option<usize>,

    /// Sandball rotation speed
    #[arg(long, allow_hyphen_values = true)]
    pub spin: Option<f32>,

    /// Sandball bloom intensity
    #[arg(long)]
    pub glow: Option<f32>,

    /// Sandball point size (world units)
    #[arg(long)]
    pub point_size: Option<f32>,

    /// Sandball frequency layout
    #[arg(long, value_enum)]
    pub layout: Option<SandballLayout>,

    /// Seed for the fish simulation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Load the config file (or defaults) and apply flag overrides
    pub fn build_config(&self) -> visynth::Result<VisynthConfig> {
        let mut config = match &self.config {
            Some(path) => VisynthConfig::from_json_file(path)?,
            None => VisynthConfig::default(),
        };

        if let Some(algorithm) = &self.algorithm {
            config.dither.algorithm = algorithm.clone();
        }
        if let Some(mode) = self.dither_mode {
            config.dither.mode = mode;
        }
        if let Some(colors) = self.colors {
            config.dither.num_colors = colors;
        }
        if let Some(color0) = &self.color0 {
            config.dither.color0 = color0.clone();
        }
        if let Some(color1) = &self.color1 {
            config.dither.color1 = color1.clone();
        }
        if let Some(count) = self.fish {
            config.school.count = count;
        }
        if self.seed.is_some() {
            config.school.seed = self.seed;
        }
        if let Some(spin) = self.spin {
            config.sandball.spin = spin;
        }
        if let Some(glow) = self.glow {
            config.sandball.glow = glow;
        }
        if let Some(point_size) = self.point_size {
            config.sandball.point_size = point_size;
        }
        if let Some(layout) = self.layout {
            config.sandball.layout = layout;
        }

        config.validate()?;
        Ok(config)
    }

    /// Selected audio input, if any
    pub fn audio_input(&self) -> Option<AudioInput> {
        if self.mic {
            Some(AudioInput::Microphone)
        } else if self.synth {
            Some(AudioInput::Synth)
        } else {
            self.input.clone().map(AudioInput::File)
        }
    }

    /// The microphone only exists in real time
    pub fn timing(&self) -> Timing {
        if self.realtime || self.mic {
            Timing::RealTime
        } else {
            Timing::Stepped
        }
    }

    pub fn recording_config(&self, fps: u32) -> RecordingConfig {
        RecordingConfig::new(self.frames, self.output.to_string_lossy(), fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "visynth", "--mode", "dither", "--algorithm", "floyd", "--colors", "4", "--spin", "-2",
        ]);
        let config = args.build_config().unwrap();
        assert_eq!(args.mode, Mode::Dither);
        assert_eq!(config.dither.algorithm, "floyd");
        assert_eq!(config.dither.num_colors, 4);
        assert_eq!(config.sandball.spin, -2.0);
        assert!(args.audio_input().is_none());
    }

    #[test]
    fn test_mic_forces_real_time() {
        let args = Args::parse_from(["visynth", "--mic"]);
        assert_eq!(args.audio_input(), Some(AudioInput::Microphone));
        assert_eq!(args.timing(), Timing::RealTime);

        let args = Args::parse_from(["visynth", "--input", "song.wav"]);
        assert_eq!(args.timing(), Timing::Stepped);
    }

    #[test]
    fn test_out_of_range_flag_rejected() {
        let args = Args::parse_from(["visynth", "--colors", "40"]);
        assert!(args.build_config().is_err());
    }
}
