//! Dithering controls.

use serde::{Deserialize, Serialize};

use crate::dither::parse_hex_color;
use crate::error::{Result, VisynthError};

/// Two-colour halftone or palette quantization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DitherMode {
    #[default]
    Bw,
    Color,
}

/// Dithering configuration from the control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DitherParams {
    /// Algorithm tag: threshold, floyd / floyd-steinberg, atkinson, bayer
    /// Unrecognised tags fall back to threshold.
    pub algorithm: String,

    /// Colour mode
    pub mode: DitherMode,

    /// Palette size in colour mode (2..=16)
    pub num_colors: usize,

    /// Colour for the dark bucket in bw mode (`#rgb` or `#rrggbb`)
    pub color0: String,

    /// Colour for the light bucket in bw mode
    pub color1: String,

    /// Canvas the source image is letterboxed into (pixels)
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for DitherParams {
    fn default() -> Self {
        Self {
            algorithm: "threshold".to_string(),
            mode: DitherMode::Bw,
            num_colors: 8,
            color0: "#000000".to_string(),
            color1: "#ffffff".to_string(),
            canvas_width: 512,
            canvas_height: 512,
        }
    }
}

impl DitherParams {
    pub const MIN_COLORS: usize = 2;
    pub const MAX_COLORS: usize = 16;

    pub fn validate(&self) -> Result<()> {
        if !(Self::MIN_COLORS..=Self::MAX_COLORS).contains(&self.num_colors) {
            return Err(VisynthError::Config(format!(
                "palette size must be in {}..={}, got {}",
                Self::MIN_COLORS,
                Self::MAX_COLORS,
                self.num_colors
            )));
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(VisynthError::Config("dither canvas must be non-empty".to_string()));
        }
        parse_hex_color(&self.color0)?;
        parse_hex_color(&self.color1)?;
        Ok(())
    }
}
