//! Sandball point-field parameters.

use serde::{Deserialize, Serialize};

/// Where bass lands on the sphere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SandballLayout {
    /// Bass at the bottom pole, power-curve mapping of colatitude to bin index
    #[default]
    Bottom,
    /// Bass at the equator, latitude mapped onto 4 coarse bands
    Center,
}

/// Live-updatable sandball controls
///
/// None of these are validated: the control surface owns the ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandballParams {
    /// Bloom intensity (0 = off)
    pub glow: f32,

    /// Rotation speed; the sphere turns `spin * 0.01` radians per tick
    pub spin: f32,

    /// Rendered point radius (world units)
    pub point_size: f32,

    /// Frequency-to-latitude layout
    pub layout: SandballLayout,
}

impl Default for SandballParams {
    fn default() -> Self {
        Self {
            glow: 0.5,
            spin: 0.0,
            point_size: 0.045,
            layout: SandballLayout::Bottom,
        }
    }
}
