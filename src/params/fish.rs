//! Schooling simulation parameters.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisynthError};

/// Fish population and tank configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolParams {
    /// Number of fish (1..=20)
    pub count: usize,

    /// Tank width (pixels)
    pub width: f32,

    /// Tank height (pixels)
    pub height: f32,

    /// Neighbour radius for heading alignment (pixels)
    pub schooling_radius: f32,

    /// Fixed RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for SchoolParams {
    fn default() -> Self {
        Self {
            count: 5,
            width: 512.0,
            height: 290.0,
            schooling_radius: 80.0,
            seed: None,
        }
    }
}

impl SchoolParams {
    pub const MAX_FISH: usize = 20;

    pub fn validate(&self) -> Result<()> {
        if !(1..=Self::MAX_FISH).contains(&self.count) {
            return Err(VisynthError::Config(format!(
                "fish count must be in 1..={}, got {}",
                Self::MAX_FISH,
                self.count
            )));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(VisynthError::Config(format!(
                "tank must have positive extent, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}
