//! Parameter definitions with units and documented semantics.
//!
//! Every tunable the control surface can touch lives here:
//! - Documented defaults and ranges
//! - A `validate()` per concern
//! - JSON round-tripping through serde, with missing fields taking defaults

mod audio;
mod dither;
mod fish;
mod render;
mod sandball;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// Re-export all types
pub use audio::{audio_constants, CaptureConfig};
pub use dither::{DitherMode, DitherParams};
pub use fish::SchoolParams;
pub use render::{RecordingConfig, RenderConfig};
pub use sandball::{SandballLayout, SandballParams};

/// Complete configuration, as loaded from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisynthConfig {
    pub capture: CaptureConfig,
    pub sandball: SandballParams,
    pub school: SchoolParams,
    pub dither: DitherParams,
    pub render: RenderConfig,
}

impl VisynthConfig {
    /// Load configuration from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.capture.validate()?;
        self.school.validate()?;
        self.dither.validate()?;
        self.render.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        VisynthConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "school": {{ "count": 12 }}, "dither": {{ "mode": "color", "num_colors": 4 }} }}"#
        )
        .unwrap();

        let config = VisynthConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.school.count, 12);
        assert_eq!(config.dither.mode, DitherMode::Color);
        assert_eq!(config.dither.num_colors, 4);
        assert_eq!(config.capture.fft_size, CaptureConfig::default().fft_size);
    }

    #[test]
    fn test_out_of_range_json_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "dither": {{ "num_colors": 40 }} }}"#).unwrap();
        assert!(VisynthConfig::from_json_file(file.path()).is_err());
    }
}
