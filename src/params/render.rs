//! Rendering and recording configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VisynthError};

/// Render surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Sandball frame width (pixels)
    pub frame_width: u32,

    /// Sandball frame height (pixels)
    pub frame_height: u32,

    /// Vertical field of view (degrees)
    pub fov_degrees: f32,

    /// Camera distance from the sphere centre along +Z (world units)
    pub camera_distance: f32,

    /// Near clipping plane
    pub near_plane: f32,

    /// Far clipping plane
    pub far_plane: f32,

    /// Paint-loop rate (frames per second)
    pub target_fps: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_width: 800,
            frame_height: 800,
            fov_degrees: 45.0,
            camera_distance: 7.5,
            near_plane: 0.1,
            far_plane: 1000.0,
            target_fps: 60,
        }
    }
}

impl RenderConfig {
    pub fn aspect_ratio(&self) -> f32 {
        self.frame_width as f32 / self.frame_height as f32
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(VisynthError::Config("frame size must be non-zero".to_string()));
        }
        if self.target_fps == 0 {
            return Err(VisynthError::Config("target fps must be > 0".to_string()));
        }
        if self.near_plane <= 0.0 || self.far_plane <= self.near_plane {
            return Err(VisynthError::Config(format!(
                "clip planes must satisfy 0 < near < far, got {}..{}",
                self.near_plane, self.far_plane
            )));
        }
        Ok(())
    }
}

/// Recording mode configuration
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Number of frames to render
    pub frames: usize,

    /// Output directory for frames
    pub output_dir: String,

    /// Frame rate (FPS)
    pub fps: u32,
}

impl RecordingConfig {
    pub fn new(frames: usize, output_dir: impl Into<String>, fps: u32) -> Self {
        Self {
            frames,
            output_dir: output_dir.into(),
            fps,
        }
    }

    /// Length of the recording in seconds
    pub fn duration_secs(&self) -> f32 {
        self.frames as f32 / self.fps as f32
    }

    /// Frame directory path
    pub fn frames_dir(&self) -> String {
        format!("{}/frames", self.output_dir)
    }

    /// Path of a numbered frame
    pub fn frame_path(&self, frame_num: usize) -> String {
        format!("{}/frame_{:05}.png", self.frames_dir(), frame_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_path_numbering() {
        let config = RecordingConfig::new(90, "out", 30);
        assert_eq!(config.frame_path(7), "out/frames/frame_00007.png");
        assert_eq!(config.duration_secs(), 3.0);
    }
}
