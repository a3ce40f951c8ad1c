//! Numbered PNG frame output.

use std::path::PathBuf;

use image::RgbaImage;
use tracing::{debug, info};

use crate::error::Result;
use crate::params::RecordingConfig;

/// Writes `frame_00000.png`, `frame_00001.png`, ... under `<output>/frames`
pub struct FrameRecorder {
    config: RecordingConfig,
    next_frame: usize,
}

impl FrameRecorder {
    /// Create the frame directory and start numbering at zero
    pub fn new(config: RecordingConfig) -> Result<Self> {
        std::fs::create_dir_all(config.frames_dir())?;
        info!(
            frames = config.frames,
            fps = config.fps,
            dir = %config.frames_dir(),
            "recording {:.1}s of frames",
            config.duration_secs()
        );
        Ok(Self {
            config,
            next_frame: 0,
        })
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Frames written so far
    pub fn frames_written(&self) -> usize {
        self.next_frame
    }

    pub fn is_complete(&self) -> bool {
        self.next_frame >= self.config.frames
    }

    /// Save the next numbered frame
    pub fn save(&mut self, frame: &RgbaImage) -> Result<PathBuf> {
        let path = PathBuf::from(self.config.frame_path(self.next_frame));
        frame.save(&path)?;
        debug!(path = %path.display(), "frame saved");
        self.next_frame += 1;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_frames_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecordingConfig::new(2, dir.path().to_string_lossy(), 30);
        let mut recorder = FrameRecorder::new(config).unwrap();
        let frame = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));

        let first = recorder.save(&frame).unwrap();
        let second = recorder.save(&frame).unwrap();
        assert!(first.ends_with("frames/frame_00000.png"));
        assert!(second.ends_with("frames/frame_00001.png"));
        assert!(recorder.is_complete());

        let reloaded = image::open(&second).unwrap().to_rgba8();
        assert_eq!(reloaded, frame);
    }
}
