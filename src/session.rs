//! Session controller: active tab, audio input and control changes.
//!
//! Owns at most one audio feed and one active view. Switching tabs stops
//! the old frame loop before the new view is built; swapping the input
//! tears the old capture down before the new one is wired.

use std::path::Path;
use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::audio::{AudioCapture, AudioInput, AudioPipeline, SpectrumFrame};
use crate::error::{Result, VisynthError};
use crate::features::{AudioFeatures, FeatureExtractor};
use crate::params::VisynthConfig;
use crate::scheduler::{FrameLoop, Tick, Visualization};
use crate::views::Mode;

/// Where frames come from
enum Feed {
    /// No input selected, or the device was unavailable
    Idle,
    /// Capture thread on wall-clock time
    Live(AudioCapture),
    /// Pipeline advanced one paint interval per tick (offline rendering)
    Stepped {
        pipeline: AudioPipeline,
        latest: Option<SpectrumFrame>,
    },
}

/// How a newly selected input is clocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    RealTime,
    /// One paint interval of audio per tick, independent of wall time
    Stepped,
}

struct ActiveView {
    mode: Mode,
    view: Box<dyn Visualization>,
    frame_loop: FrameLoop,
}

pub struct Session {
    config: VisynthConfig,
    feed: Feed,
    input: Option<AudioInput>,
    active: ActiveView,
    /// Dither source, kept across tab switches
    image: Option<(String, RgbaImage)>,
    extractor: FeatureExtractor,
    last_features: AudioFeatures,
    /// Session time for beat stamps; survives tab switches
    elapsed: Duration,
    advisory: Option<String>,
}

impl Session {
    pub fn new(config: VisynthConfig, mode: Mode) -> Result<Self> {
        config.validate()?;
        let active = ActiveView {
            mode,
            view: mode.build(&config)?,
            frame_loop: FrameLoop::new(config.render.target_fps),
        };
        info!(mode = ?mode, "session started");
        Ok(Self {
            config,
            feed: Feed::Idle,
            input: None,
            active,
            image: None,
            extractor: FeatureExtractor::default(),
            last_features: AudioFeatures::quiet(),
            elapsed: Duration::ZERO,
            advisory: None,
        })
    }

    pub fn config(&self) -> &VisynthConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.active.mode
    }

    pub fn input(&self) -> Option<&AudioInput> {
        self.input.as_ref()
    }

    /// Switch tabs: the old view is deactivated before the new one exists
    pub fn switch_mode(&mut self, mode: Mode) -> Result<()> {
        if mode == self.active.mode {
            return Ok(());
        }
        let old = self.active.mode;
        self.active.frame_loop.stop(self.active.view.as_mut());

        let mut view = mode.build(&self.config)?;
        if let Some((id, image)) = &self.image {
            view.set_image(id, image.clone());
        }
        self.active = ActiveView {
            mode,
            view,
            frame_loop: FrameLoop::new(self.config.render.target_fps),
        };
        info!(from = ?old, to = ?mode, "switched visualization");
        Ok(())
    }

    /// Select a new audio input
    ///
    /// The previous capture is fully stopped first. An unavailable device
    /// leaves the session idle with a one-shot advisory instead of failing.
    pub fn set_input(&mut self, input: AudioInput, timing: Timing) -> Result<()> {
        self.release_feed();
        self.input = None;

        let opened = match timing {
            Timing::RealTime => {
                AudioCapture::open(&input, &self.config.capture, None).map(Feed::Live)
            }
            Timing::Stepped => match input {
                AudioInput::Microphone => Err(VisynthError::Config(
                    "live microphone input cannot be stepped offline".to_string(),
                )),
                _ => AudioPipeline::open(&input, &self.config.capture).map(|(pipeline, _)| {
                    Feed::Stepped {
                        pipeline,
                        latest: None,
                    }
                }),
            },
        };

        match opened {
            Ok(feed) => {
                info!(input = %input, ?timing, "audio input ready");
                self.feed = feed;
                self.input = Some(input);
                Ok(())
            }
            Err(VisynthError::CaptureUnavailable(reason)) => {
                warn!(input = %input, %reason, "audio capture unavailable, running idle");
                self.advisory = Some(format!("Audio capture unavailable: {reason}"));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Stop listening; views fall back to their idle behaviour
    pub fn clear_input(&mut self) {
        self.release_feed();
        self.input = None;
    }

    fn release_feed(&mut self) {
        let previous = std::mem::replace(&mut self.feed, Feed::Idle);
        match previous {
            Feed::Live(mut capture) => capture.stop(),
            Feed::Stepped { .. } => debug!("stepped feed released"),
            Feed::Idle => {}
        }
    }

    /// Pending user-facing advisory; returned once
    pub fn take_advisory(&mut self) -> Option<String> {
        self.advisory.take()
    }

    /// Install the dither source image
    pub fn set_image(&mut self, id: impl Into<String>, image: RgbaImage) {
        let id = id.into();
        self.active.view.set_image(&id, image.clone());
        self.image = Some((id, image));
    }

    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let image = image::open(path)?.to_rgba8();
        self.set_image(path.display().to_string(), image);
        Ok(())
    }

    /// Apply a new configuration from the control surface
    pub fn update_config(&mut self, config: VisynthConfig) -> Result<()> {
        config.validate()?;
        self.active.view.apply_config(&config)?;
        self.config = config;
        Ok(())
    }

    /// Edit the current configuration in place
    pub fn update_with(&mut self, edit: impl FnOnce(&mut VisynthConfig)) -> Result<()> {
        let mut config = self.config.clone();
        edit(&mut config);
        self.update_config(config)
    }

    /// Latest analyser frame, if any
    pub fn latest_audio(&self) -> Option<SpectrumFrame> {
        match &self.feed {
            Feed::Idle => None,
            Feed::Live(capture) => capture.latest(),
            Feed::Stepped { latest, .. } => latest.clone(),
        }
    }

    /// Session time used to stamp beats; keeps running across tab switches
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Features of the buffer used on the last tick
    pub fn last_features(&self) -> &AudioFeatures {
        &self.last_features
    }

    /// One repaint of the active view
    pub fn tick(&mut self) -> Tick {
        let interval = Duration::from_secs_f64(1.0 / self.config.render.target_fps as f64);
        if let Feed::Stepped { pipeline, latest } = &mut self.feed {
            *latest = Some(pipeline.advance(interval));
        }

        let audio = self.latest_audio();
        let buffer = audio.as_ref().map(|frame| frame.buffer.as_slice());
        self.last_features = match buffer {
            Some(samples) => self.extractor.extract_at(samples, self.elapsed),
            None => AudioFeatures::quiet(),
        };
        self.elapsed += interval;
        if self.last_features.beat_detected {
            debug!(bass = self.last_features.bass, "beat");
        }

        self.active.frame_loop.tick(self.active.view.as_mut(), buffer)
    }

    /// Frame drawn by the last tick
    pub fn frame(&self) -> Option<&RgbaImage> {
        self.active.view.frame()
    }

    /// Stop the active view and release the audio input
    pub fn shutdown(&mut self) {
        self.active.frame_loop.stop(self.active.view.as_mut());
        self.clear_input();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
