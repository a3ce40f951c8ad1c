//! Frame-driven scheduling with cooperative cancellation.
//!
//! A [`FrameLoop`] drives one [`Visualization`] from a single thread. The
//! host calls [`FrameLoop::tick`] once per repaint; the loop activates the
//! view on its first tick, checks its [`CancelToken`] at the top of every
//! tick, and deactivates the view exactly once when cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use tracing::debug;

use crate::error::Result;
use crate::params::VisynthConfig;

/// Shared stop flag; clones observe the same cancellation
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Frame counter and derived animation time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    pub frame: u64,
    pub fps: u32,
}

impl FrameClock {
    pub fn new(fps: u32) -> Self {
        Self { frame: 0, fps }
    }

    /// Seconds since the first tick
    pub fn time_secs(&self) -> f32 {
        self.frame as f32 / self.fps.max(1) as f32
    }

    fn advance(&mut self) {
        self.frame += 1;
    }
}

/// A tab that draws one frame per tick from the latest audio buffer
///
/// Simulation state lives in the implementor; `tick` must tolerate a
/// missing buffer and must not fail.
pub trait Visualization {
    fn name(&self) -> &'static str;

    /// Acquire per-activation resources
    fn activate(&mut self) {}

    /// Advance and redraw
    fn tick(&mut self, audio: Option<&[u8]>, clock: &FrameClock);

    /// Most recent frame, if one has been drawn
    fn frame(&self) -> Option<&RgbaImage>;

    /// Pick up live control changes
    fn apply_config(&mut self, config: &VisynthConfig) -> Result<()>;

    /// Receive an uploaded image; views that do not use one ignore it
    fn set_image(&mut self, _id: &str, _image: RgbaImage) {}

    /// Release per-activation resources
    fn deactivate(&mut self) {}
}

/// Outcome of one [`FrameLoop::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Drawn,
    Stopped,
}

/// Single-threaded repaint loop for one activation of a view
pub struct FrameLoop {
    token: CancelToken,
    clock: FrameClock,
    active: bool,
    finished: bool,
}

impl FrameLoop {
    pub fn new(fps: u32) -> Self {
        Self {
            token: CancelToken::new(),
            clock: FrameClock::new(fps),
            active: false,
            finished: false,
        }
    }

    /// Handle for stopping the loop from elsewhere
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Run one repaint
    pub fn tick(&mut self, view: &mut dyn Visualization, audio: Option<&[u8]>) -> Tick {
        if self.token.is_cancelled() {
            self.finish(view);
            return Tick::Stopped;
        }
        if !self.active {
            if self.finished {
                return Tick::Stopped;
            }
            debug!(view = view.name(), "activating");
            view.activate();
            self.active = true;
        }
        view.tick(audio, &self.clock);
        self.clock.advance();
        Tick::Drawn
    }

    /// Cancel and deactivate now
    pub fn stop(&mut self, view: &mut dyn Visualization) {
        self.token.cancel();
        self.finish(view);
    }

    fn finish(&mut self, view: &mut dyn Visualization) {
        if self.active {
            debug!(view = view.name(), frames = self.clock.frame, "deactivating");
            view.deactivate();
            self.active = false;
        }
        self.finished = true;
    }
}
