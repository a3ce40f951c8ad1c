//! The three visualization tabs, each owning its own simulation state.

use image::RgbaImage;

use crate::dither::DitherEffect;
use crate::error::Result;
use crate::features::MotionFeatures;
use crate::fish::School;
use crate::params::{SchoolParams, VisynthConfig};
use crate::render::{PointCloudRenderer, SchoolRenderer};
use crate::sandball::SandballField;
use crate::scheduler::{FrameClock, Visualization};

/// Which tab is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Mode {
    Sandball,
    Fish,
    Dither,
}

impl Mode {
    /// Build a fresh view for this tab
    pub fn build(self, config: &VisynthConfig) -> Result<Box<dyn Visualization>> {
        Ok(match self {
            Mode::Sandball => Box::new(SandballView::new(config)),
            Mode::Fish => Box::new(SchoolView::new(config)),
            Mode::Dither => Box::new(DitherView::new(config)?),
        })
    }
}

/// Pulsing point sphere
pub struct SandballView {
    field: SandballField,
    renderer: PointCloudRenderer,
    image: Option<RgbaImage>,
}

impl SandballView {
    pub fn new(config: &VisynthConfig) -> Self {
        Self {
            field: SandballField::new(config.sandball.clone()),
            renderer: PointCloudRenderer::new(config.render.clone()),
            image: None,
        }
    }

    pub fn field(&self) -> &SandballField {
        &self.field
    }
}

impl Visualization for SandballView {
    fn name(&self) -> &'static str {
        "sandball"
    }

    fn tick(&mut self, audio: Option<&[u8]>, _clock: &FrameClock) {
        let frame = self.field.update(audio);
        self.image = Some(self.renderer.render(&self.field.vertices, &frame));
    }

    fn frame(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    fn apply_config(&mut self, config: &VisynthConfig) -> Result<()> {
        self.field.set_params(config.sandball.clone());
        self.renderer = PointCloudRenderer::new(config.render.clone());
        Ok(())
    }

    fn deactivate(&mut self) {
        self.image = None;
    }
}

/// Schooling fish tank
pub struct SchoolView {
    school: School,
    renderer: SchoolRenderer,
    image: Option<RgbaImage>,
}

impl SchoolView {
    pub fn new(config: &VisynthConfig) -> Self {
        Self {
            renderer: renderer_for(&config.school),
            school: School::new(config.school.clone()),
            image: None,
        }
    }

    pub fn school(&self) -> &School {
        &self.school
    }
}

fn renderer_for(params: &SchoolParams) -> SchoolRenderer {
    SchoolRenderer::new(params.width.round() as u32, params.height.round() as u32)
}

impl Visualization for SchoolView {
    fn name(&self) -> &'static str {
        "fish"
    }

    fn tick(&mut self, audio: Option<&[u8]>, clock: &FrameClock) {
        // No audio yet reads as silence: the tank stays frozen
        let features = MotionFeatures::from_buffer(audio.unwrap_or(&[]));
        self.school.step(&features);
        self.image = Some(self.renderer.render(self.school.fish(), clock.time_secs()));
    }

    fn frame(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    fn apply_config(&mut self, config: &VisynthConfig) -> Result<()> {
        let params = &config.school;
        let current = self.school.params();
        if (params.width, params.height) != (current.width, current.height) {
            self.school.resize(params.width, params.height);
            self.renderer = renderer_for(params);
        }
        self.school.set_count(params.count);
        Ok(())
    }

    fn deactivate(&mut self) {
        self.image = None;
    }
}

/// Audio-thresholded halftone of an uploaded image
pub struct DitherView {
    effect: DitherEffect,
}

impl DitherView {
    pub fn new(config: &VisynthConfig) -> Result<Self> {
        Ok(Self {
            effect: DitherEffect::new(config.dither.clone())?,
        })
    }

    pub fn effect(&self) -> &DitherEffect {
        &self.effect
    }

    pub fn effect_mut(&mut self) -> &mut DitherEffect {
        &mut self.effect
    }
}

impl Visualization for DitherView {
    fn name(&self) -> &'static str {
        "dither"
    }

    fn tick(&mut self, audio: Option<&[u8]>, _clock: &FrameClock) {
        self.effect.render(audio);
    }

    fn frame(&self) -> Option<&RgbaImage> {
        self.effect.has_image().then(|| self.effect.canvas())
    }

    fn apply_config(&mut self, config: &VisynthConfig) -> Result<()> {
        self.effect.set_params(config.dither.clone())
    }

    fn set_image(&mut self, id: &str, image: RgbaImage) {
        self.effect.set_image(id, image);
    }

    fn deactivate(&mut self) {
        self.effect.clear_image();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RenderConfig;
    use crate::scheduler::{FrameLoop, Tick};

    fn small_config() -> VisynthConfig {
        VisynthConfig {
            render: RenderConfig {
                frame_width: 64,
                frame_height: 64,
                ..RenderConfig::default()
            },
            ..VisynthConfig::default()
        }
    }

    #[test]
    fn test_every_mode_draws_or_idles() {
        let config = small_config();
        let buffer = vec![180u8; 1024];
        for mode in [Mode::Sandball, Mode::Fish] {
            let mut view = mode.build(&config).unwrap();
            let mut frame_loop = FrameLoop::new(60);
            assert_eq!(frame_loop.tick(view.as_mut(), Some(&buffer)), Tick::Drawn);
            assert!(view.frame().is_some(), "{mode:?} drew nothing");
        }

        // Dither has nothing to draw until an image arrives
        let mut view = Mode::Dither.build(&config).unwrap();
        FrameLoop::new(60).tick(view.as_mut(), Some(&buffer));
        assert!(view.frame().is_none());
    }

    #[test]
    fn test_fish_without_audio_stay_put() {
        let mut config = small_config();
        config.school.seed = Some(4);
        let mut view = SchoolView::new(&config);
        let before: Vec<_> = view.school().fish().iter().map(|f| f.position).collect();
        let clock = FrameClock::new(60);
        view.tick(None, &clock);
        let after: Vec<_> = view.school().fish().iter().map(|f| f.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_fish_count_follows_config() {
        let mut config = small_config();
        let mut view = SchoolView::new(&config);
        config.school.count = 9;
        view.apply_config(&config).unwrap();
        assert_eq!(view.school().fish().len(), 9);
    }

    #[test]
    fn test_sandball_spin_follows_config() {
        let mut config = small_config();
        let mut view = SandballView::new(&config);
        config.sandball.spin = 2.0;
        view.apply_config(&config).unwrap();
        view.tick(None, &FrameClock::new(60));
        assert!((view.field().rotation_y() - 0.02).abs() < 1e-6);
    }
}
