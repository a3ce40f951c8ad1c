//! Dither visualization: a letterboxed source image re-dithered every frame.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use super::{dither, parse_hex_color, DitherAlgorithm, DitherStyle, Palette, PaletteCache, PaletteKey, Rgb};
use crate::error::Result;
use crate::features::dither_threshold;
use crate::params::{DitherMode, DitherParams};

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Source image scaled to fit a canvas, with its placement
#[derive(Debug, Clone)]
pub struct FittedImage {
    pub image: RgbaImage,
    pub x: u32,
    pub y: u32,
}

/// Scale `image` to fit inside `width` x `height`, preserving aspect ratio,
/// and centre it (letterbox or pillarbox)
pub fn fit_to_canvas(image: &RgbaImage, width: u32, height: u32) -> FittedImage {
    let (iw, ih) = image.dimensions();
    if iw == 0 || ih == 0 {
        return FittedImage {
            image: RgbaImage::new(0, 0),
            x: 0,
            y: 0,
        };
    }
    let image_aspect = iw as f32 / ih as f32;
    let canvas_aspect = width as f32 / height as f32;
    let (draw_w, draw_h) = if image_aspect > canvas_aspect {
        (width, (width as f32 / image_aspect).round() as u32)
    } else {
        ((height as f32 * image_aspect).round() as u32, height)
    };
    let draw_w = draw_w.clamp(1, width);
    let draw_h = draw_h.clamp(1, height);

    let scaled = if (draw_w, draw_h) == (iw, ih) {
        image.clone()
    } else {
        imageops::resize(image, draw_w, draw_h, FilterType::Triangle)
    };
    FittedImage {
        image: scaled,
        x: (width - draw_w) / 2,
        y: (height - draw_h) / 2,
    }
}

struct Source {
    id: String,
    original: RgbaImage,
    fitted: FittedImage,
}

/// Owns the image, palette cache and output canvas for the dither mode
pub struct DitherEffect {
    params: DitherParams,
    algorithm: DitherAlgorithm,
    dark: Rgb,
    light: Rgb,
    source: Option<Source>,
    cache: PaletteCache,
    rng: StdRng,
    canvas: RgbaImage,
}

impl DitherEffect {
    pub fn new(params: DitherParams) -> Result<Self> {
        let mut effect = Self {
            algorithm: DitherAlgorithm::Threshold,
            dark: [0, 0, 0],
            light: [255, 255, 255],
            source: None,
            cache: PaletteCache::new(),
            rng: StdRng::from_os_rng(),
            canvas: RgbaImage::from_pixel(params.canvas_width, params.canvas_height, BACKGROUND),
            params: params.clone(),
        };
        effect.set_params(params)?;
        Ok(effect)
    }

    /// Same as [`Self::new`] with a deterministic palette seed
    pub fn with_seed(params: DitherParams, seed: u64) -> Result<Self> {
        let mut effect = Self::new(params)?;
        effect.rng = StdRng::seed_from_u64(seed);
        Ok(effect)
    }

    pub fn params(&self) -> &DitherParams {
        &self.params
    }

    pub fn algorithm(&self) -> DitherAlgorithm {
        self.algorithm
    }

    /// Apply new controls; colour strings are checked before anything changes
    pub fn set_params(&mut self, params: DitherParams) -> Result<()> {
        let dark = parse_hex_color(&params.color0)?;
        let light = parse_hex_color(&params.color1)?;
        let canvas_changed =
            (params.canvas_width, params.canvas_height) != self.canvas.dimensions();

        self.algorithm = DitherAlgorithm::from_tag(&params.algorithm);
        self.dark = dark;
        self.light = light;
        self.params = params;

        if canvas_changed {
            self.canvas = RgbaImage::from_pixel(
                self.params.canvas_width,
                self.params.canvas_height,
                BACKGROUND,
            );
            if let Some(source) = &mut self.source {
                source.fitted = fit_to_canvas(
                    &source.original,
                    self.params.canvas_width,
                    self.params.canvas_height,
                );
            }
        }
        Ok(())
    }

    /// Install a source image; `id` keys the palette cache
    pub fn set_image(&mut self, id: impl Into<String>, image: RgbaImage) {
        let id = id.into();
        let fitted = fit_to_canvas(&image, self.params.canvas_width, self.params.canvas_height);
        info!(
            image = %id,
            width = image.width(),
            height = image.height(),
            "dither source loaded"
        );
        self.source = Some(Source {
            id,
            original: image,
            fitted,
        });
    }

    /// Decode an image file and install it
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let image = image::open(path)?.to_rgba8();
        self.set_image(path.display().to_string(), image);
        Ok(())
    }

    pub fn clear_image(&mut self) {
        self.source = None;
    }

    pub fn has_image(&self) -> bool {
        self.source.is_some()
    }

    /// Last rendered canvas
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.cache.palette()
    }

    /// Palettes built so far (one per image / size / mode change in colour mode)
    pub fn palette_builds(&self) -> u64 {
        self.cache.builds()
    }

    /// Re-dither the source for one audio frame
    ///
    /// Without an image or without audio this is a no-op and the previous
    /// canvas stays up. Returns whether the canvas was redrawn.
    pub fn render(&mut self, buffer: Option<&[u8]>) -> bool {
        let (Some(source), Some(buffer)) = (&self.source, buffer) else {
            return false;
        };
        if buffer.is_empty() {
            return false;
        }

        let threshold = dither_threshold(buffer);
        let key = PaletteKey {
            image_id: source.id.clone(),
            num_colors: self.params.num_colors,
            mode: self.params.mode,
        };

        let mut frame = source.fitted.image.clone();
        match self.params.mode {
            DitherMode::Bw => {
                self.cache.observe(&key);
                let style = DitherStyle::Bw {
                    dark: self.dark,
                    light: self.light,
                };
                dither(&mut frame, threshold, self.algorithm, style);
            }
            DitherMode::Color => {
                let palette = self.cache.get_or_build(&key, &source.fitted.image, &mut self.rng);
                dither(&mut frame, threshold, self.algorithm, DitherStyle::Color(palette));
            }
        }

        for pixel in self.canvas.pixels_mut() {
            *pixel = BACKGROUND;
        }
        imageops::replace(
            &mut self.canvas,
            &frame,
            source.fitted.x as i64,
            source.fitted.y as i64,
        );
        debug!(threshold, algorithm = %self.algorithm, "dither frame");
        true
    }
}
