//! Audio-reactive halftoning.
//!
//! Four algorithms (threshold, Floyd–Steinberg, Atkinson, ordered Bayer)
//! run either in two-tone mode against a luminance threshold, or in palette
//! mode against a k-means palette. The threshold comes from the audio
//! (see [`crate::features::dither_threshold`]).

mod effect;
mod palette;

use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use tracing::warn;

use crate::error::{Result, VisynthError};

pub use effect::{fit_to_canvas, DitherEffect, FittedImage};
pub use palette::{build_palette, Palette, PaletteCache, PaletteKey};

/// An RGB triple
pub type Rgb = [u8; 3];

/// Floyd–Steinberg taps: (dx, dy, weight)
pub const FLOYD_STEINBERG: [(i32, i32, f32); 4] = [
    (1, 0, 7.0 / 16.0),
    (-1, 1, 3.0 / 16.0),
    (0, 1, 5.0 / 16.0),
    (1, 1, 1.0 / 16.0),
];

/// Atkinson taps; each receives `error / divisor`
pub const ATKINSON: [(i32, i32); 6] = [(1, 0), (2, 0), (-1, 1), (0, 1), (1, 1), (0, 2)];

/// 4x4 ordered-dither matrix (0..=240)
pub const BAYER_4X4: [[u8; 4]; 4] = [
    [0, 128, 32, 160],
    [192, 64, 224, 96],
    [48, 176, 16, 144],
    [240, 112, 208, 80],
];

/// Halftoning algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DitherAlgorithm {
    Threshold,
    FloydSteinberg,
    Atkinson,
    Bayer,
    /// Unrecognised tag: plain threshold in bw mode, nearest palette colour in colour mode
    Fallback,
}

impl DitherAlgorithm {
    /// Lenient lookup: unknown tags resolve to [`Self::Fallback`] with a warning
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or_else(|_| {
            warn!(tag, "unknown dithering algorithm, using fallback");
            Self::Fallback
        })
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::FloydSteinberg => "floyd-steinberg",
            Self::Atkinson => "atkinson",
            Self::Bayer => "bayer",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for DitherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for DitherAlgorithm {
    type Err = VisynthError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "threshold" => Ok(Self::Threshold),
            "floyd" | "floyd-steinberg" => Ok(Self::FloydSteinberg),
            "atkinson" => Ok(Self::Atkinson),
            "bayer" => Ok(Self::Bayer),
            _ => Err(VisynthError::UnknownAlgorithm(tag.to_string())),
        }
    }
}

/// Output colours for one pass
#[derive(Debug, Clone, Copy)]
pub enum DitherStyle<'a> {
    /// Two-tone: `dark` below the threshold, `light` at or above
    Bw { dark: Rgb, light: Rgb },
    /// Quantize to a palette
    Color(&'a Palette),
}

/// Parse `#rgb` or `#rrggbb` (leading `#` optional)
pub fn parse_hex_color(hex: &str) -> Result<Rgb> {
    let digits = hex.trim().trim_start_matches('#');
    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 => digits.to_string(),
        _ => return Err(VisynthError::InvalidColor(hex.to_string())),
    };
    let value =
        u32::from_str_radix(&expanded, 16).map_err(|_| VisynthError::InvalidColor(hex.to_string()))?;
    Ok([(value >> 16) as u8, (value >> 8) as u8, value as u8])
}

/// BT.601 luma
pub fn luminance(rgb: Rgb) -> f32 {
    0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32
}

/// Error-spread divisor for Atkinson: louder audio spreads less per tap
pub fn atkinson_divisor(threshold: f32) -> f32 {
    (8.0 + (threshold - 128.0) / 8.0).clamp(3.0, 16.0)
}

/// Dither `image` in place. Alpha is left untouched.
pub fn dither(image: &mut RgbaImage, threshold: f32, algorithm: DitherAlgorithm, style: DitherStyle<'_>) {
    match style {
        DitherStyle::Bw { dark, light } => match algorithm {
            DitherAlgorithm::Threshold | DitherAlgorithm::Fallback => {
                bw_threshold(image, threshold, dark, light)
            }
            DitherAlgorithm::FloydSteinberg => bw_floyd_steinberg(image, threshold, dark, light),
            DitherAlgorithm::Atkinson => bw_atkinson(image, threshold),
            DitherAlgorithm::Bayer => bw_bayer(image, threshold, dark, light),
        },
        DitherStyle::Color(palette) => {
            if palette.is_empty() {
                return;
            }
            match algorithm {
                DitherAlgorithm::Threshold => color_threshold(image, threshold, palette),
                DitherAlgorithm::FloydSteinberg => color_floyd_steinberg(image, palette),
                DitherAlgorithm::Bayer => color_bayer(image, palette),
                // No palette variant of Atkinson: plain quantization
                DitherAlgorithm::Atkinson | DitherAlgorithm::Fallback => color_nearest(image, palette),
            }
        }
    }
}

fn rgb_of(pixel: &image::Rgba<u8>) -> Rgb {
    [pixel[0], pixel[1], pixel[2]]
}

fn set_rgb(pixel: &mut image::Rgba<u8>, rgb: Rgb) {
    pixel[0] = rgb[0];
    pixel[1] = rgb[1];
    pixel[2] = rgb[2];
}

fn bayer_at(x: u32, y: u32) -> f32 {
    BAYER_4X4[(y % 4) as usize][(x % 4) as usize] as f32
}

fn bw_threshold(image: &mut RgbaImage, threshold: f32, dark: Rgb, light: Rgb) {
    for pixel in image.pixels_mut() {
        let gray = luminance(rgb_of(pixel));
        set_rgb(pixel, if gray < threshold { dark } else { light });
    }
}

fn bw_bayer(image: &mut RgbaImage, threshold: f32, dark: Rgb, light: Rgb) {
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let gray = luminance(rgb_of(pixel));
        let effective = threshold + (bayer_at(x, y) - 128.0);
        set_rgb(pixel, if gray < effective { dark } else { light });
    }
}

/// Running luminance plane used by the diffusion passes
struct GrayPlane {
    width: i64,
    height: i64,
    values: Vec<f32>,
}

impl GrayPlane {
    fn from_image(image: &RgbaImage) -> Self {
        Self {
            width: image.width() as i64,
            height: image.height() as i64,
            values: image.pixels().map(|p| luminance(rgb_of(p))).collect(),
        }
    }

    fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y as i64 * self.width + x as i64) as usize]
    }

    /// Add `amount` at (x+dx, y+dy) if inside, clamping to [0, 255].
    /// Returns the unclamped amount offered to an in-bounds neighbour.
    fn nudge(&mut self, x: u32, y: u32, dx: i32, dy: i32, amount: f32) -> f32 {
        let nx = x as i64 + dx as i64;
        let ny = y as i64 + dy as i64;
        if nx < 0 || nx >= self.width || ny < 0 || ny >= self.height {
            return 0.0;
        }
        let slot = &mut self.values[(ny * self.width + nx) as usize];
        *slot = (*slot + amount).clamp(0.0, 255.0);
        amount
    }
}

/// Two-level quantization of a luminance value
fn quantize_gray(value: f32, threshold: f32) -> f32 {
    if value < threshold {
        0.0
    } else {
        255.0
    }
}

fn bw_floyd_steinberg(image: &mut RgbaImage, threshold: f32, dark: Rgb, light: Rgb) {
    let mut plane = GrayPlane::from_image(image);
    let (width, height) = image.dimensions();
    for y in 0..height {
        for x in 0..width {
            let old = plane.get(x, y);
            let new = quantize_gray(old, threshold);
            set_rgb(image.get_pixel_mut(x, y), if new == 0.0 { dark } else { light });
            let error = old - new;
            for (dx, dy, weight) in FLOYD_STEINBERG {
                plane.nudge(x, y, dx, dy, error * weight);
            }
        }
    }
}

fn bw_atkinson(image: &mut RgbaImage, threshold: f32) {
    let divisor = atkinson_divisor(threshold);
    let mut plane = GrayPlane::from_image(image);
    let (width, height) = image.dimensions();
    for y in 0..height {
        for x in 0..width {
            let old = plane.get(x, y);
            let new = quantize_gray(old, threshold);
            // Atkinson output is raw black/white, not the configured pair
            let level = new as u8;
            set_rgb(image.get_pixel_mut(x, y), [level; 3]);
            let share = (old - new) / divisor;
            for (dx, dy) in ATKINSON {
                plane.nudge(x, y, dx, dy, share);
            }
        }
    }
}

fn color_threshold(image: &mut RgbaImage, threshold: f32, palette: &Palette) {
    let sorted = palette.sorted_by_luminance();
    let n = sorted.len() as f32;
    let audio_shift = (threshold - 128.0) / 255.0 * n;
    let last = sorted.len() as i64 - 1;
    for pixel in image.pixels_mut() {
        let gray = luminance(rgb_of(pixel));
        let raw = (gray / 255.0 * n + audio_shift).floor() as i64;
        set_rgb(pixel, sorted[raw.clamp(0, last) as usize]);
    }
}

fn color_floyd_steinberg(image: &mut RgbaImage, palette: &Palette) {
    let (width, height) = image.dimensions();
    let w = width as i64;
    let h = height as i64;
    let mut plane: Vec<[f32; 3]> = image
        .pixels()
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect();

    for y in 0..height {
        for x in 0..width {
            let idx = (y as i64 * w + x as i64) as usize;
            let old = plane[idx];
            let new = palette.nearest(old);
            set_rgb(image.get_pixel_mut(x, y), new);
            let error = [
                old[0] - new[0] as f32,
                old[1] - new[1] as f32,
                old[2] - new[2] as f32,
            ];
            for (dx, dy, weight) in FLOYD_STEINBERG {
                let nx = x as i64 + dx as i64;
                let ny = y as i64 + dy as i64;
                if nx < 0 || nx >= w || ny < 0 || ny >= h {
                    continue;
                }
                let neighbour = &mut plane[(ny * w + nx) as usize];
                for c in 0..3 {
                    neighbour[c] = (neighbour[c] + error[c] * weight).clamp(0.0, 255.0);
                }
            }
        }
    }
}

fn color_bayer(image: &mut RgbaImage, palette: &Palette) {
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        // Roughly [-2, +2] per channel
        let shift = (bayer_at(x, y) - 128.0) / 64.0;
        let nudged = rgb_of(pixel).map(|c| (c as f32 + shift).clamp(0.0, 255.0));
        set_rgb(pixel, palette.nearest(nudged));
    }
}

fn color_nearest(image: &mut RgbaImage, palette: &Palette) {
    for pixel in image.pixels_mut() {
        let rgb = rgb_of(pixel).map(|c| c as f32);
        set_rgb(pixel, palette.nearest(rgb));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Rgba;

    const BLACK: Rgb = [0, 0, 0];
    const WHITE: Rgb = [255, 255, 255];

    fn bw() -> DitherStyle<'static> {
        DitherStyle::Bw {
            dark: BLACK,
            light: WHITE,
        }
    }

    fn checkerboard(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    fn gray_image(width: u32, height: u32, level: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([level, level, level, 255]))
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!("floyd".parse::<DitherAlgorithm>().unwrap(), DitherAlgorithm::FloydSteinberg);
        assert_eq!(
            "Floyd-Steinberg".parse::<DitherAlgorithm>().unwrap(),
            DitherAlgorithm::FloydSteinberg
        );
        assert!(matches!(
            "jarvis".parse::<DitherAlgorithm>(),
            Err(VisynthError::UnknownAlgorithm(_))
        ));
        assert_eq!(DitherAlgorithm::from_tag("jarvis"), DitherAlgorithm::Fallback);
        assert!("fallback".parse::<DitherAlgorithm>().is_err());
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff8000").unwrap(), [255, 128, 0]);
        assert_eq!(parse_hex_color("#fff").unwrap(), WHITE);
        assert_eq!(parse_hex_color("123456").unwrap(), [0x12, 0x34, 0x56]);
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
    }

    #[test]
    fn test_luminance_weights() {
        assert_relative_eq!(luminance(WHITE), 255.0, epsilon = 1e-3);
        assert_relative_eq!(luminance([255, 0, 0]), 76.245, epsilon = 1e-3);
    }

    #[test]
    fn test_checkerboard_threshold_unchanged() {
        let original = checkerboard(4);
        let mut image = original.clone();
        dither(&mut image, 128.0, DitherAlgorithm::Threshold, bw());
        assert_eq!(image, original);
    }

    #[test]
    fn test_threshold_is_idempotent() {
        let mut image = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 90, 255]));
        let style = DitherStyle::Bw {
            dark: [20, 0, 60],
            light: [250, 240, 200],
        };
        dither(&mut image, 110.0, DitherAlgorithm::Threshold, style);
        let once = image.clone();
        dither(&mut image, 110.0, DitherAlgorithm::Threshold, style);
        assert_eq!(image, once);
    }

    #[test]
    fn test_threshold_preserves_alpha() {
        let mut image = RgbaImage::from_pixel(2, 2, Rgba([200, 200, 200, 17]));
        dither(&mut image, 128.0, DitherAlgorithm::Threshold, bw());
        assert!(image.pixels().all(|p| p[3] == 17));
    }

    #[test]
    fn test_floyd_weights_conserve_error() {
        let total: f32 = FLOYD_STEINBERG.iter().map(|&(_, _, w)| w).sum();
        assert_relative_eq!(total, 1.0);

        // An interior pixel hands its whole error to its neighbours
        let image = gray_image(5, 5, 100);
        let mut plane = GrayPlane::from_image(&image);
        let error = 37.5;
        let offered: f32 = FLOYD_STEINBERG
            .iter()
            .map(|&(dx, dy, w)| plane.nudge(2, 2, dx, dy, error * w))
            .sum();
        assert_relative_eq!(offered, error, epsilon = 1e-4);
    }

    #[test]
    fn test_floyd_mid_gray_half_tone() {
        let mut image = gray_image(64, 64, 128);
        dither(&mut image, 128.0, DitherAlgorithm::FloydSteinberg, bw());
        let white = image.pixels().filter(|p| p[0] == 255).count() as f32;
        let ratio = white / (64.0 * 64.0);
        assert!((0.45..=0.55).contains(&ratio), "white ratio {ratio}");
        assert!(image.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_floyd_uses_configured_colors() {
        let mut image = gray_image(8, 8, 180);
        let style = DitherStyle::Bw {
            dark: [10, 20, 30],
            light: [200, 100, 50],
        };
        dither(&mut image, 128.0, DitherAlgorithm::FloydSteinberg, style);
        assert!(image
            .pixels()
            .all(|p| rgb_of(p) == [10, 20, 30] || rgb_of(p) == [200, 100, 50]));
    }

    #[test]
    fn test_atkinson_divisor_tracks_threshold() {
        assert_relative_eq!(atkinson_divisor(128.0), 8.0);
        assert_relative_eq!(atkinson_divisor(191.5), 15.9375);
        assert_relative_eq!(atkinson_divisor(64.0), 3.0);
        assert_relative_eq!(atkinson_divisor(300.0), 16.0);
    }

    #[test]
    fn test_atkinson_outputs_black_and_white() {
        let mut image = RgbaImage::from_fn(16, 16, |x, _| Rgba([(x * 16) as u8, 40, 200, 255]));
        dither(&mut image, 140.0, DitherAlgorithm::Atkinson, bw());
        assert!(image.pixels().all(|p| rgb_of(p) == BLACK || rgb_of(p) == WHITE));
    }

    #[test]
    fn test_bayer_pattern_on_mid_gray() {
        let mut image = gray_image(4, 4, 128);
        dither(&mut image, 128.0, DitherAlgorithm::Bayer, bw());
        // 128 < 128 + (m - 128) exactly when m > 128
        for (x, y, pixel) in image.enumerate_pixels() {
            let m = BAYER_4X4[y as usize][x as usize];
            let expected = if m > 128 { 0 } else { 255 };
            assert_eq!(pixel[0], expected, "at ({x}, {y})");
        }
    }

    #[test]
    fn test_color_threshold_audio_shift() {
        let palette = Palette::new(vec![WHITE, BLACK]);
        let mut image = gray_image(2, 2, 100);
        // 100/255*2 = 0.78 → dark at neutral threshold
        dither(&mut image, 128.0, DitherAlgorithm::Threshold, DitherStyle::Color(&palette));
        assert_eq!(rgb_of(image.get_pixel(0, 0)), BLACK);

        // Loud audio shifts up: 0.78 + (191.5-128)/255*2 = 1.28 → light
        let mut image = gray_image(2, 2, 100);
        dither(&mut image, 191.5, DitherAlgorithm::Threshold, DitherStyle::Color(&palette));
        assert_eq!(rgb_of(image.get_pixel(0, 0)), WHITE);
    }

    #[test]
    fn test_color_floyd_only_palette_colors() {
        let palette = Palette::new(vec![[255, 0, 0], [0, 0, 255], [0, 0, 0]]);
        let mut image = RgbaImage::from_fn(12, 12, |x, y| Rgba([(x * 20) as u8, 30, (y * 20) as u8, 255]));
        dither(&mut image, 128.0, DitherAlgorithm::FloydSteinberg, DitherStyle::Color(&palette));
        assert!(image.pixels().all(|p| palette.colors().contains(&rgb_of(p))));
    }

    #[test]
    fn test_color_bayer_nudge_breaks_ties() {
        // Pixel sits nearer the dark entry; only a large positive nudge flips it
        let palette = Palette::new(vec![[100, 100, 100], [104, 104, 104]]);
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([101, 101, 101, 255]));
        dither(&mut image, 128.0, DitherAlgorithm::Bayer, DitherStyle::Color(&palette));
        let bright = image.pixels().filter(|p| p[0] == 104).count();
        assert!(bright > 0 && bright < 16);
    }

    #[test]
    fn test_color_atkinson_falls_back_to_nearest() {
        let palette = Palette::new(vec![[250, 250, 250], [5, 5, 5]]);
        let mut image = RgbaImage::from_fn(4, 1, |x, _| {
            let v = if x < 2 { 30 } else { 220 };
            Rgba([v, v, v, 255])
        });
        dither(&mut image, 128.0, DitherAlgorithm::Atkinson, DitherStyle::Color(&palette));
        assert_eq!(rgb_of(image.get_pixel(0, 0)), [5, 5, 5]);
        assert_eq!(rgb_of(image.get_pixel(3, 0)), [250, 250, 250]);
    }

    #[test]
    fn test_empty_palette_is_noop() {
        let palette = Palette::default();
        let original = checkerboard(4);
        let mut image = original.clone();
        dither(&mut image, 128.0, DitherAlgorithm::FloydSteinberg, DitherStyle::Color(&palette));
        assert_eq!(image, original);
    }
}
