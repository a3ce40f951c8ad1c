//! Palette extraction (sparse k-means) and caching.

use image::RgbaImage;
use rand::Rng;
use tracing::debug;

use super::{luminance, Rgb};
use crate::params::DitherMode;

/// Every 4th pixel is sampled
const SAMPLE_STRIDE: usize = 4;

/// Fixed number of refinement passes after seeding
const LLOYD_ITERATIONS: usize = 2;

/// Ordered set of representative colours
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb>) -> Self {
        Self { colors }
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Closest entry by squared RGB distance; first entry wins ties.
    /// An empty palette maps everything to black.
    pub fn nearest(&self, rgb: [f32; 3]) -> Rgb {
        let mut best = [0, 0, 0];
        let mut best_dist = f32::INFINITY;
        for &color in &self.colors {
            let d: f32 = (0..3).map(|c| (rgb[c] - color[c] as f32).powi(2)).sum();
            if d < best_dist {
                best_dist = d;
                best = color;
            }
        }
        best
    }

    /// Entries ordered dark to light
    pub fn sorted_by_luminance(&self) -> Vec<Rgb> {
        let mut sorted = self.colors.clone();
        sorted.sort_by(|a, b| luminance(*a).total_cmp(&luminance(*b)));
        sorted
    }
}

fn distance_sq(a: Rgb, b: Rgb) -> u32 {
    (0..3)
        .map(|c| {
            let d = a[c] as i32 - b[c] as i32;
            (d * d) as u32
        })
        .sum()
}

/// Extract up to `n` representative colours from `image`
///
/// Samples every 4th pixel, seeds with one random sample plus farthest-point
/// picks, then runs two Lloyd passes. Empty clusters keep their centre.
pub fn build_palette<R: Rng + ?Sized>(image: &RgbaImage, n: usize, rng: &mut R) -> Palette {
    let samples: Vec<Rgb> = image
        .as_raw()
        .chunks_exact(4)
        .step_by(SAMPLE_STRIDE)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    if samples.is_empty() || n == 0 {
        return Palette::default();
    }

    let mut centers = vec![samples[rng.random_range(0..samples.len())]];
    let mut min_dist: Vec<u32> = samples.iter().map(|&s| distance_sq(s, centers[0])).collect();
    while centers.len() < n {
        let (far_idx, _) = min_dist
            .iter()
            .enumerate()
            .fold((0, 0u32), |best, (i, &d)| if d > best.1 { (i, d) } else { best });
        let center = samples[far_idx];
        centers.push(center);
        for (d, &s) in min_dist.iter_mut().zip(&samples) {
            *d = (*d).min(distance_sq(s, center));
        }
    }

    for _ in 0..LLOYD_ITERATIONS {
        let mut sums = vec![[0u64; 3]; centers.len()];
        let mut counts = vec![0u64; centers.len()];
        for &s in &samples {
            let (idx, _) = centers
                .iter()
                .enumerate()
                .map(|(i, &c)| (i, distance_sq(s, c)))
                .fold((0, u32::MAX), |best, cur| if cur.1 < best.1 { cur } else { best });
            for c in 0..3 {
                sums[idx][c] += s[c] as u64;
            }
            counts[idx] += 1;
        }
        for ((center, sum), &count) in centers.iter_mut().zip(&sums).zip(&counts) {
            if count == 0 {
                continue;
            }
            *center = sum.map(|v| (v as f64 / count as f64).round() as u8);
        }
    }

    Palette::new(centers)
}

/// Inputs a cached palette depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaletteKey {
    pub image_id: String,
    pub num_colors: usize,
    pub mode: DitherMode,
}

/// Holds one palette, dropped whenever its key changes
#[derive(Debug, Default)]
pub struct PaletteCache {
    key: Option<PaletteKey>,
    palette: Option<Palette>,
    builds: u64,
}

impl PaletteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the cached palette if `key` differs from the last one seen
    pub fn observe(&mut self, key: &PaletteKey) {
        if self.key.as_ref() != Some(key) {
            if self.palette.is_some() {
                debug!(image = %key.image_id, colors = key.num_colors, "palette invalidated");
            }
            self.key = Some(key.clone());
            self.palette = None;
        }
    }

    /// Cached palette for `key`, building it from `image` on a miss
    pub fn get_or_build<R: Rng + ?Sized>(
        &mut self,
        key: &PaletteKey,
        image: &RgbaImage,
        rng: &mut R,
    ) -> &Palette {
        self.observe(key);
        if self.palette.is_none() {
            self.builds += 1;
            debug!(image = %key.image_id, colors = key.num_colors, "building palette");
        }
        self.palette
            .get_or_insert_with(|| build_palette(image, key.num_colors, rng))
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Number of palettes built so far
    pub fn builds(&self) -> u64 {
        self.builds
    }
}
