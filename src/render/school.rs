//! Fish renderer: filled teardrop bodies over a black tank.

use glam::{Mat2, Vec2};
use image::{Rgba, RgbaImage};

use crate::fish::Fish;

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Body length behind the nose (pixels)
const BODY_LENGTH: f32 = 30.0;

/// Where along the body the curve control points sit
const BODY_CONTROL_X: f32 = 20.0;

/// Half-width of the body at its control points
const BODY_HALF_WIDTH: f32 = 10.0;

/// Peak sideways wiggle (pixels)
const WIGGLE_AMPLITUDE: f32 = 2.0;

/// Wiggle phase speed (radians per second) and spatial offset (radians per pixel)
const WIGGLE_RATE: f32 = 2.0;
const WIGGLE_SPREAD: f32 = 0.01;

/// Segments per body curve
const CURVE_STEPS: usize = 10;

/// Body outline in fish-local space: nose at the origin, tail towards -x
///
/// Two quadratic curves nose→tail→nose; `wiggle` bends both sides the
/// same way so the body sways.
pub fn fish_outline(wiggle: f32) -> Vec<Vec2> {
    let nose = Vec2::ZERO;
    let tail = Vec2::new(-BODY_LENGTH, 0.0);
    let upper = Vec2::new(-BODY_CONTROL_X, -BODY_HALF_WIDTH + wiggle);
    let lower = Vec2::new(-BODY_CONTROL_X, BODY_HALF_WIDTH - wiggle);

    let mut outline = Vec::with_capacity(CURVE_STEPS * 2);
    for (from, control, to) in [(nose, upper, tail), (tail, lower, nose)] {
        for step in 0..CURVE_STEPS {
            let t = step as f32 / CURVE_STEPS as f32;
            let u = 1.0 - t;
            outline.push(from * (u * u) + control * (2.0 * u * t) + to * (t * t));
        }
    }
    outline
}

/// Draws a school into a fresh frame each tick
pub struct SchoolRenderer {
    width: u32,
    height: u32,
}

impl SchoolRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Draw `fish` at animation time `time_secs`
    pub fn render(&self, fish: &[Fish], time_secs: f32) -> RgbaImage {
        let mut image = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        let phase = time_secs * WIGGLE_RATE;
        for f in fish {
            let wiggle = (phase + f.position.x * WIGGLE_SPREAD).sin() * WIGGLE_AMPLITUDE;
            let rotation = Mat2::from_angle(f.heading.y.atan2(f.heading.x));
            let polygon: Vec<Vec2> = fish_outline(wiggle)
                .into_iter()
                .map(|p| f.position + rotation * p)
                .collect();
            let [r, g, b] = f.color;
            fill_polygon(&mut image, &polygon, Rgba([r, g, b, 255]));
        }
        image
    }
}

/// Even-odd fill, sampling pixel centres
fn fill_polygon(image: &mut RgbaImage, polygon: &[Vec2], color: Rgba<u8>) {
    if polygon.len() < 3 {
        return;
    }
    let (min, max) = polygon
        .iter()
        .fold((Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)), |(lo, hi), &p| {
            (lo.min(p), hi.max(p))
        });
    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = (max.x.ceil().max(0.0) as u32).min(image.width());
    let y1 = (max.y.ceil().max(0.0) as u32).min(image.height());

    for y in y0..y1 {
        for x in x0..x1 {
            if contains(polygon, Vec2::new(x as f32 + 0.5, y as f32 + 0.5)) {
                image.put_pixel(x, y, color);
            }
        }
    }
}

fn contains(polygon: &[Vec2], point: Vec2) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > point.y) != (b.y > point.y)
            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fish::{ACTIVE_COLOR, INACTIVE_COLOR};

    fn fish_at(x: f32, y: f32, heading: Vec2, color: [u8; 3]) -> Fish {
        Fish {
            position: Vec2::new(x, y),
            heading,
            angle: 0.0,
            speed: 1.0,
            color,
        }
    }

    #[test]
    fn test_outline_spans_body() {
        let outline = fish_outline(0.0);
        assert_eq!(outline.len(), CURVE_STEPS * 2);
        assert_eq!(outline[0], Vec2::ZERO);
        assert_eq!(outline[CURVE_STEPS], Vec2::new(-BODY_LENGTH, 0.0));
    }

    #[test]
    fn test_body_trails_behind_heading() {
        let renderer = SchoolRenderer::new(100, 100);
        let image = renderer.render(&[fish_at(60.0, 50.0, Vec2::X, ACTIVE_COLOR)], 0.0);
        // Behind the nose is body, ahead of it is water
        assert_eq!(image.get_pixel(45, 50), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(70, 50), &BACKGROUND);
    }

    #[test]
    fn test_heading_rotates_body() {
        let renderer = SchoolRenderer::new(100, 100);
        let image = renderer.render(&[fish_at(50.0, 60.0, Vec2::Y, INACTIVE_COLOR)], 0.0);
        // Heading +y puts the tail towards -y
        assert_eq!(image.get_pixel(50, 45), &Rgba([128, 128, 128, 255]));
        assert_eq!(image.get_pixel(50, 75), &BACKGROUND);
    }

    #[test]
    fn test_offscreen_fish_is_clipped() {
        let renderer = SchoolRenderer::new(40, 40);
        let image = renderer.render(&[fish_at(-100.0, -100.0, Vec2::X, ACTIVE_COLOR)], 1.0);
        assert!(image.pixels().all(|p| *p == BACKGROUND));
    }
}
