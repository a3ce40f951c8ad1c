//! Sandball point-cloud renderer: perspective splats, additive blend, bloom.

use glam::{Mat4, Vec3, Vec4};
use image::{imageops, Rgba, RgbaImage};

use crate::params::RenderConfig;
use crate::sandball::{PointVertex, SandballFrame};

/// Warm sand (#ffccaa)
pub const SANDBALL_COLOR: [f32; 3] = [1.0, 0.8, 0.667];

pub const SANDBALL_OPACITY: f32 = 0.85;

/// Blur radius at zero and full glow (pixels, gaussian sigma)
const BLOOM_SIGMA_MIN: f32 = 2.0;
const BLOOM_SIGMA_SPAN: f32 = 6.0;

/// Brightness of the bloom layer at glow = 1
const BLOOM_GAIN: f32 = 1.5;

/// Smallest splat radius (pixels)
const MIN_SPLAT_RADIUS: f32 = 0.75;

/// Projects sandball vertices from a fixed camera on +Z looking at the origin
pub struct PointCloudRenderer {
    config: RenderConfig,
    view_proj: Mat4,
    /// Pixels per world unit at unit depth
    focal_px: f32,
}

impl PointCloudRenderer {
    pub fn new(config: RenderConfig) -> Self {
        let eye = Vec3::new(0.0, 0.0, config.camera_distance);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(
            config.fov_degrees.to_radians(),
            config.aspect_ratio(),
            config.near_plane,
            config.far_plane,
        );
        let focal_px =
            config.frame_height as f32 * 0.5 / (config.fov_degrees.to_radians() * 0.5).tan();
        Self {
            view_proj: proj * view,
            focal_px,
            config,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Screen position and depth of a world-space point, if it is in view
    pub fn project(&self, world: Vec3) -> Option<(f32, f32, f32)> {
        let clip = self.view_proj * Vec4::new(world.x, world.y, world.z, 1.0);
        if clip.w < self.config.near_plane {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        if !(-1.0..=1.0).contains(&ndc.x) || !(-1.0..=1.0).contains(&ndc.y) {
            return None;
        }
        let x = (ndc.x * 0.5 + 0.5) * self.config.frame_width as f32;
        let y = (0.5 - ndc.y * 0.5) * self.config.frame_height as f32;
        Some((x, y, clip.w))
    }

    /// Draw one sandball frame
    pub fn render(&self, vertices: &[PointVertex], frame: &SandballFrame) -> RgbaImage {
        let width = self.config.frame_width as usize;
        let height = self.config.frame_height as usize;
        let mut light = vec![[0.0f32; 3]; width * height];
        let model = Mat4::from_rotation_y(frame.rotation_y);

        for vertex in vertices {
            let world = model.transform_point3(Vec3::from_array(vertex.position));
            let Some((sx, sy, depth)) = self.project(world) else {
                continue;
            };
            let radius = (frame.point_size * self.focal_px / depth * 0.5).max(MIN_SPLAT_RADIUS);
            splat(&mut light, width, height, sx, sy, radius);
        }

        let base = RgbaImage::from_fn(width as u32, height as u32, |x, y| {
            let [r, g, b] = light[y as usize * width + x as usize];
            Rgba([to_byte(r), to_byte(g), to_byte(b), 255])
        });
        if frame.glow <= 0.0 {
            return base;
        }
        bloom(&base, frame.glow)
    }
}

/// Additively blend one anti-aliased disc
fn splat(light: &mut [[f32; 3]], width: usize, height: usize, cx: f32, cy: f32, radius: f32) {
    let reach = radius + 0.5;
    let x0 = (cx - reach).floor().max(0.0) as usize;
    let y0 = (cy - reach).floor().max(0.0) as usize;
    let x1 = ((cx + reach).ceil() as usize).min(width);
    let y1 = ((cy + reach).ceil() as usize).min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let coverage = (reach - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
            if coverage == 0.0 {
                continue;
            }
            let weight = coverage * SANDBALL_OPACITY;
            let texel = &mut light[y * width + x];
            for c in 0..3 {
                texel[c] += SANDBALL_COLOR[c] * weight;
            }
        }
    }
}

/// Add a blurred copy of `base` on top of itself, scaled by `glow`
fn bloom(base: &RgbaImage, glow: f32) -> RgbaImage {
    let sigma = BLOOM_SIGMA_MIN + BLOOM_SIGMA_SPAN * glow.min(1.0);
    let blurred = imageops::blur(base, sigma);
    let gain = glow * BLOOM_GAIN;
    RgbaImage::from_fn(base.width(), base.height(), |x, y| {
        let sharp = base.get_pixel(x, y);
        let soft = blurred.get_pixel(x, y);
        let mut out = [0u8, 0, 0, 255];
        for c in 0..3 {
            out[c] = (sharp[c] as f32 + soft[c] as f32 * gain).min(255.0) as u8;
        }
        Rgba(out)
    })
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> RenderConfig {
        RenderConfig {
            frame_width: 200,
            frame_height: 200,
            ..RenderConfig::default()
        }
    }

    fn frame(glow: f32) -> SandballFrame {
        SandballFrame {
            rotation_y: 0.0,
            glow,
            point_size: 0.045,
            idle: false,
        }
    }

    fn at(x: f32, y: f32, z: f32) -> PointVertex {
        PointVertex {
            position: [x, y, z],
        }
    }

    fn brightness(image: &RgbaImage, x: u32, y: u32) -> u32 {
        let p = image.get_pixel(x, y);
        p[0] as u32 + p[1] as u32 + p[2] as u32
    }

    #[test]
    fn test_origin_projects_to_centre() {
        let renderer = PointCloudRenderer::new(small_config());
        let (x, y, depth) = renderer.project(Vec3::ZERO).unwrap();
        assert!((x - 100.0).abs() < 1e-3);
        assert!((y - 100.0).abs() < 1e-3);
        assert!((depth - 7.5).abs() < 1e-3);
    }

    #[test]
    fn test_points_behind_camera_are_culled() {
        let renderer = PointCloudRenderer::new(small_config());
        assert!(renderer.project(Vec3::new(0.0, 0.0, 10.0)).is_none());
        let image = renderer.render(&[at(0.0, 0.0, 10.0)], &frame(0.0));
        assert!(image.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_splat_uses_sand_color() {
        let renderer = PointCloudRenderer::new(small_config());
        let image = renderer.render(&[at(0.0, 0.0, 0.0)], &frame(0.0));
        let p = image.get_pixel(100, 100);
        assert!(p[0] > p[1] && p[1] > p[2]);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn test_overlapping_points_add_up() {
        let renderer = PointCloudRenderer::new(small_config());
        let one = renderer.render(&[at(0.0, 0.0, 0.0)], &frame(0.0));
        let two = renderer.render(&[at(0.0, 0.0, 0.0), at(0.0, 0.0, 0.0)], &frame(0.0));
        assert!(brightness(&two, 100, 100) > brightness(&one, 100, 100));
    }

    #[test]
    fn test_glow_spreads_light() {
        let renderer = PointCloudRenderer::new(small_config());
        // Dense 0.8-unit square around the origin (about 26 px across)
        let mut vertices = Vec::new();
        for i in 0..40 {
            for j in 0..40 {
                vertices.push(at(-0.4 + i as f32 * 0.02, -0.4 + j as f32 * 0.02, 0.0));
            }
        }
        let sharp = renderer.render(&vertices, &frame(0.0));
        let glowing = renderer.render(&vertices, &frame(1.0));
        // A few pixels outside the square
        assert_eq!(brightness(&sharp, 100, 118), 0);
        assert!(brightness(&glowing, 100, 118) > 0);
    }

    #[test]
    fn test_rotation_moves_points() {
        let renderer = PointCloudRenderer::new(small_config());
        let vertices = [at(1.0, 0.0, 0.0)];
        let still = renderer.render(&vertices, &frame(0.0));
        let turned = renderer.render(
            &vertices,
            &SandballFrame {
                rotation_y: std::f32::consts::FRAC_PI_2,
                ..frame(0.0)
            },
        );
        assert_ne!(still, turned);
    }
}
