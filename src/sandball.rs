//! Sandball: a spherical point cloud that pulses with the spectrum.
//!
//! A fixed 32x64 latitude/longitude lattice is laid out once. Each tick,
//! every point's radius is recomputed from the frequency band its latitude
//! maps to, and the whole sphere rotates about Y by `spin * 0.01` radians.

use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use tracing::trace;

use crate::features::{FrequencyBuffer, MIDLINE};
use crate::params::{SandballLayout, SandballParams};

pub const NUM_LAT: usize = 32;
pub const NUM_LON: usize = 64;
pub const NUM_POINTS: usize = NUM_LAT * NUM_LON;

/// Sphere radius at a midline (128) band average
pub const BASE_RADIUS: f32 = 2.4;

/// Radius gain applied to the pulse
pub const AMPLITUDE: f32 = 1.3;

/// Pulse for a full-scale deviation from the midline
pub const PULSE_SCALE: f32 = 0.5;

/// Exponent bending colatitude towards low bins in `bottom` layout
const BOTTOM_BASS_BIAS: f32 = 2.2;

/// Exponent bending latitude towards low bands in `center` layout
const CENTER_BASS_BIAS: f32 = 1.2;

/// Half-width of the averaging window in `bottom` layout (bins)
const BOTTOM_WINDOW: usize = 6;

const CENTER_BANDS: usize = 4;

/// Rotation per tick per unit of spin (radians)
const SPIN_RATE: f32 = 0.01;

const FALLBACK_AMPLITUDE: f32 = 4.0;
const FALLBACK_INDEX_STEP: f32 = 0.05;
const FALLBACK_PHASE_STEP: f32 = 0.05;

/// Point vertex (object-space position, rotation applied at render time)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
}

impl PointVertex {
    pub fn radius(&self) -> f32 {
        let [x, y, z] = self.position;
        (x * x + y * y + z * z).sqrt()
    }
}

/// Immutable spherical coordinates of one lattice point
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpherePoint {
    /// Colatitude: 0 at the top pole, π at the bottom
    pub phi: f32,
    /// Longitude in [0, 2π)
    pub theta: f32,
}

/// Per-tick output consumed by the renderer
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SandballFrame {
    /// Accumulated rotation about Y (radians, unbounded)
    pub rotation_y: f32,
    /// Bloom intensity
    pub glow: f32,
    /// Point radius
    pub point_size: f32,
    /// True when the synthetic idle buffer was used
    pub idle: bool,
}

/// Sandball state: lattice, current vertex positions and rotation
pub struct SandballField {
    lattice: Vec<SpherePoint>,
    pub vertices: Vec<PointVertex>,
    params: SandballParams,
    rotation_y: f32,
    fallback: FrequencyBuffer,
    fallback_phase: f32,
}

impl SandballField {
    pub fn new(params: SandballParams) -> Self {
        let lattice = build_lattice();
        let mut field = Self {
            vertices: vec![PointVertex::zeroed(); lattice.len()],
            lattice,
            params,
            rotation_y: 0.0,
            fallback: FrequencyBuffer::filled(NUM_POINTS, MIDLINE as u8),
            fallback_phase: 0.0,
        };
        field.refill_fallback();
        field
    }

    pub fn lattice(&self) -> &[SpherePoint] {
        &self.lattice
    }

    pub fn params(&self) -> &SandballParams {
        &self.params
    }

    /// Live parameter update; takes effect on the next tick
    pub fn set_params(&mut self, params: SandballParams) {
        self.params = params;
    }

    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    /// Recompute every point for this tick
    ///
    /// A missing or empty buffer is replaced by the idle waveform, so the
    /// sphere never collapses.
    pub fn update(&mut self, buffer: Option<&[u8]>) -> SandballFrame {
        let idle = buffer.map_or(true, |b| b.is_empty());
        if idle {
            self.refill_fallback();
        }
        let samples: &[u8] = match buffer {
            Some(b) if !b.is_empty() => b,
            _ => &self.fallback,
        };

        let layout = self.params.layout;
        for (vertex, point) in self.vertices.iter_mut().zip(&self.lattice) {
            let average = band_average(samples, point.phi, layout);
            vertex.position = spherical_to_cartesian(pulse_radius(average), point.phi, point.theta);
        }

        self.rotation_y += self.params.spin * SPIN_RATE;
        trace!(idle, rotation = self.rotation_y, "sandball tick");

        SandballFrame {
            rotation_y: self.rotation_y,
            glow: self.params.glow,
            point_size: self.params.point_size,
            idle,
        }
    }

    /// Flat midline plus a slow travelling sine, advanced one step per call
    fn refill_fallback(&mut self) {
        let phase = self.fallback_phase;
        for (i, sample) in self.fallback.as_mut_slice().iter_mut().enumerate() {
            let wave = (i as f32 * FALLBACK_INDEX_STEP + phase).sin() * FALLBACK_AMPLITUDE;
            *sample = (MIDLINE + wave).round().clamp(0.0, 255.0) as u8;
        }
        self.fallback_phase += FALLBACK_PHASE_STEP;
    }
}

fn build_lattice() -> Vec<SpherePoint> {
    let mut lattice = Vec::with_capacity(NUM_POINTS);
    for lat in 0..NUM_LAT {
        let phi = PI * lat as f32 / (NUM_LAT - 1) as f32;
        for lon in 0..NUM_LON {
            let theta = 2.0 * PI * lon as f32 / NUM_LON as f32;
            lattice.push(SpherePoint { phi, theta });
        }
    }
    lattice
}

/// Average magnitude feeding a point at colatitude `phi`
pub fn band_average(samples: &[u8], phi: f32, layout: SandballLayout) -> f32 {
    let n = samples.len();
    if n == 0 {
        return MIDLINE;
    }
    let window = match layout {
        SandballLayout::Bottom => {
            let t = ((PI - phi) / PI).clamp(0.0, 1.0);
            let index = (t.powf(BOTTOM_BASS_BIAS) * (n - 1) as f32).round() as usize;
            let start = index.saturating_sub(BOTTOM_WINDOW);
            let end = (index + BOTTOM_WINDOW).min(n - 1);
            &samples[start..=end]
        }
        SandballLayout::Center => {
            let band = center_band(phi);
            let band_size = (n / CENTER_BANDS).max(1);
            let start = (band * band_size).min(n - 1);
            let end = ((band + 1) * band_size).min(n).max(start + 1);
            &samples[start..end]
        }
    };
    let sum: u32 = window.iter().map(|&v| v as u32).sum();
    sum as f32 / window.len() as f32
}

/// Coarse band (0..=3) for `center` layout: 0 at the equator, 3 at the poles
pub fn center_band(phi: f32) -> usize {
    let y_ratio = phi.cos().abs();
    let band = (y_ratio.powf(CENTER_BASS_BIAS) * CENTER_BANDS as f32).floor() as usize;
    band.min(CENTER_BANDS - 1)
}

/// Radius for a band average
pub fn pulse_radius(band_average: f32) -> f32 {
    let pulse = (band_average - MIDLINE) / MIDLINE * PULSE_SCALE;
    BASE_RADIUS + AMPLITUDE * pulse
}

fn spherical_to_cartesian(r: f32, phi: f32, theta: f32) -> [f32; 3] {
    [
        r * phi.sin() * theta.cos(),
        r * phi.cos(),
        r * phi.sin() * theta.sin(),
    ]
}
