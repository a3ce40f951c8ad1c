//! Schooling fish driven by motion features.
//!
//! Each tick every fish picks a new heading: its previous heading plus a
//! random turn whose size grows with treble and volume, or, with a
//! volume-dependent probability, the mean heading of nearby fish. Speed
//! follows volume with random bass bursts. Silence freezes the tank.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::features::{MotionFeatures, MIDLINE};
use crate::params::SchoolParams;

/// Motion volume that maps to full intensity
const LOUD_VOLUME: f32 = 60.0;

const BASE_SPEED: f32 = 0.2;
const VOLUME_SPEED: f32 = 2.0;
const BASS_SPEED: f32 = 0.05;

/// Bass deviation above which a burst can fire
const BURST_BASS: f32 = 40.0;
const BURST_CHANCE: f32 = 0.2;
const BURST_FACTOR: f32 = 1.5;

const BASE_CURVE: f32 = 0.25;
const VOLUME_CURVE: f32 = 0.4;

/// Peak schooling probability at full volume
const SCHOOLING_WEIGHT: f32 = 0.3;

/// Share of the random turn kept while schooling
const SCHOOLING_DAMPING: f32 = 0.3;

pub const ACTIVE_COLOR: [u8; 3] = [255, 255, 255];
pub const INACTIVE_COLOR: [u8; 3] = [128, 128, 128];

/// One schooling agent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fish {
    pub position: Vec2,
    /// Unit heading (zero only before the first tick of a degenerate spawn)
    pub heading: Vec2,
    /// Heading angle chosen on the last tick (radians)
    pub angle: f32,
    pub speed: f32,
    pub color: [u8; 3],
}

impl Fish {
    /// Spawn at a random position with a random heading
    pub fn spawn<R: Rng + ?Sized>(rng: &mut R, extent: Vec2) -> Self {
        let angle = rng.random::<f32>() * TAU;
        Self {
            position: Vec2::new(rng.random::<f32>() * extent.x, rng.random::<f32>() * extent.y),
            heading: Vec2::from_angle(angle),
            angle,
            speed: 0.0,
            color: ACTIVE_COLOR,
        }
    }

    /// Displacement per tick
    pub fn velocity(&self) -> Vec2 {
        self.heading * self.speed
    }

    fn heading_angle(&self) -> f32 {
        self.heading.y.atan2(self.heading.x)
    }
}

/// Map motion volume onto [0, 1]: 128 (quiet) → 0, 60 (loud) → 1
pub fn normalized_volume(volume: f32) -> f32 {
    (MIDLINE - volume.clamp(LOUD_VOLUME, MIDLINE)) / (MIDLINE - LOUD_VOLUME)
}

/// Advance every fish one tick
///
/// Reads only `prev`, so every fish sees the same t-1 snapshot.
pub fn step_population<R: Rng + ?Sized>(
    prev: &[Fish],
    features: &MotionFeatures,
    extent: Vec2,
    schooling_radius: f32,
    rng: &mut R,
) -> Vec<Fish> {
    if features.is_silent {
        return prev
            .iter()
            .map(|fish| Fish {
                speed: 0.0,
                color: INACTIVE_COLOR,
                ..*fish
            })
            .collect();
    }

    let norm_volume = normalized_volume(features.volume);
    let schooling_prob = norm_volume * SCHOOLING_WEIGHT;

    prev.iter()
        .enumerate()
        .map(|(idx, fish)| {
            let mut speed = BASE_SPEED + VOLUME_SPEED * norm_volume + features.bass * BASS_SPEED;
            let curve = BASE_CURVE + features.treble / MIDLINE + norm_volume * VOLUME_CURVE;
            let random_curve = (rng.random::<f32>() - 0.5) * curve;

            if features.bass > BURST_BASS && rng.random::<f32>() < BURST_CHANCE {
                speed *= BURST_FACTOR;
            }

            let angle = if rng.random::<f32>() < schooling_prob {
                match neighbor_heading(prev, idx, schooling_radius) {
                    Some(mean) => mean.y.atan2(mean.x) + random_curve * SCHOOLING_DAMPING,
                    None => fish.heading_angle() + random_curve,
                }
            } else {
                fish.heading_angle() + random_curve
            };

            let mut heading = Vec2::from_angle(angle);
            let mut position = fish.position + heading * speed;

            if position.x < 0.0 || position.x > extent.x {
                heading.x = -heading.x;
                position.x = position.x.clamp(0.0, extent.x);
            }
            if position.y < 0.0 || position.y > extent.y {
                heading.y = -heading.y;
                position.y = position.y.clamp(0.0, extent.y);
            }

            Fish {
                position,
                heading,
                angle,
                speed,
                color: ACTIVE_COLOR,
            }
        })
        .collect()
}

/// Normalized sum of the headings of other fish within `radius`
pub fn neighbor_heading(fish: &[Fish], idx: usize, radius: f32) -> Option<Vec2> {
    let me = fish[idx].position;
    let radius_sq = radius * radius;
    let (sum, count) = fish
        .iter()
        .enumerate()
        .filter(|&(j, other)| j != idx && other.position.distance_squared(me) < radius_sq)
        .fold((Vec2::ZERO, 0usize), |(sum, count), (_, other)| {
            (sum + other.heading, count + 1)
        });

    if count == 0 {
        return None;
    }
    let mag = sum.length();
    Some(if mag > 0.0 { sum / mag } else { sum })
}

/// Owned fish population with its own RNG
pub struct School {
    fish: Vec<Fish>,
    params: SchoolParams,
    rng: StdRng,
}

impl School {
    pub fn new(params: SchoolParams) -> Self {
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let fish = spawn_population(&mut rng, params.count, extent_of(&params));
        Self { fish, params, rng }
    }

    pub fn fish(&self) -> &[Fish] {
        &self.fish
    }

    pub fn params(&self) -> &SchoolParams {
        &self.params
    }

    pub fn extent(&self) -> Vec2 {
        extent_of(&self.params)
    }

    /// Replace the population when the count changes
    pub fn set_count(&mut self, count: usize) {
        let count = count.clamp(1, SchoolParams::MAX_FISH);
        if count == self.fish.len() {
            return;
        }
        debug!(from = self.fish.len(), to = count, "re-seeding fish population");
        self.params.count = count;
        let extent = self.extent();
        self.fish = spawn_population(&mut self.rng, count, extent);
    }

    /// Resize the tank and re-seed the population inside it
    pub fn resize(&mut self, width: f32, height: f32) {
        self.params.width = width;
        self.params.height = height;
        let extent = self.extent();
        self.fish = spawn_population(&mut self.rng, self.params.count, extent);
    }

    /// Advance one tick
    pub fn step(&mut self, features: &MotionFeatures) {
        let extent = self.extent();
        self.fish = step_population(
            &self.fish,
            features,
            extent,
            self.params.schooling_radius,
            &mut self.rng,
        );
    }
}

fn extent_of(params: &SchoolParams) -> Vec2 {
    Vec2::new(params.width, params.height)
}

fn spawn_population<R: Rng + ?Sized>(rng: &mut R, count: usize, extent: Vec2) -> Vec<Fish> {
    (0..count).map(|_| Fish::spawn(rng, extent)).collect()
}
