//! Visynth library - audio-reactive visualizations
//!
//! One frequency buffer (~30 Hz) drives three independent tabs: a pulsing
//! point-cloud sphere, a school of fish and an audio-thresholded dither.

pub mod audio;
pub mod dither;
pub mod error;
pub mod features;
pub mod fish;
pub mod params;
pub mod render;
pub mod sandball;
pub mod scheduler;
pub mod session;
pub mod views;

pub use error::{Result, VisynthError};
