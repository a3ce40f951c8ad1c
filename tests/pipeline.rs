//! End-to-end checks across the feature, simulation and dithering layers.

use std::collections::HashSet;

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::SeedableRng;

use visynth::dither::{build_palette, dither, DitherAlgorithm, DitherStyle};
use visynth::features::{dither_threshold, extract_features, MotionFeatures};
use visynth::fish::School;
use visynth::params::{SandballParams, SchoolParams, VisynthConfig};
use visynth::sandball::{SandballField, NUM_POINTS};
use visynth::scheduler::Tick;
use visynth::session::Session;
use visynth::views::Mode;

#[test]
fn zero_buffer_collapses_sandball_to_floor_radius() {
    let buffer = vec![0u8; 1024];

    let features = extract_features(&buffer);
    assert_eq!(features.bass, 0.0);
    assert_eq!(features.mid, 0.0);
    assert_eq!(features.treble, 0.0);
    assert_eq!(features.amplitude, 0.0);

    let mut field = SandballField::new(SandballParams::default());
    let frame = field.update(Some(&buffer));
    assert!(!frame.idle);
    assert_eq!(field.vertices.len(), NUM_POINTS);
    for vertex in &field.vertices {
        assert!((vertex.radius() - 1.75).abs() < 1e-4, "radius {}", vertex.radius());
    }
}

#[test]
fn silent_school_holds_position() {
    let mut school = School::new(SchoolParams {
        count: 5,
        seed: Some(21),
        ..SchoolParams::default()
    });
    let start: Vec<_> = school.fish().iter().map(|f| f.position).collect();

    let silence = MotionFeatures::from_buffer(&[128u8; 1024]);
    assert!(silence.is_silent);
    for _ in 0..10 {
        school.step(&silence);
    }

    let end: Vec<_> = school.fish().iter().map(|f| f.position).collect();
    assert_eq!(start, end);
    assert!(school.fish().iter().all(|f| f.speed == 0.0));
}

#[test]
fn checkerboard_survives_neutral_threshold() {
    let original = RgbaImage::from_fn(4, 4, |x, y| {
        let v = if (x + y) % 2 == 0 { 0 } else { 255 };
        Rgba([v, v, v, 255])
    });
    let threshold = dither_threshold(&[128u8; 1024]);
    assert_eq!(threshold, 128.0);

    let mut image = original.clone();
    let style = DitherStyle::Bw {
        dark: [0, 0, 0],
        light: [255, 255, 255],
    };
    dither(&mut image, threshold, DitherAlgorithm::Threshold, style);
    assert_eq!(image, original);
}

#[test]
fn two_tone_image_reproduced_by_color_threshold() {
    let dark = [0, 0, 0];
    let light = [255, 255, 255];
    let source = RgbaImage::from_fn(32, 32, |x, _| {
        let [r, g, b] = if x < 16 { dark } else { light };
        Rgba([r, g, b, 255])
    });

    let mut rng = StdRng::seed_from_u64(3);
    let palette = build_palette(&source, 2, &mut rng);
    let found: HashSet<[u8; 3]> = palette.colors().iter().copied().collect();
    assert_eq!(found, HashSet::from([dark, light]));

    let mut image = source.clone();
    dither(&mut image, 128.0, DitherAlgorithm::Threshold, DitherStyle::Color(&palette));
    assert_eq!(image, source);
}

#[test]
fn session_switches_tabs_without_audio() {
    let mut config = VisynthConfig::default();
    config.render.frame_width = 48;
    config.render.frame_height = 48;
    config.school.width = 120.0;
    config.school.height = 80.0;

    let mut session = Session::new(config, Mode::Fish).unwrap();
    assert_eq!(session.tick(), Tick::Drawn);
    assert_eq!(session.frame().unwrap().dimensions(), (120, 80));

    session.switch_mode(Mode::Sandball).unwrap();
    assert_eq!(session.tick(), Tick::Drawn);
    assert_eq!(session.frame().unwrap().dimensions(), (48, 48));

    session.switch_mode(Mode::Dither).unwrap();
    session.tick();
    assert!(session.frame().is_none());
}
