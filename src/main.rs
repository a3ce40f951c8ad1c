//! visynth: render audio-reactive visualizations to numbered PNG frames

mod cli;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use image::{Rgba, RgbaImage};
use tracing::{info, warn};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use visynth::params::VisynthConfig;
use visynth::render::FrameRecorder;
use visynth::scheduler::Tick;
use visynth::session::{Session, Timing};
use visynth::views::Mode;

use cli::Args;

/// Log to stderr; `RUST_LOG` overrides the level flag
fn init_logging(level: &str) -> Result<()> {
    let level: LevelFilter = level
        .parse()
        .with_context(|| format!("invalid log level '{level}'"))?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);
    tracing_subscriber::registry().with(stderr_layer).init();
    Ok(())
}

/// Black frame for ticks where the view has nothing to show yet
fn blank_frame(config: &VisynthConfig, mode: Mode) -> RgbaImage {
    let (width, height) = match mode {
        Mode::Sandball => (config.render.frame_width, config.render.frame_height),
        Mode::Fish => (
            config.school.width.round() as u32,
            config.school.height.round() as u32,
        ),
        Mode::Dither => (config.dither.canvas_width, config.dither.canvas_height),
    };
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = args.build_config().context("loading configuration")?;
    let fps = config.render.target_fps;
    let timing = args.timing();

    let mut session = Session::new(config, args.mode)?;
    if let Some(path) = &args.image {
        session
            .load_image(path)
            .with_context(|| format!("loading image {}", path.display()))?;
    } else if args.mode == Mode::Dither {
        warn!("dither mode without --image renders blank frames");
    }

    if let Some(input) = args.audio_input() {
        session
            .set_input(input, timing)
            .context("opening audio input")?;
    }
    if let Some(advisory) = session.take_advisory() {
        eprintln!("{advisory}");
    }

    let mut recorder = FrameRecorder::new(args.recording_config(fps))?;
    let frame_interval = Duration::from_secs_f64(1.0 / fps as f64);
    let started = Instant::now();

    while !recorder.is_complete() {
        let tick_started = Instant::now();
        if session.tick() == Tick::Stopped {
            break;
        }
        match session.frame() {
            Some(frame) => recorder.save(frame)?,
            None => recorder.save(&blank_frame(session.config(), session.mode()))?,
        };

        if timing == Timing::RealTime {
            if let Some(rest) = frame_interval.checked_sub(tick_started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }

    session.shutdown();
    info!(
        frames = recorder.frames_written(),
        elapsed_secs = started.elapsed().as_secs_f32(),
        "done"
    );
    Ok(())
}
