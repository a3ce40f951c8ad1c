//! Fixed-cadence capture thread.
//!
//! Every `update_interval_ms` the thread pulls the audio that played since
//! the last tick, analyses the most recent window and publishes a fresh
//! [`SpectrumFrame`]. Consumers either poll [`SharedSpectrum`] from the
//! render loop or register an `on_audio_data` callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::analyser::SpectrumAnalyser;
use super::source::{AudioInput, ClipSource, Microphone, SampleSource, SynthSource};
use crate::error::Result;
use crate::features::FrequencyBuffer;
use crate::params::CaptureConfig;

/// One published analyser snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    pub buffer: FrequencyBuffer,
    /// Playback position of the source when the frame was taken (seconds)
    pub position_secs: f64,
}

/// Callback invoked on the capture thread with each new frame
pub type AudioCallback = Box<dyn FnMut(&SpectrumFrame) + Send>;

/// Latest frame, shared between the capture thread and readers
#[derive(Clone, Default)]
pub struct SharedSpectrum {
    latest: Arc<Mutex<Option<SpectrumFrame>>>,
}

impl SharedSpectrum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: SpectrumFrame) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    /// Snapshot of the latest frame (None until the first tick)
    pub fn latest(&self) -> Option<SpectrumFrame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Source plus analyser, advanced by wall-clock or simulated time
pub struct AudioPipeline {
    source: Box<dyn SampleSource>,
    analyser: SpectrumAnalyser,
    history: Vec<f32>,
    /// Fractional sample periods carried between ticks
    owed: f64,
}

impl AudioPipeline {
    pub fn new(source: Box<dyn SampleSource>, config: CaptureConfig) -> Self {
        Self {
            source,
            history: Vec::with_capacity(config.fft_size * 2),
            analyser: SpectrumAnalyser::new(config),
            owed: 0.0,
        }
    }

    /// Open the source behind `input` with analyser settings tuned for it
    ///
    /// The microphone handle must outlive the pipeline; dropping it closes
    /// the device.
    pub fn open(input: &AudioInput, base: &CaptureConfig) -> Result<(Self, Option<Microphone>)> {
        let config = input.capture_config(base);
        config.validate()?;

        let (source, microphone): (Box<dyn SampleSource>, Option<Microphone>) = match input {
            AudioInput::File(path) => (Box::new(ClipSource::open(path)?), None),
            AudioInput::Synth => (Box::new(SynthSource::new(config.synth_sample_rate_hz)?), None),
            AudioInput::Microphone => {
                let mic = Microphone::open()?;
                (Box::new(mic.tap()), Some(mic))
            }
        };
        Ok((Self::new(source, config), microphone))
    }

    pub fn config(&self) -> &CaptureConfig {
        self.analyser.config()
    }

    pub fn position_secs(&self) -> f64 {
        self.source.position_secs()
    }

    /// Pull `elapsed` worth of audio and analyse the latest window
    pub fn advance(&mut self, elapsed: Duration) -> SpectrumFrame {
        self.owed += elapsed.as_secs_f64() * self.source.sample_rate() as f64;
        let frames = self.owed.floor() as usize;
        self.owed -= frames as f64;

        self.source.pull(frames, &mut self.history);
        let window = self.analyser.config().fft_size;
        if self.history.len() > window {
            let excess = self.history.len() - window;
            self.history.drain(..excess);
        }

        SpectrumFrame {
            buffer: self.analyser.analyse(&self.history),
            position_secs: self.source.position_secs(),
        }
    }
}

/// Running capture: a thread publishing frames until stopped or dropped
pub struct AudioCapture {
    spectrum: SharedSpectrum,
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    /// Held so the input device stays open while capturing
    microphone: Option<Microphone>,
    label: String,
}

impl AudioCapture {
    /// Open `input` and start capturing
    ///
    /// Only the microphone can fail for host reasons; that failure is
    /// returned as-is and nothing is left running.
    pub fn open(
        input: &AudioInput,
        base: &CaptureConfig,
        on_audio_data: Option<AudioCallback>,
    ) -> Result<Self> {
        let (pipeline, microphone) = AudioPipeline::open(input, base)?;
        let interval = Duration::from_millis(pipeline.config().update_interval_ms);
        let mut capture = Self::spawn(pipeline, interval, on_audio_data);
        capture.microphone = microphone;
        capture.label = input.to_string();
        Ok(capture)
    }

    /// Run `pipeline` on a new thread, ticking every `interval`
    pub fn spawn(
        mut pipeline: AudioPipeline,
        interval: Duration,
        mut on_audio_data: Option<AudioCallback>,
    ) -> Self {
        let spectrum = SharedSpectrum::new();
        let stop = Arc::new(AtomicBool::new(false));

        let thread_spectrum = spectrum.clone();
        let thread_stop = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            let mut last = Instant::now();
            loop {
                thread::sleep(interval);
                if thread_stop.load(Ordering::Acquire) {
                    break;
                }
                let now = Instant::now();
                let frame = pipeline.advance(now - last);
                last = now;

                thread_spectrum.publish(frame.clone());
                if let Some(callback) = on_audio_data.as_mut() {
                    callback(&frame);
                }
            }
            debug!("capture thread exiting");
        });

        Self {
            spectrum,
            stop,
            thread: Some(thread),
            microphone: None,
            label: "custom".to_string(),
        }
    }

    /// Reader handle for the render loop
    pub fn spectrum(&self) -> SharedSpectrum {
        self.spectrum.clone()
    }

    pub fn latest(&self) -> Option<SpectrumFrame> {
        self.spectrum.latest()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop the thread and release the input device; idempotent
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
            info!(source = %self.label, "capture stopped");
        }
        self.microphone = None;
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
