//! Audio capture: sources, spectrum analysis and the capture thread.
//!
//! A capture turns one [`AudioInput`] into a ~30 Hz stream of
//! [`SpectrumFrame`]s (1024 byte-valued bins plus playback position).

mod analyser;
mod capture;
mod source;
mod synthesis;

pub use analyser::SpectrumAnalyser;
pub use capture::{AudioCallback, AudioCapture, AudioPipeline, SharedSpectrum, SpectrumFrame};
pub use source::{AudioInput, ClipSource, LiveTap, Microphone, SampleSource, SynthSource};
pub use synthesis::{build_engine, GLICOL_COMPOSITION};
