//! Error types shared by the capture, configuration and image layers.
//!
//! Feature extraction and the per-frame visual updates never fail for
//! data-shape reasons; only host-level problems (devices, files, config)
//! surface here.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the visynth library
#[derive(Debug, Error)]
pub enum VisynthError {
    /// No capture device, or the host refused access to it
    #[error("audio capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Audio file could not be opened or decoded
    #[error("failed to decode audio file {path:?}: {source}")]
    AudioDecode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// Procedural synth engine rejected its composition
    #[error("synth engine error: {0}")]
    Synth(String),

    /// A configuration value is outside its documented range
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Strict parsing of a dithering algorithm tag failed
    #[error("unknown dithering algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// A colour string was not `#rgb` or `#rrggbb`
    #[error("invalid hex colour '{0}'")]
    InvalidColor(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VisynthError>;
