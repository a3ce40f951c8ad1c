//! CPU render surfaces: point-cloud splatting, fish bodies, PNG frames.
//!
//! Every renderer writes into an [`image::RgbaImage`]; frames can be shown
//! by a host or written to disk with [`FrameRecorder`].

mod points;
mod recorder;
mod school;

pub use points::{PointCloudRenderer, SANDBALL_COLOR, SANDBALL_OPACITY};
pub use recorder::FrameRecorder;
pub use school::{fish_outline, SchoolRenderer};
