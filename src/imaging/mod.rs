//! This module provides the video side of the ground station: the instrument overlay, the
//! compositor merging it with incoming frames, and the video source and recorder seams.

mod canvas;
mod frame_compositor;
mod instrument;
mod overlay;
mod recorder;
mod vec2d;
mod video_source;


pub use frame_compositor::{FrameCompositor, FrameRateAccumulator, SnapshotError};
pub use instrument::{InstrumentDefinition, InstrumentKind, WrapPolicy};
pub use recorder::{
    CompressionTask, FrameDumpRecorder, PixelFormat, Recorder, RecorderError, VideoSpec,
};
pub use vec2d::Vec2D;
pub use video_source::{CameraChannel, SyntheticVideoSource, VideoSource};
