use super::{
    canvas::HudCanvas, overlay::HudLayout, recorder::Recorder, recorder::RecorderError,
    vec2d::Vec2D,
};
use crate::flight_control::TelemetrySnapshot;
use chrono::{DateTime, Utc};
use image::{DynamicImage, Rgba, RgbImage, RgbaImage};
use std::{path::Path, sync::Arc};
use strum_macros::Display;

/// Frame-rate estimate smoothed with a single-pole IIR filter (factor 0.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRateAccumulator {
    frames_since_last_sample: u32,
    last_sample: DateTime<Utc>,
    smoothed_rate: u32,
}

impl FrameRateAccumulator {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { frames_since_last_sample: 0, last_sample: now, smoothed_rate: 0 }
    }

    pub fn reset(&mut self, now: DateTime<Utc>) { *self = Self::new(now); }

    pub fn count_frame(&mut self) {
        self.frames_since_last_sample = self.frames_since_last_sample.saturating_add(1);
    }

    /// Folds the frames counted since the last sample into the estimate.
    ///
    /// A sample taken in the same millisecond as the previous one carries no information and
    /// leaves the estimate, counter and timestamp as they are.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample(&mut self, now: DateTime<Utc>) -> u32 {
        let elapsed_ms = (now - self.last_sample).num_milliseconds();
        if elapsed_ms <= 0 {
            return self.smoothed_rate;
        }
        let observed = (u64::from(self.frames_since_last_sample) * 1000 / elapsed_ms as u64) as u32;
        self.smoothed_rate = ((u64::from(self.smoothed_rate) + u64::from(observed)) / 2) as u32;
        self.frames_since_last_sample = 0;
        self.last_sample = now;
        self.smoothed_rate
    }

    pub fn smoothed_rate(&self) -> u32 { self.smoothed_rate }

    pub fn frames_since_last_sample(&self) -> u32 { self.frames_since_last_sample }
}

#[derive(Debug, Display)]
pub enum SnapshotError {
    NothingRendered,
    Io(std::io::Error),
    Encode(image::ImageError),
}

impl std::error::Error for SnapshotError {}

/// Merges the latest raw video frame with the instrument overlay.
///
/// Frame ingestion and rendering are independent: frames may arrive faster or slower than
/// [`FrameCompositor::compose`] is called, and composing always uses whatever arrived last.
pub struct FrameCompositor {
    latest_frame: Option<Arc<RgbImage>>,
    displayed: Option<RgbaImage>,
    layout: HudLayout,
    fps: FrameRateAccumulator,
    frames_total: u64,
}

impl FrameCompositor {
    const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

    /// Creates a compositor that draws on a `hud_size` surface until the first frame arrives.
    pub fn new(hud_size: Vec2D<u32>, now: DateTime<Utc>) -> Self {
        Self {
            latest_frame: None,
            displayed: None,
            layout: HudLayout::for_size(hud_size),
            fps: FrameRateAccumulator::new(now),
            frames_total: 0,
        }
    }

    /// Registers a freshly decoded frame.
    ///
    /// When a recorder is passed, it receives its own copy of the frame; `frame` itself stays
    /// shared with the video source.
    pub fn ingest_frame(
        &mut self,
        frame: Arc<RgbImage>,
        recorder: Option<&mut dyn Recorder>,
    ) -> Result<(), RecorderError> {
        self.fps.count_frame();
        self.frames_total += 1;
        let result = match recorder {
            Some(rec) => rec.add_frame(frame.as_ref().clone()),
            None => Ok(()),
        };
        self.latest_frame = Some(frame);
        result
    }

    /// Re-renders the displayed image from the latest frame and `snapshot`.
    pub fn compose(&mut self, snapshot: &TelemetrySnapshot) -> &RgbaImage {
        let mut surface = match &self.latest_frame {
            Some(frame) => DynamicImage::ImageRgb8(frame.as_ref().clone()).into_rgba8(),
            None => {
                let size = self.layout.size();
                RgbaImage::from_pixel(size.x(), size.y(), Self::BACKGROUND)
            }
        };
        let surface_size = HudCanvas::size(&surface);
        if surface_size != self.layout.size() {
            self.layout = HudLayout::for_size(surface_size);
        }
        self.layout.render(&mut surface, snapshot);
        self.displayed.insert(surface)
    }

    /// Takes a frame-rate sample, see [`FrameRateAccumulator::sample`].
    pub fn sample_frame_rate(&mut self, now: DateTime<Utc>) -> u32 { self.fps.sample(now) }

    pub fn reset_frame_rate(&mut self, now: DateTime<Utc>) { self.fps.reset(now); }

    pub fn frame_rate(&self) -> u32 { self.fps.smoothed_rate() }

    pub fn frames_total(&self) -> u64 { self.frames_total }

    pub fn displayed(&self) -> Option<&RgbaImage> { self.displayed.as_ref() }

    /// Dimensions of the latest raw frame, if any arrived yet.
    pub fn frame_size(&self) -> Option<Vec2D<u32>> {
        self.latest_frame.as_ref().map(|f| Vec2D::new(f.width(), f.height()))
    }

    /// Writes the displayed image to `path`, format chosen by extension.
    ///
    /// A partially written file is removed on failure.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), SnapshotError> {
        let image = self.displayed.as_ref().ok_or(SnapshotError::NothingRendered)?;
        Self::write_snapshot(image, path)
    }

    /// Blocking encoder behind [`FrameCompositor::save_snapshot`], usable on a copy of the
    /// displayed image from a worker thread.
    pub fn write_snapshot(image: &RgbaImage, path: &Path) -> Result<(), SnapshotError> {
        if let Err(e) = image.save(path) {
            let _ = std::fs::remove_file(path);
            return Err(match e {
                image::ImageError::IoError(io) => SnapshotError::Io(io),
                other => SnapshotError::Encode(other),
            });
        }
        Ok(())
    }
}
