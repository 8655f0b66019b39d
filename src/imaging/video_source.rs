use super::vec2d::Vec2D;
use crate::info;
use image::{Rgb, RgbImage};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use strum_macros::Display;
use tokio::sync::watch;

/// Camera whose stream the aircraft currently sends.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum CameraChannel {
    Front,
    Bottom,
}

/// Decoded video stream of the aircraft.
///
/// The latest frame is published through a watch channel; it is `None` until the first frame
/// has been decoded. Frames are shared and must not be mutated by consumers.
pub trait VideoSource: Send + Sync {
    fn frames(&self) -> watch::Receiver<Option<Arc<RgbImage>>>;

    /// Requests the other camera. The stream follows on a later frame, not immediately.
    fn switch_camera(&self);
}

/// Generates moving test-pattern frames at a fixed rate.
pub struct SyntheticVideoSource {
    frame_rx: watch::Receiver<Option<Arc<RgbImage>>>,
    bottom_camera: Arc<AtomicBool>,
}

impl SyntheticVideoSource {
    const FRAME_INTERVAL: Duration = Duration::from_millis(33);

    pub fn start(size: Vec2D<u32>) -> Arc<Self> {
        let (frame_tx, frame_rx) = watch::channel(None);
        let bottom_camera = Arc::new(AtomicBool::new(false));
        let bottom_camera_local = Arc::clone(&bottom_camera);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Self::FRAME_INTERVAL);
            let mut phase = 0u32;
            loop {
                interval.tick().await;
                let channel = if bottom_camera_local.load(Ordering::Acquire) {
                    CameraChannel::Bottom
                } else {
                    CameraChannel::Front
                };
                let frame = Self::pattern(size, channel, phase);
                if frame_tx.send(Some(Arc::new(frame))).is_err() {
                    break;
                }
                phase = (phase + 3) % size.x().max(1);
            }
        });
        Arc::new(Self { frame_rx, bottom_camera })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn pattern(size: Vec2D<u32>, channel: CameraChannel, phase: u32) -> RgbImage {
        let band = size.x().max(1);
        RgbImage::from_fn(size.x(), size.y(), |x, y| {
            let sweep = ((x + phase) % band * 255 / band) as u8;
            let depth = (y * 255 / size.y().max(1)) as u8;
            match channel {
                CameraChannel::Front => Rgb([sweep / 3, depth / 2, 90]),
                CameraChannel::Bottom => Rgb([70, sweep / 2, depth / 3]),
            }
        })
    }
}

impl VideoSource for SyntheticVideoSource {
    fn frames(&self) -> watch::Receiver<Option<Arc<RgbImage>>> { self.frame_rx.clone() }

    fn switch_camera(&self) {
        let was_bottom = self.bottom_camera.fetch_xor(true, Ordering::AcqRel);
        let now = if was_bottom { CameraChannel::Front } else { CameraChannel::Bottom };
        info!("Requested {now} camera.");
    }
}
