use crate::{event, info, warn};
use async_trait::async_trait;
use futures::{FutureExt, future::BoxFuture};
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Cursor, Write},
    path::{Path, PathBuf},
};
use strum_macros::Display;
use tokio::{sync::mpsc, task::JoinHandle};

/// Pixel layout of the frames handed to a recorder.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Display, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
}

/// Parameters fixed for the whole duration of one recording.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct VideoSpec {
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Encoder quality in `1..=100`, applied by the compression pass.
    pub quality: u8,
    /// Whether `end_video` triggers a compression pass.
    pub compress: bool,
}

#[derive(Debug, Display)]
pub enum RecorderError {
    AlreadyRecording,
    NotRecording,
    EncoderGone,
    Io(std::io::Error),
    Encode(String),
}

impl std::error::Error for RecorderError {}

impl From<std::io::Error> for RecorderError {
    fn from(value: std::io::Error) -> Self { RecorderError::Io(value) }
}

impl From<bincode::error::EncodeError> for RecorderError {
    fn from(value: bincode::error::EncodeError) -> Self { RecorderError::Encode(value.to_string()) }
}

impl From<bincode::error::DecodeError> for RecorderError {
    fn from(value: bincode::error::DecodeError) -> Self { RecorderError::Encode(value.to_string()) }
}

impl From<image::ImageError> for RecorderError {
    fn from(value: image::ImageError) -> Self { RecorderError::Encode(value.to_string()) }
}

impl From<tokio::task::JoinError> for RecorderError {
    fn from(value: tokio::task::JoinError) -> Self { RecorderError::Encode(value.to_string()) }
}

/// Background compression started by [`Recorder::end_video`], resolving to the output path.
pub type CompressionTask = BoxFuture<'static, Result<PathBuf, RecorderError>>;

/// Sink for the frames of a recording.
///
/// `add_frame` must never block the caller; encoding happens elsewhere.
#[async_trait]
pub trait Recorder: Send {
    async fn start_video(&mut self, path: &Path, spec: VideoSpec) -> Result<(), RecorderError>;

    /// Takes ownership of a frame copy that belongs to the recording from now on.
    fn add_frame(&mut self, frame: RgbImage) -> Result<(), RecorderError>;

    /// Drains all queued frames and closes the output file.
    ///
    /// # Returns
    /// The pending compression pass if the recording asked for one.
    async fn end_video(&mut self) -> Result<Option<CompressionTask>, RecorderError>;

    fn is_recording(&self) -> bool;
}

#[derive(Serialize, Deserialize)]
struct DumpHeader {
    magic: [u8; 4],
    spec: VideoSpec,
}

#[derive(Serialize, Deserialize)]
struct DumpFrame {
    data: Vec<u8>,
}

struct ActiveRecording {
    path: PathBuf,
    spec: VideoSpec,
    frame_tx: mpsc::UnboundedSender<RgbImage>,
    encode_task: JoinHandle<Result<u64, RecorderError>>,
}

/// Writes frames as an uncompressed dump and optionally transcodes it to JPEG frames.
///
/// Both files start with a [`VideoSpec`] header followed by a stream of `Some(frame)` entries
/// closed by a single `None`.
#[derive(Default)]
pub struct FrameDumpRecorder {
    active: Option<ActiveRecording>,
}

impl FrameDumpRecorder {
    const RAW_MAGIC: [u8; 4] = *b"HDRW";
    const JPEG_MAGIC: [u8; 4] = *b"HDJP";
    pub const COMPRESSED_EXTENSION: &str = "mjpg";

    pub fn new() -> Self { Self::default() }

    fn encode_loop(
        file: File,
        spec: VideoSpec,
        mut frame_rx: mpsc::UnboundedReceiver<RgbImage>,
    ) -> Result<u64, RecorderError> {
        let config = bincode::config::standard();
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(
            &DumpHeader { magic: Self::RAW_MAGIC, spec },
            &mut writer,
            config,
        )?;
        let mut written = 0u64;
        let mut skipped = 0u64;
        while let Some(frame) = frame_rx.blocking_recv() {
            if frame.dimensions() != (spec.width, spec.height) {
                skipped += 1;
                continue;
            }
            let entry = Some(DumpFrame { data: frame.into_raw() });
            bincode::serde::encode_into_std_write(&entry, &mut writer, config)?;
            written += 1;
        }
        bincode::serde::encode_into_std_write(&None::<DumpFrame>, &mut writer, config)?;
        writer.flush()?;
        if skipped > 0 {
            warn!("Skipped {skipped} frames not matching {}x{}.", spec.width, spec.height);
        }
        Ok(written)
    }

    /// Opens a dump and checks that it carries `magic`.
    fn open_dump(
        path: &Path,
        magic: [u8; 4],
    ) -> Result<(VideoSpec, BufReader<File>), RecorderError> {
        let mut reader = BufReader::new(File::open(path)?);
        let header: DumpHeader =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        if header.magic != magic {
            return Err(RecorderError::Encode(format!(
                "{} does not start with {}",
                path.display(),
                String::from_utf8_lossy(&magic)
            )));
        }
        Ok((header.spec, reader))
    }

    fn next_entry(reader: &mut BufReader<File>) -> Result<Option<DumpFrame>, RecorderError> {
        Ok(bincode::serde::decode_from_std_read(reader, bincode::config::standard())?)
    }

    /// Reads an uncompressed dump back into its [`VideoSpec`] and frames.
    pub fn read_dump(path: &Path) -> Result<(VideoSpec, Vec<RgbImage>), RecorderError> {
        let (spec, mut reader) = Self::open_dump(path, Self::RAW_MAGIC)?;
        let mut frames = Vec::new();
        while let Some(entry) = Self::next_entry(&mut reader)? {
            frames.push(Self::raw_frame(spec, entry)?);
        }
        Ok((spec, frames))
    }

    fn raw_frame(spec: VideoSpec, entry: DumpFrame) -> Result<RgbImage, RecorderError> {
        RgbImage::from_raw(spec.width, spec.height, entry.data)
            .ok_or_else(|| RecorderError::Encode("truncated frame".to_string()))
    }

    /// Re-encodes the dump at `raw_path` as JPEG frames and removes the dump.
    ///
    /// Frames are read, encoded and written one at a time. On failure the partial output is
    /// removed and the dump is kept.
    pub(super) fn transcode(raw_path: &Path) -> Result<PathBuf, RecorderError> {
        let (spec, mut reader) = Self::open_dump(raw_path, Self::RAW_MAGIC)?;
        let out_path = raw_path.with_extension(Self::COMPRESSED_EXTENSION);
        let config = bincode::config::standard();
        let result = (|| -> Result<u64, RecorderError> {
            let mut writer = BufWriter::new(File::create(&out_path)?);
            bincode::serde::encode_into_std_write(
                &DumpHeader { magic: Self::JPEG_MAGIC, spec },
                &mut writer,
                config,
            )?;
            let mut written = 0u64;
            while let Some(entry) = Self::next_entry(&mut reader)? {
                let frame = Self::raw_frame(spec, entry)?;
                let mut cursor = Cursor::new(Vec::<u8>::new());
                frame.write_with_encoder(JpegEncoder::new_with_quality(&mut cursor, spec.quality))?;
                let entry = Some(DumpFrame { data: cursor.into_inner() });
                bincode::serde::encode_into_std_write(&entry, &mut writer, config)?;
                written += 1;
            }
            bincode::serde::encode_into_std_write(&None::<DumpFrame>, &mut writer, config)?;
            writer.flush()?;
            Ok(written)
        })();
        match result {
            Ok(written) => event!("Compressed {written} frames to {}.", out_path.display()),
            Err(e) => {
                let _ = std::fs::remove_file(&out_path);
                return Err(e);
            }
        }
        std::fs::remove_file(raw_path)?;
        Ok(out_path)
    }

    /// Counts the JPEG frames of a compressed recording.
    pub fn count_compressed_frames(path: &Path) -> Result<usize, RecorderError> {
        let (_, mut reader) = Self::open_dump(path, Self::JPEG_MAGIC)?;
        let mut count = 0;
        while Self::next_entry(&mut reader)?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

#[async_trait]
impl Recorder for FrameDumpRecorder {
    async fn start_video(&mut self, path: &Path, spec: VideoSpec) -> Result<(), RecorderError> {
        if self.active.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }
        let file = tokio::fs::File::create(path).await?.into_std().await;
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let encode_task =
            tokio::task::spawn_blocking(move || Self::encode_loop(file, spec, frame_rx));
        info!(
            "Recording {}x{} @ {} fps to {}.",
            spec.width,
            spec.height,
            spec.frame_rate,
            path.display()
        );
        self.active =
            Some(ActiveRecording { path: path.to_path_buf(), spec, frame_tx, encode_task });
        Ok(())
    }

    fn add_frame(&mut self, frame: RgbImage) -> Result<(), RecorderError> {
        let active = self.active.as_ref().ok_or(RecorderError::NotRecording)?;
        active.frame_tx.send(frame).map_err(|_| RecorderError::EncoderGone)
    }

    async fn end_video(&mut self) -> Result<Option<CompressionTask>, RecorderError> {
        let ActiveRecording { path, spec, frame_tx, encode_task } =
            self.active.take().ok_or(RecorderError::NotRecording)?;
        drop(frame_tx);
        let written = encode_task.await??;
        info!("Recording closed with {written} frames at {}.", path.display());
        if !spec.compress {
            return Ok(None);
        }
        event!("Handing {} to the compression pass.", path.display());
        let compression = tokio::task::spawn_blocking(move || Self::transcode(&path));
        Ok(Some(async move { compression.await? }.boxed()))
    }

    fn is_recording(&self) -> bool { self.active.is_some() }
}
