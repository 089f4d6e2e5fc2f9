//! The reader interface: an abstract source of frames by ordinal.
//!
//! Decoding itself lives outside this crate; anything that can produce
//! frames (a media decoder, a timeline compositor, a synthetic
//! generator) implements [`FrameReader`]. Readers are shared between
//! the consumer thread and the prefetch worker, so the trait takes
//! `&self` and implementations guard their own state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ReelError, Result};
use crate::frame::{AudioBlock, ImageBuffer, SharedFrame, VideoFrame};
use crate::profile::Fraction;

/// Descriptor for an open reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Fraction,
    pub sample_rate: u32,
    pub channels: u32,
    /// Total number of frames, 1-based inclusive.
    pub video_length: i64,
    /// True for still-image sources that return the same frame for
    /// every ordinal.
    pub has_single_image: bool,
    /// Free-form stream metadata (spherical tags live here).
    pub metadata: HashMap<String, String>,
}

impl Default for ReaderInfo {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: Fraction::new(30, 1),
            sample_rate: 48_000,
            channels: 2,
            video_length: 0,
            has_single_image: false,
            metadata: HashMap::new(),
        }
    }
}

/// Abstract source of frames by ordinal with an open/close lifecycle.
pub trait FrameReader: Send + Sync {
    /// Open the reader. Idempotent.
    fn open(&self) -> Result<()>;

    /// Close the reader and release its resources. Idempotent.
    fn close(&self);

    fn is_open(&self) -> bool;

    /// Stream descriptor. Valid once opened.
    fn info(&self) -> ReaderInfo;

    /// Produce the frame with the given ordinal (1-based).
    ///
    /// Returns [`ReelError::OutOfBoundsFrame`] past the end and
    /// [`ReelError::ReaderNotOpen`] when closed.
    fn frame(&self, number: i64) -> Result<SharedFrame>;
}

/// Synthetic reader producing deterministic test-pattern frames.
///
/// Every frame's top-left pixel encodes its ordinal in the red channel
/// (`number % 256`), which makes ordering assertions cheap in tests.
pub struct PatternReader {
    info: ReaderInfo,
    open: parking_lot::Mutex<bool>,
    with_audio: bool,
}

impl PatternReader {
    pub fn new(width: u32, height: u32, fps: Fraction, video_length: i64) -> Self {
        Self {
            info: ReaderInfo {
                width,
                height,
                fps,
                video_length,
                ..ReaderInfo::default()
            },
            open: parking_lot::Mutex::new(false),
            with_audio: false,
        }
    }

    /// Attach a silent audio block to every frame.
    pub fn with_audio(mut self) -> Self {
        self.with_audio = true;
        self
    }

    /// Add a metadata tag to the descriptor.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.info.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

impl FrameReader for PatternReader {
    fn open(&self) -> Result<()> {
        *self.open.lock() = true;
        Ok(())
    }

    fn close(&self) {
        *self.open.lock() = false;
    }

    fn is_open(&self) -> bool {
        *self.open.lock()
    }

    fn info(&self) -> ReaderInfo {
        self.info.clone()
    }

    fn frame(&self, number: i64) -> Result<SharedFrame> {
        if !self.is_open() {
            return Err(ReelError::ReaderNotOpen("pattern reader".to_string()));
        }
        if number < 1 || number > self.info.video_length {
            return Err(ReelError::OutOfBoundsFrame {
                frame: number,
                max: self.info.video_length,
            });
        }

        let mut image = ImageBuffer::test_pattern(self.info.width, self.info.height);
        image.set_pixel(0, 0, [(number % 256) as u8, 0, 0, 255]);

        let audio = self.with_audio.then(|| {
            let per_frame = (self.info.sample_rate as f64 * self.info.channels as f64
                / self.info.fps.to_f64())
            .round() as usize;
            AudioBlock {
                sample_rate: self.info.sample_rate,
                channels: self.info.channels,
                samples: vec![0.0; per_frame],
            }
        });

        Ok(Arc::new(VideoFrame {
            number,
            image,
            audio,
        }))
    }
}
