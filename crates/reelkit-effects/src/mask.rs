//! Alpha wipe: a grayscale mask image modulates frame opacity.
//!
//! A secondary reader supplies the mask; brightening the mask over
//! time wipes the frame in or out, which is how transition curves are
//! rendered. The mask's alpha minus its (brightness/contrast adjusted)
//! gray level becomes the per-pixel opacity factor.

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use reelkit_core::frame::BYTES_PER_PIXEL;
use reelkit_core::{FrameReader, ImageBuffer, Keyframe, VideoFrame};

use crate::Effect;

/// Where the mask pixels come from, as persisted in project JSON.
/// Hosts resolve a source into a concrete reader and inject it with
/// [`Mask::set_reader`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaskSource {
    #[default]
    None,
    Image {
        path: String,
    },
    Video {
        path: String,
    },
}

/// Alpha mask / wipe effect.
#[derive(Serialize, Deserialize)]
pub struct Mask {
    /// Added to the mask gray level, in [-1, 1] of full scale.
    pub brightness: Keyframe,
    /// Contrast around mid-gray, 0–20.
    pub contrast: Keyframe,
    /// Write the wipe level into all four channels instead of
    /// modulating the existing pixels.
    pub replace_image: bool,
    pub source: MaskSource,

    #[serde(skip)]
    reader: Option<Arc<dyn FrameReader>>,
    /// Mask image resized to the last target size. The mutex also
    /// makes opening the mask reader mutually exclusive.
    #[serde(skip)]
    cached_mask: Mutex<Option<ImageBuffer>>,
}

impl Default for Mask {
    fn default() -> Self {
        Self {
            brightness: Keyframe::constant(0.0),
            contrast: Keyframe::constant(0.0),
            replace_image: false,
            source: MaskSource::None,
            reader: None,
            cached_mask: Mutex::new(None),
        }
    }
}

impl Clone for Mask {
    fn clone(&self) -> Self {
        Self {
            brightness: self.brightness.clone(),
            contrast: self.contrast.clone(),
            replace_image: self.replace_image,
            source: self.source.clone(),
            reader: self.reader.clone(),
            cached_mask: Mutex::new(self.cached_mask.lock().clone()),
        }
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mask")
            .field("replace_image", &self.replace_image)
            .field("source", &self.source)
            .field("has_reader", &self.reader.is_some())
            .finish()
    }
}

impl Mask {
    pub fn new(reader: Arc<dyn FrameReader>, brightness: Keyframe, contrast: Keyframe) -> Self {
        Self {
            brightness,
            contrast,
            reader: Some(reader),
            ..Self::default()
        }
    }

    /// Inject the reader resolved from [`Mask::source`].
    pub fn set_reader(&mut self, reader: Arc<dyn FrameReader>) {
        self.reader = Some(reader);
        self.cached_mask.lock().take();
    }

    /// Drop derived state after deserialisation or a source change.
    pub fn refresh(&mut self) {
        self.cached_mask.lock().take();
    }

    /// Fetch the mask image for `frame_number`, resized to the target
    /// size. Returns `None` (leaving the frame untouched) when no
    /// reader is attached or the mask cannot be read.
    fn mask_image(&self, frame_number: i64, width: u32, height: u32) -> Option<ImageBuffer> {
        let reader = self.reader.as_ref()?;

        // Lock covers open + fetch: mask reader opens are mutually
        // exclusive, and the cached image stays consistent.
        let mut cached = self.cached_mask.lock();

        if !reader.is_open() {
            if let Err(err) = reader.open() {
                warn!(%err, "mask reader failed to open");
                return None;
            }
        }

        let reusable = reader.info().has_single_image
            && cached
                .as_ref()
                .is_some_and(|m| m.width() == width && m.height() == height);
        if !reusable {
            let mask_frame = match reader.frame(frame_number) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(frame = frame_number, %err, "mask frame unavailable");
                    return None;
                }
            };
            let image = &mask_frame.image;
            let resized = if image.width() == width && image.height() == height {
                image.clone()
            } else {
                image.scaled_bilinear(width, height)
            };
            *cached = Some(resized);
        }

        cached.clone()
    }
}

/// Integer luminance matching the classic (11R + 16G + 5B) / 32 form.
#[inline]
fn gray_of(r: i32, g: i32, b: i32) -> i32 {
    (r * 11 + g * 16 + b * 5) / 32
}

impl Effect for Mask {
    fn name(&self) -> &'static str {
        "Mask"
    }

    fn apply(&self, mut frame: VideoFrame, frame_number: i64) -> VideoFrame {
        let width = frame.image.width();
        let height = frame.image.height();
        let Some(mask) = self.mask_image(frame_number, width, height) else {
            return frame;
        };

        let contrast_value = self.contrast.value(frame_number);
        let brightness_value = self.brightness.value(frame_number);

        let brightness_adj = (255.0 * brightness_value) as i32;
        let contrast_factor = 20.0 / (20.0 - contrast_value).max(0.000_01);
        let replace = self.replace_image;

        let stride = width as usize * BYTES_PER_PIXEL;
        frame
            .image
            .data_mut()
            .par_chunks_mut(stride)
            .zip(mask.data().par_chunks(stride))
            .for_each(|(row, mask_row)| {
                for (px, mp) in row
                    .chunks_exact_mut(BYTES_PER_PIXEL)
                    .zip(mask_row.chunks_exact(BYTES_PER_PIXEL))
                {
                    let mut gray = gray_of(mp[0] as i32, mp[1] as i32, mp[2] as i32);
                    gray += brightness_adj;
                    gray = (contrast_factor * (gray - 128) as f64 + 128.0) as i32;

                    let diff = (mp[3] as i32 - gray).clamp(0, 255);
                    let alpha_percent = diff as f32 / 255.0;

                    if replace {
                        let v = diff as u8;
                        px.copy_from_slice(&[v, v, v, v]);
                    } else {
                        // Pre-multiplied RGBA: scale all four channels
                        for c in 0..4 {
                            px[c] = (px[c] as f32 * alpha_percent) as u8;
                        }
                    }
                }
            });

        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelkit_core::{Fraction, ReaderInfo, ReelError, Result, SharedFrame};

    /// Mask reader producing a single solid RGBA image.
    struct SolidMaskReader {
        info: ReaderInfo,
        rgba: [u8; 4],
        open: Mutex<bool>,
    }

    impl SolidMaskReader {
        fn new(width: u32, height: u32, rgba: [u8; 4]) -> Arc<Self> {
            Arc::new(Self {
                info: ReaderInfo {
                    width,
                    height,
                    fps: Fraction::new(30, 1),
                    video_length: i64::MAX,
                    has_single_image: true,
                    ..ReaderInfo::default()
                },
                rgba,
                open: Mutex::new(false),
            })
        }
    }

    impl FrameReader for SolidMaskReader {
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
                return Err(ReelError::ReaderNotOpen("solid mask".to_string()));
            }
            let mut frame = VideoFrame::new(number, self.info.width, self.info.height);
            frame.image = ImageBuffer::filled(self.info.width, self.info.height, self.rgba);
            Ok(Arc::new(frame))
        }
    }

    fn target_frame() -> VideoFrame {
        let mut frame = VideoFrame::new(1, 8, 8);
        frame.image = ImageBuffer::filled(8, 8, [100, 150, 200, 255]);
        frame
    }

    #[test]
    fn test_no_reader_is_identity() {
        let mask = Mask::default();
        let out = mask.apply(target_frame(), 1);
        assert_eq!(out.image.pixel_clamped(0, 0), [100, 150, 200, 255]);
    }

    #[test]
    fn test_black_opaque_mask_keeps_frame() {
        // gray = 0, diff = 255 → alpha factor 1.0
        let reader = SolidMaskReader::new(8, 8, [0, 0, 0, 255]);
        let mask = Mask::new(reader, Keyframe::constant(0.0), Keyframe::constant(0.0));
        let out = mask.apply(target_frame(), 1);
        assert_eq!(out.image.pixel_clamped(3, 3), [100, 150, 200, 255]);
    }

    #[test]
    fn test_white_mask_clears_frame() {
        // gray = 255, diff = 0 → alpha factor 0.0
        let reader = SolidMaskReader::new(8, 8, [255, 255, 255, 255]);
        let mask = Mask::new(reader, Keyframe::constant(0.0), Keyframe::constant(0.0));
        let out = mask.apply(target_frame(), 1);
        assert_eq!(out.image.pixel_clamped(3, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn test_mid_gray_mask_halves_alpha() {
        // gray ≈ 127, diff ≈ 128 → alpha factor ≈ 0.5
        let reader = SolidMaskReader::new(8, 8, [127, 127, 127, 255]);
        let mask = Mask::new(reader, Keyframe::constant(0.0), Keyframe::constant(0.0));
        let out = mask.apply(target_frame(), 1);
        let px = out.image.pixel_clamped(3, 3);
        assert!((px[3] as i32 - 128).abs() <= 2, "alpha was {}", px[3]);
        assert!((px[0] as i32 - 50).abs() <= 2);
    }

    #[test]
    fn test_brightness_wipes_out() {
        // Full positive brightness pushes gray past alpha everywhere
        let reader = SolidMaskReader::new(8, 8, [0, 0, 0, 255]);
        let mask = Mask::new(reader, Keyframe::constant(1.0), Keyframe::constant(0.0));
        let out = mask.apply(target_frame(), 1);
        assert_eq!(out.image.pixel_clamped(3, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn test_replace_image_writes_wipe_level() {
        let reader = SolidMaskReader::new(8, 8, [0, 0, 0, 255]);
        let mut mask = Mask::new(reader, Keyframe::constant(0.0), Keyframe::constant(0.0));
        mask.replace_image = true;
        let out = mask.apply(target_frame(), 1);
        assert_eq!(out.image.pixel_clamped(3, 3), [255, 255, 255, 255]);
    }

    #[test]
    fn test_mask_resized_to_target() {
        // Mask half the size of the target still applies cleanly
        let reader = SolidMaskReader::new(4, 4, [255, 255, 255, 255]);
        let mask = Mask::new(reader, Keyframe::constant(0.0), Keyframe::constant(0.0));
        let out = mask.apply(target_frame(), 1);
        assert_eq!(out.image.pixel_clamped(7, 7), [0, 0, 0, 0]);
    }

    #[test]
    fn test_contrast_transfer() {
        // contrast 10 → factor 2: gray 100 → (100-128)*2+128 = 72
        let reader = SolidMaskReader::new(8, 8, [100, 100, 100, 255]);
        let mask = Mask::new(reader, Keyframe::constant(0.0), Keyframe::constant(10.0));
        let out = mask.apply(target_frame(), 1);
        // diff = 255 - 72 = 183 → alpha ≈ 0.718
        let px = out.image.pixel_clamped(3, 3);
        assert!((px[3] as i32 - 183).abs() <= 1, "alpha was {}", px[3]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut mask = Mask::default();
        mask.replace_image = true;
        mask.source = MaskSource::Image {
            path: "wipe.png".to_string(),
        };
        mask.brightness
            .set(10, 0.5, reelkit_core::Interpolation::Linear);
        let json = serde_json::to_value(&mask).unwrap();
        let back: Mask = serde_json::from_value(json).unwrap();
        assert_eq!(back.replace_image, mask.replace_image);
        assert_eq!(back.source, mask.source);
        assert_eq!(back.brightness.value(10), mask.brightness.value(10));
    }
}
