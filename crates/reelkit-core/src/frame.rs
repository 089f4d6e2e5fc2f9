//! Frame types for decoded video in CPU memory.
//!
//! Every image in the runtime is pre-multiplied 8-bit RGBA: the colour
//! channels are already scaled by alpha, and alpha is the authoritative
//! opacity. Effects rely on that invariant and preserve it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bytes per pixel for pre-multiplied RGBA8.
pub const BYTES_PER_PIXEL: usize = 4;

/// A single image plane of pre-multiplied RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageBuffer {
    /// Create a transparent-black image of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    /// Create an image filled with a single pre-multiplied RGBA pixel.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut img = Self::new(width, height);
        for px in img.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
        img
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw pixel bytes, row-major RGBA.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    /// Read one pixel, clamping coordinates to the image edges.
    #[inline]
    pub fn pixel_clamped(&self, x: i64, y: i64) -> [u8; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        let idx = (y * self.width as usize + x) * BYTES_PER_PIXEL;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// Write one pixel. Panics if out of bounds.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.data[idx..idx + 4].copy_from_slice(&rgba);
    }

    /// Total memory used by the pixel data.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Fast rescale with nearest-neighbour sampling.
    pub fn scaled_nearest(&self, width: u32, height: u32) -> Self {
        let mut out = Self::new(width, height);
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return out;
        }
        for y in 0..height {
            let sy = (y as u64 * self.height as u64 / height as u64).min(self.height as u64 - 1);
            let src_row = self.row(sy as u32);
            let dst_row = out.row_mut(y);
            for x in 0..width {
                let sx =
                    (x as u64 * self.width as u64 / width as u64).min(self.width as u64 - 1) as usize;
                let d = x as usize * BYTES_PER_PIXEL;
                dst_row[d..d + 4].copy_from_slice(&src_row[sx * BYTES_PER_PIXEL..sx * BYTES_PER_PIXEL + 4]);
            }
        }
        out
    }

    /// Smooth rescale with bilinear sampling (clamp-to-edge).
    pub fn scaled_bilinear(&self, width: u32, height: u32) -> Self {
        let mut out = Self::new(width, height);
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return out;
        }
        let sx_ratio = self.width as f64 / width as f64;
        let sy_ratio = self.height as f64 / height as f64;
        for y in 0..height {
            let fy = (y as f64 + 0.5) * sy_ratio - 0.5;
            let y0 = fy.floor();
            let dy = fy - y0;
            for x in 0..width {
                let fx = (x as f64 + 0.5) * sx_ratio - 0.5;
                let x0 = fx.floor();
                let dx = fx - x0;
                let p00 = self.pixel_clamped(x0 as i64, y0 as i64);
                let p10 = self.pixel_clamped(x0 as i64 + 1, y0 as i64);
                let p01 = self.pixel_clamped(x0 as i64, y0 as i64 + 1);
                let p11 = self.pixel_clamped(x0 as i64 + 1, y0 as i64 + 1);
                let mut px = [0u8; 4];
                for c in 0..4 {
                    let v0 = p00[c] as f64 * (1.0 - dx) + p10[c] as f64 * dx;
                    let v1 = p01[c] as f64 * (1.0 - dx) + p11[c] as f64 * dx;
                    px[c] = (v0 * (1.0 - dy) + v1 * dy + 0.5).clamp(0.0, 255.0) as u8;
                }
                out.set_pixel(x, y, px);
            }
        }
        out
    }

    /// Create a test pattern image (vertical colour bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let colors: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];
        let mut img = Self::new(width, height);
        for y in 0..height {
            let row = img.row_mut(y);
            for x in 0..width {
                let bar = (x * 8 / width.max(1)).min(7) as usize;
                let i = x as usize * BYTES_PER_PIXEL;
                row[i..i + 4].copy_from_slice(&colors[bar]);
            }
        }
        img
    }
}

/// Interleaved audio samples attached to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBlock {
    pub sample_rate: u32,
    pub channels: u32,
    /// Interleaved f32 samples, `channels` values per sample frame.
    pub samples: Vec<f32>,
}

impl AudioBlock {
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

/// A decoded frame: ordinal number, image, and optional audio payload.
///
/// Frame numbers start at 1. Frames are created by a reader, handed to
/// effects by value, and shared between cache and consumer as
/// `Arc<VideoFrame>` once finalised.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub number: i64,
    pub image: ImageBuffer,
    pub audio: Option<AudioBlock>,
}

impl VideoFrame {
    /// Create a frame with a transparent image and no audio.
    pub fn new(number: i64, width: u32, height: u32) -> Self {
        Self {
            number,
            image: ImageBuffer::new(width, height),
            audio: None,
        }
    }

    /// Approximate bytes held by this frame (image + audio).
    pub fn memory_size(&self) -> usize {
        self.image.memory_size() + self.audio.as_ref().map_or(0, AudioBlock::memory_size)
    }
}

/// Arc-wrapped frame for shared ownership between cache and consumer.
pub type SharedFrame = Arc<VideoFrame>;
