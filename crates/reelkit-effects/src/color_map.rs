//! 3D LUT colour mapping from `.cube` files.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use reelkit_core::frame::BYTES_PER_PIXEL;
use reelkit_core::{Keyframe, ReelError, VideoFrame};

use crate::{clamp_u8, Effect};

/// Parsed 3D LUT contents: `size³` RGB float triples in red-fastest
/// order. Empty means the effect is an identity.
#[derive(Debug, Clone, Default)]
struct LutData {
    size: usize,
    values: Vec<f32>,
}

impl LutData {
    fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Colour lookup effect driven by a `.cube` 3D LUT.
///
/// The overall `intensity` keyframe scales each per-channel blend
/// (`t_c = channel · overall`), so intensity 0 is an exact identity
/// regardless of the LUT contents. A missing or malformed LUT degrades
/// silently to identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorMap {
    pub lut_path: String,
    pub intensity: Keyframe,
    pub intensity_r: Keyframe,
    pub intensity_g: Keyframe,
    pub intensity_b: Keyframe,
    #[serde(skip)]
    lut: LutData,
}

impl Default for ColorMap {
    fn default() -> Self {
        Self {
            lut_path: String::new(),
            intensity: Keyframe::constant(1.0),
            intensity_r: Keyframe::constant(1.0),
            intensity_g: Keyframe::constant(1.0),
            intensity_b: Keyframe::constant(1.0),
            lut: LutData::default(),
        }
    }
}

impl ColorMap {
    /// Create a colour map loading the LUT from `path`.
    pub fn from_file(path: &Path) -> Self {
        let mut map = Self {
            lut_path: path.to_string_lossy().to_string(),
            ..Self::default()
        };
        map.refresh();
        map
    }

    /// Create a colour map from in-memory `.cube` text.
    pub fn from_cube_str(content: &str) -> Self {
        let mut map = Self::default();
        map.lut = parse_cube(content).unwrap_or_default();
        map
    }

    /// Like [`ColorMap::from_file`], but surfaces load failures
    /// instead of degrading to identity.
    pub fn try_from_file(path: &Path) -> reelkit_core::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReelError::UnreadableLut(format!("{}: {e}", path.display())))?;
        let lut = parse_cube(&content)
            .ok_or_else(|| ReelError::UnreadableLut(format!("{}: malformed", path.display())))?;
        Ok(Self {
            lut_path: path.to_string_lossy().to_string(),
            lut,
            ..Self::default()
        })
    }

    /// True when no usable LUT is loaded (identity behaviour).
    pub fn is_identity(&self) -> bool {
        self.lut.is_empty()
    }

    /// Reload the LUT from `lut_path`. Failures leave the LUT empty.
    pub fn refresh(&mut self) {
        self.lut = LutData::default();
        if self.lut_path.is_empty() {
            return;
        }
        match std::fs::read_to_string(&self.lut_path) {
            Ok(content) => match parse_cube(&content) {
                Some(lut) => self.lut = lut,
                None => warn!(path = %self.lut_path, "malformed .cube LUT; effect is identity"),
            },
            Err(err) => {
                warn!(path = %self.lut_path, %err, "unreadable .cube LUT; effect is identity");
            }
        }
    }

    /// Trilinear lookup of a normalised RGB triple.
    fn sample(&self, rn: f32, gn: f32, bn: f32) -> [f32; 3] {
        let size = self.lut.size;
        let n = (size - 1) as f32;
        let values = &self.lut.values;

        let rf = rn * n;
        let gf = gn * n;
        let bf = bn * n;

        let r0 = (rf.floor() as usize).min(size - 1);
        let g0 = (gf.floor() as usize).min(size - 1);
        let b0 = (bf.floor() as usize).min(size - 1);
        let r1 = (r0 + 1).min(size - 1);
        let g1 = (g0 + 1).min(size - 1);
        let b1 = (b0 + 1).min(size - 1);

        let dr = rf - r0 as f32;
        let dg = gf - g0 as f32;
        let db = bf - b0 as f32;

        // Red fastest, then green, then blue
        let base = |r: usize, g: usize, b: usize| ((b * size + g) * size + r) * 3;
        let b000 = base(r0, g0, b0);
        let b100 = base(r1, g0, b0);
        let b010 = base(r0, g1, b0);
        let b110 = base(r1, g1, b0);
        let b001 = base(r0, g0, b1);
        let b101 = base(r1, g0, b1);
        let b011 = base(r0, g1, b1);
        let b111 = base(r1, g1, b1);

        let mut out = [0.0f32; 3];
        for c in 0..3 {
            let c00 = values[b000 + c] * (1.0 - dr) + values[b100 + c] * dr;
            let c01 = values[b001 + c] * (1.0 - dr) + values[b101 + c] * dr;
            let c10 = values[b010 + c] * (1.0 - dr) + values[b110 + c] * dr;
            let c11 = values[b011 + c] * (1.0 - dr) + values[b111 + c] * dr;
            let c0 = c00 * (1.0 - dg) + c10 * dg;
            let c1 = c01 * (1.0 - dg) + c11 * dg;
            out[c] = c0 * (1.0 - db) + c1 * db;
        }
        out
    }
}

impl Effect for ColorMap {
    fn name(&self) -> &'static str {
        "ColorMap"
    }

    fn apply(&self, mut frame: VideoFrame, frame_number: i64) -> VideoFrame {
        if self.lut.is_empty() {
            return frame;
        }

        let overall = self.intensity.value(frame_number) as f32;
        let tr = self.intensity_r.value(frame_number) as f32 * overall;
        let tg = self.intensity_g.value(frame_number) as f32 * overall;
        let tb = self.intensity_b.value(frame_number) as f32 * overall;

        let width = frame.image.width() as usize;
        frame
            .image
            .data_mut()
            .par_chunks_mut(width * BYTES_PER_PIXEL)
            .for_each(|row| {
                for px in row.chunks_exact_mut(BYTES_PER_PIXEL) {
                    let alpha = px[3] as f32 / 255.0;
                    if alpha == 0.0 {
                        continue;
                    }

                    // Demultiply, then normalise to [0, 1]
                    let rn = (px[0] as f32 / alpha) / 255.0;
                    let gn = (px[1] as f32 / alpha) / 255.0;
                    let bn = (px[2] as f32 / alpha) / 255.0;

                    let lut = self.sample(rn, gn, bn);

                    // Per-channel blend, re-premultiply; alpha unchanged
                    let out_r = (lut[0] * tr + rn * (1.0 - tr)) * alpha;
                    let out_g = (lut[1] * tg + gn * (1.0 - tg)) * alpha;
                    let out_b = (lut[2] * tb + bn * (1.0 - tb)) * alpha;

                    px[0] = clamp_u8(out_r * 255.0);
                    px[1] = clamp_u8(out_g * 255.0);
                    px[2] = clamp_u8(out_b * 255.0);
                }
            });

        frame
    }
}

/// Parse `.cube` text: locate `LUT_3D_SIZE N`, then read `N³`
/// whitespace-separated RGB triples, skipping blanks and lines
/// starting with `#`, `TITLE`, or `DOMAIN`. Returns `None` when the
/// size line is missing or the data is short.
fn parse_cube(content: &str) -> Option<LutData> {
    let mut lines = content.lines();
    let mut size = 0usize;

    for line in lines.by_ref() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("LUT_3D_SIZE") {
            size = rest.trim().parse().ok()?;
            break;
        }
    }
    if size == 0 {
        return None;
    }

    let total = size * size * size * 3;
    let mut values = Vec::with_capacity(total);
    for line in lines {
        if values.len() >= total {
            break;
        }
        let line = line.trim();
        if line.is_empty()
            || line.starts_with('#')
            || line.starts_with("TITLE")
            || line.starts_with("DOMAIN")
        {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (r, g, b) = (parts.next()?, parts.next()?, parts.next()?);
        values.push(r.parse().ok()?);
        values.push(g.parse().ok()?);
        values.push(b.parse().ok()?);
    }

    if values.len() != total {
        return None;
    }
    Some(LutData { size, values })
}
