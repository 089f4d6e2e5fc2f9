//! Edge-contrast sharpening via unsharp masking or high-pass blending.
//!
//! The Gaussian blur underneath is approximated by three sequential
//! box blurs whose widths derive from sigma ("boxes for Gauss");
//! fractional radii blend the two adjacent integer-radius outputs.
//! The threshold is adaptive: the keyframed ratio scales the maximum
//! luma difference found in the frame, so the same setting behaves
//! consistently across content.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use reelkit_core::frame::BYTES_PER_PIXEL;
use reelkit_core::{Keyframe, VideoFrame};

use crate::{clamp_u8, Effect};

const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharpenMode {
    /// `out = original + amount · detail · halo(detail)`
    #[default]
    UnsharpMask,
    /// `out = blurred + amount · detail`, no halo limiter
    HighPassBlend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharpenChannel {
    All,
    #[default]
    Luma,
    Chroma,
}

/// Sharpen effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sharpen {
    /// Strength, 0–40.
    pub amount: Keyframe,
    /// Blur radius in pixels (at 720p reference height), 0–10.
    pub radius: Keyframe,
    /// Adaptive threshold ratio, 0–1.
    pub threshold: Keyframe,
    pub mode: SharpenMode,
    pub channel: SharpenChannel,
}

impl Default for Sharpen {
    fn default() -> Self {
        Self {
            amount: Keyframe::constant(10.0),
            radius: Keyframe::constant(3.0),
            threshold: Keyframe::constant(0.0),
            mode: SharpenMode::UnsharpMask,
            channel: SharpenChannel::Luma,
        }
    }
}

impl Sharpen {
    pub fn new(amount: Keyframe, radius: Keyframe, threshold: Keyframe) -> Self {
        Self {
            amount,
            radius,
            threshold,
            ..Self::default()
        }
    }
}

// ── Box-blur machinery ──────────────────────────────────────────

/// Three box widths approximating a Gaussian of the given sigma.
fn boxes_for_gauss(sigma: f64) -> [i32; 3] {
    const N: f64 = 3.0;
    let wi = ((12.0 * sigma * sigma / N) + 1.0).sqrt();
    let mut wl = wi.floor() as i32;
    if wl % 2 == 0 {
        wl -= 1;
    }
    let wu = wl + 2;
    let mi = (12.0 * sigma * sigma - N * (wl * wl) as f64 - 4.0 * N * wl as f64 - 3.0 * N)
        / (-4.0 * wl as f64 - 4.0);
    let m = mi.round() as i32;
    let mut b = [0i32; 3];
    for (i, bi) in b.iter_mut().enumerate() {
        *bi = if (i as i32) < m { wl } else { wu };
    }
    b
}

/// Horizontal box blur with an edge-replicate sliding window.
fn blur_rows(src: &[u8], dst: &mut [u8], w: usize, h: usize, r: i32) {
    if r <= 0 {
        dst.copy_from_slice(src);
        return;
    }
    let stride = w * BYTES_PER_PIXEL;
    let window = (2 * r + 1) as f64;
    let r = r as usize;

    dst.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src[y * stride..(y + 1) * stride];
            let px = |x: usize| {
                let x = x.min(w - 1);
                &row_in[x * BYTES_PER_PIXEL..x * BYTES_PER_PIXEL + 4]
            };

            let first = px(0);
            let mut sums = [
                first[0] as f64 * (r + 1) as f64,
                first[1] as f64 * (r + 1) as f64,
                first[2] as f64 * (r + 1) as f64,
                first[3] as f64 * (r + 1) as f64,
            ];
            for x in 1..=r {
                let p = px(x);
                for c in 0..4 {
                    sums[c] += p[c] as f64;
                }
            }

            for x in 0..w {
                let o = &mut row_out[x * BYTES_PER_PIXEL..x * BYTES_PER_PIXEL + 4];
                for c in 0..4 {
                    o[c] = (sums[c] / window + 0.5) as u8;
                }
                let add = px(x + r + 1);
                let sub = px(x.saturating_sub(r));
                for c in 0..4 {
                    sums[c] += add[c] as f64 - sub[c] as f64;
                }
            }
        });
}

/// Transpose an RGBA image (w×h → h×w).
fn transpose(src: &[u8], dst: &mut [u8], w: usize, h: usize) {
    let dst_stride = h * BYTES_PER_PIXEL;
    dst.par_chunks_mut(dst_stride)
        .enumerate()
        .for_each(|(x, out_row)| {
            for y in 0..h {
                let s = (y * w + x) * BYTES_PER_PIXEL;
                out_row[y * BYTES_PER_PIXEL..y * BYTES_PER_PIXEL + 4]
                    .copy_from_slice(&src[s..s + 4]);
            }
        });
}

/// Box blur one axis at a possibly fractional radius, blending the two
/// adjacent integer-radius outputs linearly.
fn box_blur_axis(src: &[u8], dst: &mut [u8], w: usize, h: usize, rf: f64, vertical: bool) {
    if vertical {
        // Blur columns as rows of the transpose
        let mut t = vec![0u8; src.len()];
        let mut t_blurred = vec![0u8; src.len()];
        transpose(src, &mut t, w, h);
        box_blur_axis(&t, &mut t_blurred, h, w, rf, false);
        transpose(&t_blurred, dst, h, w);
        return;
    }

    let r0 = rf.floor() as i32;
    let f = rf - r0 as f64;
    if f < 1e-4 {
        blur_rows(src, dst, w, h, r0);
    } else {
        let mut a = vec![0u8; src.len()];
        let mut b = vec![0u8; src.len()];
        blur_rows(src, &mut a, w, h, r0);
        blur_rows(src, &mut b, w, h, r0 + 1);
        dst.par_iter_mut().enumerate().for_each(|(i, d)| {
            *d = ((1.0 - f) * a[i] as f64 + f * b[i] as f64 + 0.5) as u8;
        });
    }
}

/// Approximate Gaussian blur: three sequential box blurs per axis.
fn gauss_blur(src: &[u8], dst: &mut [u8], w: usize, h: usize, sigma: f64) {
    let boxes = boxes_for_gauss(sigma);
    let mut t1 = vec![0u8; src.len()];
    let mut t2 = vec![0u8; src.len()];

    let mut r = 0.5 * (boxes[0] - 1) as f64;
    box_blur_axis(src, &mut t1, w, h, r, false);
    box_blur_axis(&t1, &mut t2, w, h, r, true);

    r = 0.5 * (boxes[1] - 1) as f64;
    box_blur_axis(&t2, &mut t1, w, h, r, false);
    box_blur_axis(&t1, &mut t2, w, h, r, true);

    r = 0.5 * (boxes[2] - 1) as f64;
    box_blur_axis(&t2, &mut t1, w, h, r, false);
    box_blur_axis(&t1, dst, w, h, r, true);
}

impl Effect for Sharpen {
    fn name(&self) -> &'static str {
        "Sharpen"
    }

    fn apply(&self, mut frame: VideoFrame, frame_number: i64) -> VideoFrame {
        let w = frame.image.width() as usize;
        let h = frame.image.height() as usize;
        if w == 0 || h == 0 {
            return frame;
        }

        let amt = self.amount.value(frame_number);
        let rpx = self.radius.value(frame_number);
        let thr_ratio = self.threshold.value(frame_number);
        if rpx <= 0.0 {
            return frame;
        }

        // Sigma scaled against a 720p reference height
        let sigma = (rpx * h as f64 / 720.0).max(0.1);

        let mut blurred = vec![0u8; frame.image.data().len()];
        gauss_blur(frame.image.data(), &mut blurred, w, h, sigma);

        let stride = w * BYTES_PER_PIXEL;
        let src = frame.image.data();

        // Maximum luma difference drives the adaptive threshold
        let max_dy = src
            .par_chunks(stride)
            .zip(blurred.par_chunks(stride))
            .map(|(s_row, b_row)| {
                let mut row_max = 0.0f64;
                for (sp, bp) in s_row
                    .chunks_exact(BYTES_PER_PIXEL)
                    .zip(b_row.chunks_exact(BYTES_PER_PIXEL))
                {
                    let dr = sp[0] as f64 - bp[0] as f64;
                    let dg = sp[1] as f64 - bp[1] as f64;
                    let db = sp[2] as f64 - bp[2] as f64;
                    let dy = (LUMA_R * dr + LUMA_G * dg + LUMA_B * db).abs();
                    row_max = row_max.max(dy);
                }
                row_max
            })
            .reduce(|| 0.0f64, f64::max);

        let thr = thr_ratio * max_dy;
        let mode = self.mode;
        let channel = self.channel;

        let halo = |d: f64| (255.0 - d.abs()) / 255.0;

        frame
            .image
            .data_mut()
            .par_chunks_mut(stride)
            .zip(blurred.par_chunks(stride))
            .for_each(|(s_row, b_row)| {
                for (sp, bp) in s_row
                    .chunks_exact_mut(BYTES_PER_PIXEL)
                    .zip(b_row.chunks_exact(BYTES_PER_PIXEL))
                {
                    let dr = sp[0] as f64 - bp[0] as f64;
                    let dg = sp[1] as f64 - bp[1] as f64;
                    let db = sp[2] as f64 - bp[2] as f64;
                    let dy = LUMA_R * dr + LUMA_G * dg + LUMA_B * db;

                    if dy.abs() < thr {
                        continue;
                    }

                    let out = match mode {
                        SharpenMode::HighPassBlend => match channel {
                            SharpenChannel::Luma => {
                                let luma_inc = amt * dy;
                                [
                                    bp[0] as f64 + luma_inc * LUMA_R,
                                    bp[1] as f64 + luma_inc * LUMA_G,
                                    bp[2] as f64 + luma_inc * LUMA_B,
                                ]
                            }
                            SharpenChannel::Chroma => [
                                bp[0] as f64 + amt * (dr - dy * LUMA_R),
                                bp[1] as f64 + amt * (dg - dy * LUMA_G),
                                bp[2] as f64 + amt * (db - dy * LUMA_B),
                            ],
                            SharpenChannel::All => [
                                bp[0] as f64 + amt * dr,
                                bp[1] as f64 + amt * dg,
                                bp[2] as f64 + amt * db,
                            ],
                        },
                        SharpenMode::UnsharpMask => match channel {
                            SharpenChannel::Luma => {
                                let inc = amt * dy * halo(dy);
                                [sp[0] as f64 + inc, sp[1] as f64 + inc, sp[2] as f64 + inc]
                            }
                            SharpenChannel::Chroma => {
                                let cr = dr - dy;
                                let cg = dg - dy;
                                let cb = db - dy;
                                [
                                    sp[0] as f64 + amt * cr * halo(cr),
                                    sp[1] as f64 + amt * cg * halo(cg),
                                    sp[2] as f64 + amt * cb * halo(cb),
                                ]
                            }
                            SharpenChannel::All => [
                                sp[0] as f64 + amt * dr * halo(dr),
                                sp[1] as f64 + amt * dg * halo(dg),
                                sp[2] as f64 + amt * db * halo(db),
                            ],
                        },
                    };

                    for c in 0..3 {
                        sp[c] = clamp_u8(out[c] as f32);
                    }
                }
            });

        frame
    }
}
