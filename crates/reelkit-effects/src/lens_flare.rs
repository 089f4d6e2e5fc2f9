//! Lens flare synthesis.
//!
//! Builds a flare overlay from a bright core, glow, inner/outer/halo
//! rings, and a fixed table of reflector definitions, then composites
//! it additively onto the frame. Overlay alpha is the brightest
//! channel, and the frame's alpha is rebuilt as
//! `max(original, overlay · brightness)`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use reelkit_core::frame::BYTES_PER_PIXEL;
use reelkit_core::{Keyframe, VideoFrame};

use crate::Effect;

/// Keyframed RGBA tint, channels in 0–255.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TintColor {
    pub red: Keyframe,
    pub green: Keyframe,
    pub blue: Keyframe,
    pub alpha: Keyframe,
}

impl Default for TintColor {
    fn default() -> Self {
        Self {
            red: Keyframe::constant(255.0),
            green: Keyframe::constant(255.0),
            blue: Keyframe::constant(255.0),
            alpha: Keyframe::constant(255.0),
        }
    }
}

/// Lens flare effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensFlare {
    /// Flare centre in [-1, 1] of the frame.
    pub x: Keyframe,
    pub y: Keyframe,
    /// Overlay opacity, 0–1.
    pub brightness: Keyframe,
    /// Overall scale, 0.1–3.
    pub size: Keyframe,
    /// Reflector spread along the lens axis, 0–1.
    pub spread: Keyframe,
    pub color: TintColor,
}

impl Default for LensFlare {
    fn default() -> Self {
        Self {
            x: Keyframe::constant(-0.5),
            y: Keyframe::constant(-0.5),
            brightness: Keyframe::constant(1.0),
            size: Keyframe::constant(1.0),
            spread: Keyframe::constant(1.0),
            color: TintColor::default(),
        }
    }
}

// ── Colour helpers ──────────────────────────────────────────────

fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let v = max;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta <= 0.0 {
        0.0
    } else if max == r {
        (((g - b) / delta).rem_euclid(6.0)) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };
    (h, s, v)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let h6 = (h.rem_euclid(1.0)) * 6.0;
    let i = h6.floor();
    let f = h6 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i as i32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Shift a base colour's HSV by the tint's hue and scale its
/// saturation/value/alpha.
fn shifted_hsv(base: [f32; 4], h_shift: f32, s_scale: f32, v_scale: f32, a_scale: f32) -> [f32; 4] {
    let (mut h, mut s, mut v) = rgb_to_hsv(base[0], base[1], base[2]);
    if s == 0.0 {
        h = 0.0;
    }
    h = (h + h_shift + 1.0).rem_euclid(1.0);
    s = (s * s_scale).clamp(0.0, 1.0);
    v = (v * v_scale).clamp(0.0, 1.0);
    let a = (base[3] * a_scale).clamp(0.0, 1.0);
    let (r, g, b) = hsv_to_rgb(h, s, v);
    [r, g, b, a]
}

/// Additive blend of a colour (0–1 channels) onto 0–255 components at
/// proportion `p`, saturating toward white.
#[inline]
fn blend_add(rgb: [i32; 3], col: [f32; 4], p: f32) -> [i32; 3] {
    let mut out = rgb;
    for c in 0..3 {
        let d = ((255 - rgb[c]) as f32 * p * col[c]) as i32;
        out[c] = (rgb[c] + d).clamp(0, 255);
    }
    out
}

// ── Reflector table ─────────────────────────────────────────────

struct Reflect {
    xp: f32,
    yp: f32,
    size: f32,
    col: [f32; 4],
    kind: u8,
}

/// (kind, position factor, size factor, base RGB). Positions are
/// multiplied by the spread vector from the flare centre to the frame
/// centre.
#[rustfmt::skip]
const REFLECTOR_DEFS: [(u8, f32, f32, f32, f32, f32); 19] = [
    (1,  0.6699, 0.027,   0.0,        14.0 / 255.0, 113.0 / 255.0),
    (1,  0.2692, 0.010,  90.0 / 255.0, 181.0 / 255.0, 142.0 / 255.0),
    (1, -0.0112, 0.005,  56.0 / 255.0, 140.0 / 255.0, 106.0 / 255.0),
    (2,  0.6490, 0.031,   9.0 / 255.0,  29.0 / 255.0,  19.0 / 255.0),
    (2,  0.4696, 0.015,  24.0 / 255.0,  14.0 / 255.0,   0.0),
    (2,  0.4087, 0.037,  24.0 / 255.0,  14.0 / 255.0,   0.0),
    (2, -0.2003, 0.022,  42.0 / 255.0,  19.0 / 255.0,   0.0),
    (2, -0.4103, 0.025,   0.0,          9.0 / 255.0,  17.0 / 255.0),
    (2, -0.4503, 0.058,  10.0 / 255.0,   4.0 / 255.0,   0.0),
    (2, -0.5112, 0.017,   5.0 / 255.0,   5.0 / 255.0,  14.0 / 255.0),
    (2, -1.4960, 0.20,    9.0 / 255.0,   4.0 / 255.0,   0.0),
    (2, -1.4960, 0.50,    9.0 / 255.0,   4.0 / 255.0,   0.0),
    (3,  0.4487, 0.075,  34.0 / 255.0,  19.0 / 255.0,   0.0),
    (3,  1.0000, 0.10,   14.0 / 255.0,  26.0 / 255.0,   0.0),
    (3, -1.3010, 0.039,  10.0 / 255.0,  25.0 / 255.0,  13.0 / 255.0),
    (4,  1.3090, 0.19,    9.0 / 255.0,   0.0,          17.0 / 255.0),
    (4,  1.3090, 0.195,   9.0 / 255.0,  16.0 / 255.0,   5.0 / 255.0),
    (4,  1.3090, 0.20,   17.0 / 255.0,   4.0 / 255.0,   0.0),
    (4, -1.3010, 0.038,  17.0 / 255.0,   4.0 / 255.0,   0.0),
];

fn init_reflectors(
    dx: f32,
    dy: f32,
    width: u32,
    height: u32,
    tint: [f32; 4],
    scale: f32,
) -> Vec<Reflect> {
    let half_w = width as f32 * 0.5;
    let half_h = height as f32 * 0.5;
    let matt = width as f32;

    let (tint_h, tint_s, tint_v) = rgb_to_hsv(tint[0], tint[1], tint[2]);
    let white_tint = tint_s < 0.01;

    REFLECTOR_DEFS
        .iter()
        .map(|&(kind, f, fsize, r, g, b)| {
            let base = [r, g, b, 1.0];
            Reflect {
                kind,
                size: fsize * matt * scale,
                xp: half_w + f * dx,
                yp: half_h + f * dy,
                col: if white_tint {
                    base
                } else {
                    shifted_hsv(base, tint_h, tint_s, tint_v, tint[3])
                },
            }
        })
        .collect()
}

fn apply_reflector(rgb: [i32; 3], r: &Reflect, cx: f32, cy: f32) -> [i32; 3] {
    let d = (r.xp - cx).hypot(r.yp - cy);
    match r.kind {
        1 => {
            let p = (r.size - d) / r.size;
            if p > 0.0 {
                blend_add(rgb, r.col, p * p)
            } else {
                rgb
            }
        }
        2 => {
            let p = (r.size - d) / (r.size * 0.15);
            if p > 0.0 {
                blend_add(rgb, r.col, p.min(1.0))
            } else {
                rgb
            }
        }
        3 => {
            let p = (r.size - d) / (r.size * 0.12);
            if p > 0.0 {
                blend_add(rgb, r.col, 1.0 - p.min(1.0) * 0.12)
            } else {
                rgb
            }
        }
        _ => {
            let p = ((d - r.size) / (r.size * 0.04)).abs();
            if p < 1.0 {
                blend_add(rgb, r.col, 1.0 - p)
            } else {
                rgb
            }
        }
    }
}

impl Effect for LensFlare {
    fn name(&self) -> &'static str {
        "LensFlare"
    }

    fn apply(&self, mut frame: VideoFrame, frame_number: i64) -> VideoFrame {
        let w = frame.image.width();
        let h = frame.image.height();
        if w == 0 || h == 0 {
            return frame;
        }

        let cx = self.x.value(frame_number) as f32;
        let cy = self.y.value(frame_number) as f32;
        let intensity = self.brightness.value(frame_number) as f32;
        let scale = self.size.value(frame_number) as f32;
        let spread = self.spread.value(frame_number) as f32;

        // Lens centre and the spread vector toward the frame centre
        let half_w = w as f32 * 0.5;
        let half_h = h as f32 * 0.5;
        let px = (cx * 0.5 + 0.5) * w as f32;
        let py = (cy * 0.5 + 0.5) * h as f32;
        let dx = (half_w - px) * spread;
        let dy = (half_h - py) * spread;

        let tint = [
            self.color.red.value(frame_number) as f32 / 255.0,
            self.color.green.value(frame_number) as f32 / 255.0,
            self.color.blue.value(frame_number) as f32 / 255.0,
            self.color.alpha.value(frame_number) as f32 / 255.0,
        ];

        // Ring radii as fractions of the frame width
        let matt = w as f32;
        let s_color = matt * 0.0375 * scale;
        let s_glow = matt * 0.078_125 * scale;
        let s_inner = matt * 0.179_687_5 * scale;
        let s_outer = matt * 0.335_937_5 * scale;
        let s_halo = matt * 0.084_375 * scale;

        let tintify = |br: f32, bg: f32, bb: f32| [br * tint[0], bg * tint[1], bb * tint[2], tint[3]];
        let c_color = tintify(239.0 / 255.0, 239.0 / 255.0, 239.0 / 255.0);
        let c_glow = tintify(245.0 / 255.0, 245.0 / 255.0, 245.0 / 255.0);
        let c_inner = tintify(1.0, 38.0 / 255.0, 43.0 / 255.0);
        let c_outer = tintify(69.0 / 255.0, 59.0 / 255.0, 64.0 / 255.0);
        let c_halo = tintify(80.0 / 255.0, 15.0 / 255.0, 4.0 / 255.0);

        let reflectors = init_reflectors(dx, dy, w, h, tint, scale);

        let stride = w as usize * BYTES_PER_PIXEL;
        frame
            .image
            .data_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(yy, row)| {
                for (xx, pixel) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                    let fx = xx as f32;
                    let fy = yy as f32;
                    let d = (fx - px).hypot(fy - py);

                    // Synthesize the overlay pixel
                    let mut rgb = [0i32; 3];
                    if d < s_color {
                        let p = (s_color - d) / s_color;
                        rgb = blend_add(rgb, c_color, p * p);
                    }
                    if d < s_glow {
                        let p = (s_glow - d) / s_glow;
                        rgb = blend_add(rgb, c_glow, p * p);
                    }
                    if d < s_inner {
                        let p = (s_inner - d) / s_inner;
                        rgb = blend_add(rgb, c_inner, p * p);
                    }
                    if d < s_outer {
                        let p = (s_outer - d) / s_outer;
                        rgb = blend_add(rgb, c_outer, p);
                    }
                    if s_halo > 0.0 {
                        let p = ((d - s_halo) / (s_halo * 0.07)).abs();
                        if p < 1.0 {
                            rgb = blend_add(rgb, c_halo, 1.0 - p);
                        }
                    }
                    for reflect in &reflectors {
                        rgb = apply_reflector(rgb, reflect, fx, fy);
                    }

                    // Overlay alpha is the brightest channel
                    let overlay_a = rgb[0].max(rgb[1]).max(rgb[2]);

                    // Additive composite at `intensity`, alpha rebuilt
                    // as max(original, overlay · intensity)
                    for c in 0..3 {
                        let v = pixel[c] as f32 + rgb[c] as f32 * intensity;
                        pixel[c] = v.clamp(0.0, 255.0) as u8;
                    }
                    let fa = overlay_a as f32 * intensity;
                    pixel[3] = (pixel[3] as f32).max(fa).clamp(0.0, 255.0) as u8;
                }
            });

        frame
    }
}
