//! ReelKit Effects - deterministic per-frame image transforms
//!
//! Every effect consumes one frame plus its ordinal, evaluates its
//! keyframed parameters exactly once, and returns the transformed
//! frame. Pixel arithmetic happens in floating point and clamps to
//! `[0, 255]` on write-back; per-pixel anomalies never raise. Scanline
//! parallelism is fork-join within a single `apply` call and
//! deterministic with respect to output bytes.

pub mod chain;
pub mod color_map;
pub mod deinterlace;
pub mod lens_flare;
pub mod mask;
pub mod sharpen;
pub mod spherical;

pub use chain::{EffectChain, EffectDef, EffectReader};
pub use color_map::ColorMap;
pub use deinterlace::Deinterlace;
pub use lens_flare::{LensFlare, TintColor};
pub use mask::{Mask, MaskSource};
pub use sharpen::{Sharpen, SharpenChannel, SharpenMode};
pub use spherical::{ProjectionMode, SampleFilter, SphericalProjection};

use reelkit_core::VideoFrame;

/// A deterministic, keyframe-parameterised image transform.
pub trait Effect: Send + Sync {
    /// Stable effect name used for diagnostics and JSON tagging.
    fn name(&self) -> &'static str;

    /// Transform one frame. Parameters are evaluated at
    /// `frame_number`; the output image stays pre-multiplied RGBA8.
    fn apply(&self, frame: VideoFrame, frame_number: i64) -> VideoFrame;
}

/// Clamp a float to a byte, rounding to nearest.
#[inline]
pub(crate) fn clamp_u8(v: f32) -> u8 {
    (v + 0.5).clamp(0.0, 255.0) as u8
}
