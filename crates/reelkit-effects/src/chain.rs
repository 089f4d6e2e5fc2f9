//! Effect registry, chains, and the reader wrapper.
//!
//! Effects serialise through [`EffectDef`], a tagged enum keyed by a
//! `type` field, so persisted chains stay self-describing without a
//! string-keyed runtime registry. [`EffectReader`] splices a chain
//! into the reader path: the consumer (and the prefetch cache) only
//! ever see finished frames.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use reelkit_core::{FrameReader, ReaderInfo, ReelError, Result, SharedFrame, VideoFrame};

use crate::color_map::ColorMap;
use crate::deinterlace::Deinterlace;
use crate::lens_flare::LensFlare;
use crate::mask::Mask;
use crate::sharpen::Sharpen;
use crate::spherical::SphericalProjection;
use crate::Effect;

/// Serialisable effect variant. The JSON representation carries a
/// `type` tag plus the effect's own fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EffectDef {
    ColorMap(ColorMap),
    Sharpen(Sharpen),
    SphericalProjection(SphericalProjection),
    Deinterlace(Deinterlace),
    Mask(Mask),
    LensFlare(LensFlare),
}

impl EffectDef {
    /// Parse a single effect from JSON, restoring derived state (LUT
    /// contents, cached mask images).
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let mut def: EffectDef = serde_json::from_value(value.clone())
            .map_err(|e| ReelError::InvalidJson(e.to_string()))?;
        def.refresh();
        Ok(def)
    }

    /// Render this effect to its JSON representation.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("effect serialisation is infallible")
    }

    /// Reload any state derived from serialised fields.
    pub fn refresh(&mut self) {
        match self {
            EffectDef::ColorMap(e) => e.refresh(),
            EffectDef::Mask(e) => e.refresh(),
            _ => {}
        }
    }

    fn as_effect(&self) -> &dyn Effect {
        match self {
            EffectDef::ColorMap(e) => e,
            EffectDef::Sharpen(e) => e,
            EffectDef::SphericalProjection(e) => e,
            EffectDef::Deinterlace(e) => e,
            EffectDef::Mask(e) => e,
            EffectDef::LensFlare(e) => e,
        }
    }
}

impl Effect for EffectDef {
    fn name(&self) -> &'static str {
        self.as_effect().name()
    }

    fn apply(&self, frame: VideoFrame, frame_number: i64) -> VideoFrame {
        self.as_effect().apply(frame, frame_number)
    }
}

/// An ordered list of effects applied per frame. Serialises as a bare
/// JSON array of tagged effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectChain {
    effects: Vec<EffectDef>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: EffectDef) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[EffectDef] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Apply every effect in order.
    pub fn apply(&self, mut frame: VideoFrame, frame_number: i64) -> VideoFrame {
        for effect in &self.effects {
            frame = effect.apply(frame, frame_number);
        }
        frame
    }

    /// Parse a chain from JSON (an array of tagged effects).
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let mut chain: EffectChain = serde_json::from_value(value.clone())
            .map_err(|e| ReelError::InvalidJson(e.to_string()))?;
        for effect in &mut chain.effects {
            effect.refresh();
        }
        Ok(chain)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("chain serialisation is infallible")
    }
}

/// Reader wrapper applying an effect chain to every produced frame.
///
/// This is the reader the consumer (and the prefetch engine) sees: a
/// timeline composes clip readers and wraps them so cached frames are
/// already fully rendered.
pub struct EffectReader {
    inner: Arc<dyn FrameReader>,
    chain: EffectChain,
}

impl EffectReader {
    pub fn new(inner: Arc<dyn FrameReader>, chain: EffectChain) -> Self {
        Self { inner, chain }
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }
}

impl FrameReader for EffectReader {
    fn open(&self) -> Result<()> {
        self.inner.open()
    }

    fn close(&self) {
        self.inner.close();
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn info(&self) -> ReaderInfo {
        self.inner.info()
    }

    fn frame(&self, number: i64) -> Result<SharedFrame> {
        let frame = self.inner.frame(number)?;
        if self.chain.is_empty() {
            return Ok(frame);
        }
        // Unshare before mutating; effects own the frame they work on.
        let owned = Arc::try_unwrap(frame).unwrap_or_else(|arc| (*arc).clone());
        Ok(Arc::new(self.chain.apply(owned, number)))
    }
}
