//! Spherical (360°) metadata side-channel.
//!
//! Writers tag their output streams with an equirectangular projection
//! and orientation after stream preparation and before opening;
//! readers surface the same tags in [`ReaderInfo::metadata`].
//!
//! [`ReaderInfo::metadata`]: crate::reader::ReaderInfo

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata keys used on writer streams and reader descriptors.
pub mod keys {
    pub const SPHERICAL: &str = "spherical";
    pub const PROJECTION: &str = "spherical_projection";
    pub const YAW: &str = "spherical_yaw";
    pub const PITCH: &str = "spherical_pitch";
    pub const ROLL: &str = "spherical_roll";
}

/// Equirectangular orientation tags carried alongside a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphericalMetadata {
    pub projection: String,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl SphericalMetadata {
    pub fn new(projection: &str, yaw: f32, pitch: f32, roll: f32) -> Self {
        Self {
            projection: projection.to_string(),
            yaw,
            pitch,
            roll,
        }
    }

    /// Write the tags into a stream metadata map.
    pub fn apply_to(&self, metadata: &mut HashMap<String, String>) {
        metadata.insert(keys::SPHERICAL.to_string(), "1".to_string());
        metadata.insert(keys::PROJECTION.to_string(), self.projection.clone());
        metadata.insert(keys::YAW.to_string(), self.yaw.to_string());
        metadata.insert(keys::PITCH.to_string(), self.pitch.to_string());
        metadata.insert(keys::ROLL.to_string(), self.roll.to_string());
    }

    /// Recover tags from a metadata map, if the stream is spherical.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Option<Self> {
        if metadata.get(keys::SPHERICAL).map(String::as_str) != Some("1") {
            return None;
        }
        let angle = |key: &str| {
            metadata
                .get(key)
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.0)
        };
        Some(Self {
            projection: metadata
                .get(keys::PROJECTION)
                .cloned()
                .unwrap_or_else(|| "equirectangular".to_string()),
            yaw: angle(keys::YAW),
            pitch: angle(keys::PITCH),
            roll: angle(keys::ROLL),
        })
    }
}
