//! ReelKit Core - Foundation types for the playback runtime
//!
//! This crate provides the fundamental types used throughout ReelKit:
//! - Frames and pre-multiplied RGBA image buffers
//! - Keyframed scalar parameters
//! - The reader interface and stream descriptors
//! - Output profiles and exact fractions
//! - Process settings and spherical metadata tags

pub mod error;
pub mod frame;
pub mod keyframe;
pub mod profile;
pub mod reader;
pub mod settings;
pub mod spherical;

pub use error::{ReelError, Result};
pub use frame::{AudioBlock, ImageBuffer, SharedFrame, VideoFrame};
pub use keyframe::{CubicBezier, Interpolation, Keyframe};
pub use profile::{Fraction, Profile};
pub use reader::{FrameReader, PatternReader, ReaderInfo};
pub use settings::Settings;
pub use spherical::SphericalMetadata;
