//! ReelKit Cache - Directional playback prefetch
//!
//! This crate provides the bounded frame cache and the background
//! engine that keeps it filled around a moving playhead:
//! - [`FrameCache`] / [`MemoryCache`]: LRU cache bounded by bytes and
//!   frame count
//! - [`CacheEngine`]: the prefetch worker and its control surface
//! - [`PlaybackSource`]: the synchronous consumer path
//! - [`PlaybackHost`]: capability interface back to the host

pub mod cache;
pub mod engine;

pub use cache::{FrameCache, MemoryCache};
pub use engine::{CacheEngine, PlaybackHost, PlaybackSource};
