//! Process-wide configuration.
//!
//! `Settings` is a plain value passed to whoever needs it (the cache
//! engine, hosts constructing effect pools). Thread counts default to
//! the host CPU count; the `REELKIT_DEBUG` environment variable (any
//! value) switches on diagnostic logging.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable that enables diagnostic logging when set.
pub const DEBUG_ENV_VAR: &str = "REELKIT_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Master switch for the background prefetch cache.
    pub playback_caching_enabled: bool,
    /// Frames that must be cached before playback reports ready.
    pub cache_min_preroll_frames: i64,
    /// Hard cap on cached frame count regardless of byte budget.
    pub cache_max_frames: i64,
    /// Fraction of cache capacity kept ahead of the playhead, in [0, 1].
    pub cache_percent_ahead: f64,
    /// Clear the whole cache when paused with the playhead missing.
    pub clear_on_pause_miss: bool,
    /// Worker threads for decoding.
    pub decode_threads: usize,
    /// Worker threads for per-frame effect processing.
    pub effect_threads: usize,
    /// Diagnostic logging requested (set from the environment).
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            playback_caching_enabled: true,
            cache_min_preroll_frames: 4,
            cache_max_frames: 30,
            cache_percent_ahead: 0.7,
            clear_on_pause_miss: true,
            decode_threads: cpus,
            effect_threads: cpus,
            debug: false,
        }
    }
}

impl Settings {
    /// Defaults adjusted by the process environment.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if std::env::var_os(DEBUG_ENV_VAR).is_some() {
            settings.debug = true;
            debug!("diagnostic logging enabled via {}", DEBUG_ENV_VAR);
        }
        settings
    }
}
