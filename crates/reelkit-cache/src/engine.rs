//! Directional prefetch cache engine.
//!
//! One background worker per engine keeps a sliding window of decoded
//! frames cached around a consumer-controlled playhead. The consumer
//! publishes `(speed, playhead)`; the worker re-reads both every
//! iteration and fills the cache from the reader in the direction of
//! travel. Frames are never delivered by the worker — the consumer
//! collects them through [`PlaybackSource`].
//!
//! Direction is sticky: pausing (`speed == 0`) keeps the last non-zero
//! direction, so a paused rewind keeps prefetching backwards. A
//! user-initiated seek resets the prefetch position to land on the
//! playhead at the next step; a playhead that drifts outside the
//! freshly computed window is treated as an implicit seek.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use reelkit_core::{FrameReader, ReelError, Result, Settings, SharedFrame};

use crate::cache::FrameCache;

/// Sleep while caching is disabled or capacity is insufficient.
const IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Capability interface the engine uses to reach back into its host.
///
/// Replaces a back-reference to a concrete timeline: the engine only
/// ever needs the host's preview dimensions (for byte estimates) and a
/// way to clear every cache the host owns on preroll.
pub trait PlaybackHost: Send + Sync {
    /// Preview dimensions override, when the host plays back at a
    /// reduced size. `None` means use the reader's natural dimensions.
    fn preview_dimensions(&self) -> Option<(u32, u32)> {
        None
    }

    /// Clear caches beyond the engine's own (per-clip caches etc.).
    fn clear_all(&self) {}
}

/// Background worker that fills a [`FrameCache`] around the playhead.
pub struct CacheEngine {
    cache: Arc<dyn FrameCache>,
    reader: RwLock<Option<Arc<dyn FrameReader>>>,
    host: RwLock<Option<Arc<dyn PlaybackHost>>>,
    settings: Settings,

    speed: AtomicI32,
    last_speed: AtomicI32,
    last_dir: AtomicI32,
    user_seeked: AtomicBool,
    should_exit: AtomicBool,
    running: AtomicBool,
    requested_display_frame: AtomicI64,
    cached_frame_count: AtomicI64,
    min_frames_ahead: AtomicI64,
    last_cached_index: AtomicI64,

    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CacheEngine {
    pub fn new(cache: Arc<dyn FrameCache>, settings: Settings) -> Arc<Self> {
        let min_preroll = settings.cache_min_preroll_frames;
        Arc::new(Self {
            cache,
            reader: RwLock::new(None),
            host: RwLock::new(None),
            settings,
            speed: AtomicI32::new(0),
            last_speed: AtomicI32::new(1),
            // Assume forward on first launch
            last_dir: AtomicI32::new(1),
            user_seeked: AtomicBool::new(false),
            should_exit: AtomicBool::new(false),
            running: AtomicBool::new(false),
            requested_display_frame: AtomicI64::new(1),
            cached_frame_count: AtomicI64::new(0),
            min_frames_ahead: AtomicI64::new(min_preroll),
            last_cached_index: AtomicI64::new(0),
            worker: Mutex::new(None),
        })
    }

    /// Attach the reader to prefetch from.
    pub fn set_reader(&self, reader: Arc<dyn FrameReader>) {
        *self.reader.write() = Some(reader);
    }

    /// The cache this engine fills.
    pub fn cache(&self) -> Arc<dyn FrameCache> {
        Arc::clone(&self.cache)
    }

    /// Attach the host capability (preview dimensions, clear-all).
    pub fn set_host(&self, host: Arc<dyn PlaybackHost>) {
        *self.host.write() = Some(host);
    }

    // ── Control surface ─────────────────────────────────────────

    /// Set playback speed/direction. Positive = forward, negative =
    /// rewind, zero = pause. Pausing never flips the remembered
    /// direction.
    pub fn set_speed(&self, new_speed: i32) {
        if new_speed != 0 {
            self.last_speed.store(new_speed, Ordering::Relaxed);
            self.last_dir
                .store(if new_speed > 0 { 1 } else { -1 }, Ordering::Relaxed);
        }
        self.speed.store(new_speed, Ordering::Relaxed);
    }

    pub fn speed(&self) -> i32 {
        self.speed.load(Ordering::Relaxed)
    }

    /// Move the playhead without disturbing the cache.
    pub fn seek(&self, new_position: i64) {
        self.requested_display_frame
            .store(new_position, Ordering::Relaxed);
    }

    /// Move the playhead and start a preroll: the worker resets its
    /// prefetch position, and if the target is not already cached the
    /// whole cache is cleared so the window rebuilds around it.
    pub fn seek_preroll(&self, new_position: i64) {
        self.user_seeked.store(true, Ordering::Release);
        if !self.cache.contains(new_position) {
            self.clear_everything();
        }
        self.requested_display_frame
            .store(new_position, Ordering::Relaxed);
    }

    /// True once the preroll target has been met.
    pub fn is_ready(&self) -> bool {
        self.cached_frame_count.load(Ordering::Relaxed) > self.min_frames_ahead.load(Ordering::Relaxed)
    }

    /// Start the background worker. Returns true if it is running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut slot = self.worker.lock();
        if slot.is_some() {
            return self.running.load(Ordering::Acquire);
        }
        self.should_exit.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
        let engine = Arc::clone(self);
        *slot = Some(
            std::thread::Builder::new()
                .name("video-cache".to_string())
                .spawn(move || {
                    engine.run_loop();
                    engine.running.store(false, Ordering::Release);
                })
                .expect("spawn video-cache worker"),
        );
        true
    }

    /// Signal the worker to stop and wait up to `timeout_ms`.
    /// Returns true iff the worker observed the flag and terminated
    /// within the deadline.
    pub fn stop(&self, timeout_ms: u64) -> bool {
        self.should_exit.store(true, Ordering::Release);
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        while self.running.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        true
    }

    // ── Engine internals (exposed for unit tests) ───────────────

    /// Effective playback direction (+1 or −1), preserving the last
    /// direction while paused.
    pub fn compute_direction(&self) -> i32 {
        let speed = self.speed.load(Ordering::Relaxed);
        if speed != 0 {
            if speed > 0 {
                1
            } else {
                -1
            }
        } else {
            self.last_dir.load(Ordering::Relaxed)
        }
    }

    /// Reset the prefetch position just behind the playhead so the
    /// next step lands on it.
    pub fn handle_user_seek(&self, playhead: i64, dir: i32) {
        self.last_cached_index
            .store(playhead - dir as i64, Ordering::Relaxed);
    }

    /// When paused with the playhead missing from the cache, assume
    /// the consumer moved far away and drop everything. Gated by
    /// [`Settings::clear_on_pause_miss`]. Returns true if cleared.
    pub fn clear_cache_if_paused(&self, playhead: i64, paused: bool) -> bool {
        if paused && self.settings.clear_on_pause_miss && !self.cache.contains(playhead) {
            debug!(playhead, "paused with playhead missing; clearing cache");
            self.clear_everything();
            return true;
        }
        false
    }

    /// The window of frames to keep cached around the playhead:
    /// `[playhead, playhead + ahead]` forward, `[playhead − ahead,
    /// playhead]` backward, both bounds clamped into
    /// `[1, timeline_end]`.
    pub fn compute_window_bounds(
        &self,
        playhead: i64,
        dir: i32,
        ahead_count: i64,
        timeline_end: i64,
    ) -> (i64, i64) {
        let (begin, end) = if dir > 0 {
            (playhead, playhead + ahead_count)
        } else {
            (playhead - ahead_count, playhead)
        };
        let clamp = |v: i64| v.clamp(1, timeline_end.max(1));
        (clamp(begin), clamp(end))
    }

    /// Estimated bytes for one cached frame: RGBA video plus the f32
    /// audio samples that accompany it at the given rate.
    pub fn frame_bytes(width: u32, height: u32, sample_rate: u32, channels: u32, fps: f64) -> i64 {
        let video = width as i64 * height as i64 * 4;
        let audio = if fps > 0.0 {
            ((sample_rate as f64 * channels as f64 / fps) * 4.0) as i64
        } else {
            0
        };
        video + audio
    }

    /// Walk from `last_cached_index + dir` toward the far edge of the
    /// window, fetching missing frames and touching present ones.
    /// Returns true iff the window was already full (no frame added).
    ///
    /// Breaks immediately on shutdown, on a mid-batch user seek, and
    /// on the reader running out of frames.
    pub fn prefetch_window(
        &self,
        cache: &dyn FrameCache,
        window_begin: i64,
        window_end: i64,
        dir: i32,
        reader: &dyn FrameReader,
    ) -> bool {
        let mut window_full = true;
        let step = dir as i64;
        let mut next_frame = self.last_cached_index.load(Ordering::Relaxed) + step;

        while (dir > 0 && next_frame <= window_end) || (dir < 0 && next_frame >= window_begin) {
            if self.should_exit.load(Ordering::Acquire) {
                break;
            }
            // A seek requested mid-batch invalidates the rest of it
            if self.user_seeked.load(Ordering::Acquire) {
                break;
            }

            if !cache.contains(next_frame) {
                match reader.frame(next_frame) {
                    Ok(frame) => {
                        cache.add(frame);
                        self.cached_frame_count.fetch_add(1, Ordering::Relaxed);
                        window_full = false;
                    }
                    Err(ReelError::OutOfBoundsFrame { .. }) => break,
                    Err(err) => {
                        warn!(frame = next_frame, %err, "prefetch read failed");
                        break;
                    }
                }
            } else {
                cache.touch(next_frame);
            }

            self.last_cached_index.store(next_frame, Ordering::Relaxed);
            next_frame += step;
        }

        window_full
    }

    /// Prefetch position of the worker (last ordinal processed).
    pub fn last_cached_index(&self) -> i64 {
        self.last_cached_index.load(Ordering::Relaxed)
    }

    /// Clear the engine's cache and anything the host wants cleared
    /// with it.
    fn clear_everything(&self) {
        self.cache.clear();
        if let Some(host) = self.host.read().clone() {
            host.clear_all();
        }
    }

    // ── Worker loop ─────────────────────────────────────────────

    fn run_loop(&self) {
        while !self.should_exit.load(Ordering::Acquire) {
            let reader = self.reader.read().clone();
            let Some(reader) = reader else {
                std::thread::sleep(IDLE_SLEEP);
                continue;
            };
            if !self.settings.playback_caching_enabled {
                std::thread::sleep(IDLE_SLEEP);
                continue;
            }

            self.min_frames_ahead
                .store(self.settings.cache_min_preroll_frames, Ordering::Relaxed);

            let info = reader.info();
            let timeline_end = info.video_length;
            let playhead = self.requested_display_frame.load(Ordering::Relaxed);
            let paused = self.speed.load(Ordering::Relaxed) == 0;

            let dir = self.compute_direction();
            if !paused {
                self.last_dir.store(dir, Ordering::Relaxed);
            }

            // Capacity is refreshed every iteration: the preview size
            // and the cache budget can both change under us.
            let (width, height) = self
                .host
                .read()
                .as_ref()
                .and_then(|h| h.preview_dimensions())
                .unwrap_or((info.width, info.height));
            let bytes_per_frame = Self::frame_bytes(
                width,
                height,
                info.sample_rate,
                info.channels,
                info.fps.to_f64(),
            );
            let max_bytes = self.cache.max_bytes();
            let mut capacity = 0;
            if max_bytes > 0 && bytes_per_frame > 0 {
                capacity = (max_bytes / bytes_per_frame).min(self.settings.cache_max_frames);
            }

            if self.user_seeked.swap(false, Ordering::AcqRel) {
                self.handle_user_seek(playhead, dir);
            } else if !paused && capacity >= 1 {
                // Playhead may have jumped (or direction reversed)
                // without an explicit seek; a prefetch position outside
                // the fresh window means start over at the playhead.
                let base_ahead = (capacity as f64 * self.settings.cache_percent_ahead) as i64;
                let (window_begin, window_end) =
                    self.compute_window_bounds(playhead, dir, base_ahead, timeline_end);
                let index = self.last_cached_index.load(Ordering::Relaxed);
                let outside_window =
                    (dir > 0 && index > window_end) || (dir < 0 && index < window_begin);
                if outside_window {
                    trace!(index, window_begin, window_end, "prefetch position drifted");
                    self.handle_user_seek(playhead, dir);
                }
            }

            if capacity < 1 {
                std::thread::sleep(IDLE_SLEEP);
                continue;
            }
            let ahead_count = (capacity as f64 * self.settings.cache_percent_ahead) as i64;

            if self.clear_cache_if_paused(playhead, paused) {
                self.handle_user_seek(playhead, dir);
            }

            let (window_begin, window_end) =
                self.compute_window_bounds(playhead, dir, ahead_count, timeline_end);

            let window_full =
                self.prefetch_window(&*self.cache, window_begin, window_end, dir, &*reader);

            // Keep the displayed frame from aging out while paused
            if paused && window_full {
                self.cache.touch(playhead);
            }

            let fps = info.fps.to_f64();
            let sleep = if fps > 0.0 {
                Duration::from_secs_f64(1.0 / fps / 4.0)
            } else {
                IDLE_SLEEP
            };
            std::thread::sleep(sleep);
        }
    }
}

impl Drop for CacheEngine {
    fn drop(&mut self) {
        self.should_exit.store(true, Ordering::Release);
        if let Some(handle) = self.worker.get_mut().take() {
            let _ = handle.join();
        }
    }
}

/// Synchronous consumer path: serve frame `n` from the cache when
/// present, else pull it from the reader (and remember it).
pub struct PlaybackSource {
    reader: Arc<dyn FrameReader>,
    cache: Arc<dyn FrameCache>,
}

impl PlaybackSource {
    pub fn new(reader: Arc<dyn FrameReader>, cache: Arc<dyn FrameCache>) -> Self {
        Self { reader, cache }
    }

    /// Fetch a frame for display.
    pub fn frame(&self, number: i64) -> Result<SharedFrame> {
        if let Some(frame) = self.cache.get(number) {
            return Ok(frame);
        }
        let frame = self.reader.frame(number)?;
        self.cache.add(Arc::clone(&frame));
        Ok(frame)
    }
}
