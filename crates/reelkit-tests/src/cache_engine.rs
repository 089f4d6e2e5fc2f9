//! End-to-end prefetch cache engine scenarios.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reelkit_cache::{CacheEngine, FrameCache, MemoryCache, PlaybackSource};
use reelkit_core::{Fraction, FrameReader, PatternReader, Settings, SharedFrame};

fn open_reader(frames: i64) -> Arc<PatternReader> {
    let reader = Arc::new(PatternReader::new(48, 27, Fraction::new(30, 1), frames));
    reader.open().unwrap();
    reader
}

fn new_engine() -> Arc<CacheEngine> {
    let cache = MemoryCache::shared(64 << 20, 64);
    CacheEngine::new(cache, Settings::default())
}

/// Cache wrapper that fires a callback after every add, used to model
/// a consumer seeking mid-batch.
struct SeekOnAdd {
    inner: MemoryCache,
    trigger_frame: i64,
    engine: Mutex<Option<Arc<CacheEngine>>>,
}

impl SeekOnAdd {
    fn new(trigger_frame: i64) -> Self {
        Self {
            inner: MemoryCache::new(64 << 20, 64),
            trigger_frame,
            engine: Mutex::new(None),
        }
    }
}

impl FrameCache for SeekOnAdd {
    fn add(&self, frame: SharedFrame) {
        let number = frame.number;
        self.inner.add(frame);
        if number == self.trigger_frame {
            if let Some(engine) = self.engine.lock().as_ref() {
                engine.seek_preroll(self.trigger_frame);
            }
        }
    }

    fn contains(&self, number: i64) -> bool {
        self.inner.contains(number)
    }

    fn get(&self, number: i64) -> Option<SharedFrame> {
        self.inner.get(number)
    }

    fn touch(&self, number: i64) {
        self.inner.touch(number);
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn max_bytes(&self) -> i64 {
        self.inner.max_bytes()
    }

    fn count(&self) -> i64 {
        self.inner.count()
    }

    fn bytes(&self) -> i64 {
        self.inner.bytes()
    }
}

// ── Prefetch scenarios ──────────────────────────────────────────

#[test]
fn forward_prefetch_fills_then_reports_full() {
    let engine = new_engine();
    let reader = open_reader(12);
    let cache = MemoryCache::new(64 << 20, 64);

    // Fresh engine: last_cached_index = 0, so the first step lands on 1
    let full = engine.prefetch_window(&cache, 1, 5, 1, &*reader);
    assert!(!full);
    assert_eq!(engine.last_cached_index(), 5);
    for n in 1..=5 {
        assert!(cache.contains(n), "frame {n} missing");
    }

    // Second pass over the same window adds nothing
    engine.handle_user_seek(1, 1);
    assert!(engine.prefetch_window(&cache, 1, 5, 1, &*reader));
}

#[test]
fn backward_prefetch_walks_down_to_window_begin() {
    let engine = new_engine();
    let reader = open_reader(20);
    let cache = MemoryCache::new(64 << 20, 64);

    engine.handle_user_seek(15, -1); // last_cached_index = 16
    let full = engine.prefetch_window(&cache, 10, 15, -1, &*reader);
    assert!(!full);
    assert_eq!(engine.last_cached_index(), 10);
    for n in 10..=15 {
        assert!(cache.contains(n), "frame {n} missing");
    }
    assert!(!cache.contains(9));
    assert!(!cache.contains(16));
}

#[test]
fn user_seek_interrupts_prefetch_batch() {
    let cache = Arc::new(SeekOnAdd::new(23));
    let engine = CacheEngine::new(
        MemoryCache::shared(64 << 20, 64),
        Settings::default(),
    );
    *cache.engine.lock() = Some(Arc::clone(&engine));
    let reader = open_reader(40);

    engine.handle_user_seek(20, 1); // last_cached_index = 19
    let full = engine.prefetch_window(&*cache, 20, 30, 1, &*reader);

    assert!(!full);
    assert_eq!(engine.last_cached_index(), 23);
    assert!(cache.contains(23));
    assert!(!cache.contains(24));
}

#[test]
fn paused_with_missing_playhead_clears_cache() {
    let engine = new_engine();
    let cache = engine.cache();
    let reader = open_reader(50);
    cache.add(reader.frame(5).unwrap());
    cache.add(reader.frame(10).unwrap());

    assert!(engine.clear_cache_if_paused(42, true));
    assert_eq!(cache.count(), 0);

    cache.add(reader.frame(5).unwrap());
    assert!(!engine.clear_cache_if_paused(5, true));
    assert_eq!(cache.count(), 1);
    assert!(cache.contains(5));
}

#[test]
fn direction_survives_pause() {
    let engine = new_engine();
    engine.set_speed(-4);
    engine.set_speed(0);
    assert_eq!(engine.compute_direction(), -1);
    assert_eq!(engine.speed(), 0);
}

#[test]
fn window_clamped_to_timeline() {
    let engine = new_engine();
    let (wb, we) = engine.compute_window_bounds(95, 1, 20, 100);
    assert_eq!((wb, we), (95, 100));
    let (wb, we) = engine.compute_window_bounds(4, -1, 20, 100);
    assert_eq!((wb, we), (1, 4));
}

// ── Live worker ─────────────────────────────────────────────────

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn worker_prerolls_until_ready() {
    init_logging();
    let engine = new_engine();
    engine.set_reader(open_reader(200));
    assert!(engine.start());

    engine.seek_preroll(1);
    engine.set_speed(1);
    assert!(
        wait_until(Duration::from_secs(5), || engine.is_ready()),
        "engine never became ready"
    );
    let cache = engine.cache();
    assert!(cache.count() > 0);
    assert!(cache.contains(1), "playhead frame not cached");

    assert!(engine.stop(2_000));
}

#[test]
fn worker_reverses_direction_after_seek() {
    init_logging();
    let engine = new_engine();
    engine.set_reader(open_reader(300));
    assert!(engine.start());

    // Play forward briefly, then jump and rewind
    engine.set_speed(1);
    engine.seek_preroll(1);
    wait_until(Duration::from_secs(2), || engine.is_ready());

    engine.seek_preroll(200);
    engine.set_speed(-1);
    let cache = engine.cache();
    assert!(
        wait_until(Duration::from_secs(5), || cache.contains(200)
            && cache.contains(195)),
        "backward window did not fill"
    );

    assert!(engine.stop(2_000));
}

#[test]
fn consumer_path_hits_cache_after_preroll() {
    let reader = open_reader(100);
    let cache = MemoryCache::shared(64 << 20, 64);
    let engine = CacheEngine::new(cache, Settings::default());
    engine.set_reader(Arc::clone(&reader) as Arc<dyn FrameReader>);

    let source = PlaybackSource::new(reader, engine.cache());

    assert!(engine.start());
    engine.seek_preroll(10);
    engine.set_speed(1);
    wait_until(Duration::from_secs(5), || engine.is_ready());

    // The consumer collects frames regardless of cache state
    for n in 10..=14 {
        let frame = source.frame(n).unwrap();
        assert_eq!(frame.number, n);
    }

    assert!(engine.stop(2_000));
}

#[test]
fn cache_capacity_invariant_holds_under_load() {
    // Byte budget fits only a handful of frames
    let frame_bytes = 48 * 27 * 4;
    let cache = MemoryCache::shared(frame_bytes * 5, 64);
    let engine = CacheEngine::new(Arc::clone(&cache) as Arc<dyn FrameCache>, Settings::default());
    engine.set_reader(open_reader(500));

    assert!(engine.start());
    engine.set_speed(2);
    for playhead in (1..200).step_by(20) {
        engine.seek(playhead);
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.bytes() <= cache.max_bytes(), "byte budget exceeded");
        assert!(cache.count() <= 64, "frame budget exceeded");
    }
    assert!(engine.stop(2_000));
}
