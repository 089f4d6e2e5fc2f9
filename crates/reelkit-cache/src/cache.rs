//! Bounded frame cache with LRU eviction.
//!
//! The cache is the only mutable resource shared between the prefetch
//! worker and the consumer thread, so every operation is linearisable:
//! a single mutex guards the LRU map and the byte accounting together.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use reelkit_core::SharedFrame;

/// Bounded mapping from frame ordinal to frame.
///
/// `contains` must not disturb recency; `get` and `touch` do. `get`
/// returns an `Arc` handle that keeps the frame alive even if a
/// concurrent `add` evicts it immediately afterwards.
pub trait FrameCache: Send + Sync {
    /// Insert a frame, evicting least-recently-touched entries until
    /// both the byte and frame caps hold.
    fn add(&self, frame: SharedFrame);

    /// O(1) membership test. Does not touch recency.
    fn contains(&self, number: i64) -> bool;

    /// Fetch a frame, marking it most-recently-used.
    fn get(&self, number: i64) -> Option<SharedFrame>;

    /// Mark a frame most-recently-used without fetching it.
    fn touch(&self, number: i64);

    /// Remove every entry. Atomic: concurrent readers see either the
    /// old population or an empty cache.
    fn clear(&self);

    fn max_bytes(&self) -> i64;

    fn count(&self) -> i64;

    /// Bytes currently held.
    fn bytes(&self) -> i64;
}

struct Inner {
    entries: LruCache<i64, SharedFrame>,
    current_bytes: usize,
}

/// In-memory [`FrameCache`] bounded by bytes and frame count.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_bytes: usize,
}

impl MemoryCache {
    /// Create a cache bounded by `max_bytes` and `max_frames`.
    pub fn new(max_bytes: usize, max_frames: usize) -> Self {
        let capacity = NonZeroUsize::new(max_frames.max(1)).unwrap();
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                current_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Convenience for the usual shared-ownership setup.
    pub fn shared(max_bytes: usize, max_frames: usize) -> Arc<Self> {
        Arc::new(Self::new(max_bytes, max_frames))
    }
}

impl FrameCache for MemoryCache {
    fn add(&self, frame: SharedFrame) {
        let frame_bytes = frame.memory_size();
        if frame_bytes > self.max_bytes {
            // A frame the budget can never hold is dropped outright.
            return;
        }
        let mut inner = self.inner.lock();

        // Replacing an existing ordinal releases its bytes first
        if let Some(old) = inner.entries.pop(&frame.number) {
            inner.current_bytes = inner.current_bytes.saturating_sub(old.memory_size());
        }

        // The LruCache capacity enforces the frame cap on push; pop the
        // LRU entry ourselves until the byte budget holds as well.
        while inner.current_bytes + frame_bytes > self.max_bytes && !inner.entries.is_empty() {
            if let Some((_, evicted)) = inner.entries.pop_lru() {
                inner.current_bytes = inner.current_bytes.saturating_sub(evicted.memory_size());
            }
        }

        inner.current_bytes += frame_bytes;
        if let Some((_, displaced)) = inner.entries.push(frame.number, frame) {
            inner.current_bytes = inner.current_bytes.saturating_sub(displaced.memory_size());
        }
    }

    fn contains(&self, number: i64) -> bool {
        self.inner.lock().entries.peek(&number).is_some()
    }

    fn get(&self, number: i64) -> Option<SharedFrame> {
        self.inner.lock().entries.get(&number).cloned()
    }

    fn touch(&self, number: i64) {
        self.inner.lock().entries.promote(&number);
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.current_bytes = 0;
    }

    fn max_bytes(&self) -> i64 {
        self.max_bytes as i64
    }

    fn count(&self) -> i64 {
        self.inner.lock().entries.len() as i64
    }

    fn bytes(&self) -> i64 {
        self.inner.lock().current_bytes as i64
    }
}
