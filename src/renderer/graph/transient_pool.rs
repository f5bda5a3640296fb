//! Transient Buffer Pool
//!
//! Provides scratch frame buffers for the duration of one effect invocation.
//! Passes acquire buffers while a chain runs and release each one as soon as
//! its last reader has executed. Released buffers go back to a free list and
//! are handed out again, in this frame or a later one.
//!
//! # Design
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              TransientBufferPool                    │
//! │                                                     │
//! │  active: {BufferHandle → Key}                       │
//! │  free:   HashMap<Key, Vec<PooledBuffer>>            │
//! │                                                     │
//! │  acquire() → BufferHandle   (during a chain)        │
//! │  release(BufferHandle)      (after last read)       │
//! │  end_frame()                (frame boundary)        │
//! │  trim(n)                    (after resizes)         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Leak Accounting
//!
//! Every acquire must be matched by exactly one release within the same
//! invocation. The pool counts both per frame ([`PoolFrameStats`]); anything
//! still active at [`end_frame`](TransientBufferPool::end_frame) is reported
//! as leaked and reclaimed so GPU memory does not grow without bound.

use rustc_hash::FxHashMap;

use crate::errors::{PostFxError, Result};
use crate::renderer::device::{BufferHandle, RenderDevice};
use crate::resources::frame_buffer::{FrameBufferDesc, PixelFormat};

// ─── Public Types ─────────────────────────────────────────────────────────────

/// Per-frame allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolFrameStats {
    /// Buffers handed out by [`TransientBufferPool::acquire`].
    pub acquires: u32,
    /// Buffers returned by [`TransientBufferPool::release`].
    pub releases: u32,
    /// Buffers that had to be created on the device (pool misses).
    pub created: u32,
    /// Highest number of simultaneously acquired buffers.
    pub peak_outstanding: u32,
    /// Buffers still acquired when the frame ended.
    pub leaked: u32,
}

impl PoolFrameStats {
    /// `true` when every acquire was matched by a release.
    #[inline]
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.acquires == self.releases && self.leaked == 0
    }
}

// ─── Internal Types ───────────────────────────────────────────────────────────

/// Recycling key. Filter mode is not part of it: it is a sampling property
/// reapplied on every acquire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct PoolKey {
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl PoolKey {
    fn from_desc(desc: &FrameBufferDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
        }
    }
}

struct PooledBuffer {
    handle: BufferHandle,
    /// Number of trims this buffer survived without being reused.
    idle_frames: u32,
}

// ─── Pool Implementation ──────────────────────────────────────────────────────

/// Frame-scoped scratch buffer pool.
///
/// # Thread Safety
///
/// The pool is not `Sync`; the host drives it from its render thread only.
#[derive(Default)]
pub struct TransientBufferPool {
    active: FxHashMap<BufferHandle, PoolKey>,
    free: FxHashMap<PoolKey, Vec<PooledBuffer>>,
    stats: PoolFrameStats,
}

impl TransientBufferPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a buffer matching `desc`.
    ///
    /// A compatible free buffer is reused if one exists; otherwise a new one
    /// is created on the device. Transient buffers are never restore-expected.
    pub fn acquire(
        &mut self,
        device: &mut dyn RenderDevice,
        desc: &FrameBufferDesc,
    ) -> Result<BufferHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(PostFxError::InvalidSize {
                width: desc.width,
                height: desc.height,
            });
        }

        let key = PoolKey::from_desc(desc);

        let mut reused = None;
        if let Some(bucket) = self.free.get_mut(&key) {
            while let Some(pooled) = bucket.pop() {
                // The device may have dropped it behind our back (device reset).
                if device.buffer_desc(pooled.handle).is_some() {
                    reused = Some(pooled.handle);
                    break;
                }
            }
        }

        let handle = if let Some(handle) = reused {
            device.set_filter_mode(handle, desc.filter)?;
            handle
        } else {
            let create_desc = desc.clone().with_restore_expected(false);
            let handle = device.create_buffer(&create_desc)?;
            log::debug!(
                "Transient pool miss: created {}x{} {:?} buffer",
                desc.width,
                desc.height,
                desc.format
            );
            self.stats.created += 1;
            handle
        };

        self.active.insert(handle, key);
        self.stats.acquires += 1;
        self.stats.peak_outstanding = self.stats.peak_outstanding.max(self.active.len() as u32);
        Ok(handle)
    }

    /// Returns an acquired buffer to the free list.
    ///
    /// Releasing a handle that is not currently acquired (double release, or
    /// a buffer that never came from this pool) is an error and leaves the
    /// pool unchanged.
    pub fn release(&mut self, handle: BufferHandle) -> Result<()> {
        let key = self
            .active
            .remove(&handle)
            .ok_or(PostFxError::NotAcquired(handle))?;
        self.free.entry(key).or_default().push(PooledBuffer {
            handle,
            idle_frames: 0,
        });
        self.stats.releases += 1;
        Ok(())
    }

    /// Whether `handle` is currently acquired from this pool.
    #[inline]
    #[must_use]
    pub fn is_acquired(&self, handle: BufferHandle) -> bool {
        self.active.contains_key(&handle)
    }

    /// Number of buffers currently acquired.
    #[inline]
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.active.len()
    }

    /// Counters for the frame in progress.
    #[inline]
    #[must_use]
    pub fn frame_stats(&self) -> PoolFrameStats {
        self.stats
    }

    // ── Frame boundary ─────────────────────────────────────────────────────

    /// Closes the current frame and returns its counters.
    ///
    /// Buffers still acquired are leaks: they are logged, reclaimed into the
    /// free list and counted in [`PoolFrameStats::leaked`].
    pub fn end_frame(&mut self) -> PoolFrameStats {
        let leaked: Vec<(BufferHandle, PoolKey)> = self.active.drain().collect();
        if !leaked.is_empty() {
            log::warn!(
                "Transient pool: {} buffer(s) were not released this frame",
                leaked.len()
            );
        }
        for (handle, key) in leaked {
            self.free.entry(key).or_default().push(PooledBuffer {
                handle,
                idle_frames: 0,
            });
            self.stats.leaked += 1;
        }

        std::mem::take(&mut self.stats)
    }

    /// Destroys free buffers that have been idle for more than
    /// `max_idle_frames` calls to `trim`.
    ///
    /// Call this periodically (e.g., after a resolution change) to avoid
    /// holding stale GPU memory.
    pub fn trim(&mut self, device: &mut dyn RenderDevice, max_idle_frames: u32) {
        for bucket in self.free.values_mut() {
            bucket.retain_mut(|t| {
                t.idle_frames += 1;
                if t.idle_frames > max_idle_frames {
                    if let Err(e) = device.destroy_buffer(t.handle) {
                        log::debug!("Transient pool trim: {e}");
                    }
                    false
                } else {
                    true
                }
            });
        }
        self.free.retain(|_, bucket| !bucket.is_empty());
    }

    /// Destroys every buffer owned by the pool, acquired or free.
    pub fn clear(&mut self, device: &mut dyn RenderDevice) {
        let handles = self
            .active
            .drain()
            .map(|(h, _)| h)
            .chain(self.free.drain().flat_map(|(_, b)| b.into_iter().map(|t| t.handle)));
        for handle in handles {
            if let Err(e) = device.destroy_buffer(handle) {
                log::debug!("Transient pool clear: {e}");
            }
        }
    }

    /// Number of buffers waiting in the free list.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    /// Returns the total number of buffers managed by the pool
    /// (both acquired and free).
    #[must_use]
    pub fn total_buffer_count(&self) -> usize {
        self.active.len() + self.free_count()
    }
}
