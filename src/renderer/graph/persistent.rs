//! Cross-Frame State
//!
//! Per-frame invocations are otherwise stateless; the two holders here are the
//! only state an effect instance carries from one frame into the next:
//!
//! - [`AccumulationBuffer`]: a frame buffer blended with every new frame
//! - [`PreviousViewProjection`]: last frame's `projection * view`
//!
//! Both are owned by exactly one effect instance and torn down explicitly on
//! detach.

use glam::Mat4;

use crate::errors::{PostFxError, Result};
use crate::renderer::device::{Blit, BufferHandle, RenderDevice};
use crate::resources::frame_buffer::FrameBufferDesc;

// ─── Accumulation Buffer ──────────────────────────────────────────────────────

/// Persistent buffer that accumulates frames over time.
///
/// The buffer is created with `restore_expected` set: devices must load its
/// previous contents instead of clearing when it is rendered into.
#[derive(Debug, Default)]
pub struct AccumulationBuffer {
    handle: Option<BufferHandle>,
    reallocations: u32,
    stale: bool,
}

impl AccumulationBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accumulation buffer for a frame of `source`'s size.
    ///
    /// On first use, after [`invalidate`](Self::invalidate), or when the
    /// source size or format changed, the old buffer is destroyed and a new
    /// one is allocated and seeded with a copy of the current source, so
    /// accumulation restarts from the new frame.
    pub fn get_or_create(
        &mut self,
        device: &mut dyn RenderDevice,
        source: BufferHandle,
    ) -> Result<BufferHandle> {
        let source_desc = device
            .buffer_desc(source)
            .cloned()
            .ok_or(PostFxError::InvalidBuffer(source))?;

        if let Some(handle) = self.handle {
            let compatible = !self.stale
                && device.buffer_desc(handle).is_some_and(|desc| {
                    desc.size() == source_desc.size() && desc.format == source_desc.format
                });
            if compatible {
                return Ok(handle);
            }
            self.destroy(device);
        }

        let desc = FrameBufferDesc::new(source_desc.width, source_desc.height, source_desc.format)
            .with_filter(source_desc.filter)
            .with_label("Accumulation Buffer")
            .with_restore_expected(true);
        let handle = device.create_buffer(&desc)?;
        self.handle = Some(handle);
        self.stale = false;
        self.reallocations += 1;
        log::debug!(
            "Allocated accumulation buffer {}x{} ({} allocation(s) so far)",
            desc.width,
            desc.height,
            self.reallocations
        );

        device.blit(&Blit::copy(source, handle))?;
        Ok(handle)
    }

    /// Current buffer, if one is allocated.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    /// Number of allocations made over this holder's lifetime.
    #[inline]
    #[must_use]
    pub fn reallocation_count(&self) -> u32 {
        self.reallocations
    }

    /// Marks the contents as discarded without touching the device. The next
    /// [`get_or_create`](Self::get_or_create) replaces the buffer.
    pub fn invalidate(&mut self) {
        self.stale = self.handle.is_some();
    }

    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Destroys the buffer. The next [`get_or_create`](Self::get_or_create)
    /// re-seeds from the source frame.
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        self.stale = false;
        if let Some(handle) = self.handle.take()
            && let Err(e) = device.destroy_buffer(handle)
        {
            log::debug!("Accumulation buffer already gone: {e}");
        }
    }
}

// ─── Previous View-Projection ─────────────────────────────────────────────────

/// Last frame's view-projection matrix, read before it is overwritten.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreviousViewProjection {
    stored: Option<Mat4>,
}

impl PreviousViewProjection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Matrix of the previous frame.
    ///
    /// With nothing stored yet (first frame, or after [`reset`](Self::reset))
    /// the previous matrix is `current` itself, so the first frame shows no
    /// motion.
    #[inline]
    #[must_use]
    pub fn previous_or(&self, current: Mat4) -> Mat4 {
        self.stored.unwrap_or(current)
    }

    /// Records `current` as the previous matrix of the next frame. Only call
    /// this once a frame has actually been rendered with
    /// [`previous_or`](Self::previous_or).
    pub fn store(&mut self, current: Mat4) {
        self.stored = Some(current);
    }

    #[inline]
    #[must_use]
    pub fn stored(&self) -> Option<Mat4> {
        self.stored
    }

    pub fn reset(&mut self) {
        self.stored = None;
    }
}
