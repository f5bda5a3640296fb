//! Render Device Abstraction
//!
//! The [`RenderDevice`] trait is the seam between the orchestration layer
//! (pool, executor, effects) and the graphics backend. It exposes exactly what
//! the image-effect protocol needs from a host engine:
//!
//! - frame buffer creation / destruction
//! - multi-pass program lookup and platform support queries
//! - a single full-screen [`blit`](RenderDevice::blit) primitive, either a raw
//!   copy/resample or one (or all) passes of a program
//!
//! Two implementations ship with the crate:
//! [`CpuDevice`](crate::renderer::backend::CpuDevice) (software reference) and
//! [`WgpuDevice`](crate::renderer::backend::WgpuDevice).

use slotmap::new_key_type;

use crate::errors::Result;
use crate::resources::frame_buffer::{FilterMode, FrameBufferDesc};
use crate::resources::params::ParamSet;

new_key_type! {
    /// Handle to a frame buffer owned by a [`RenderDevice`].
    ///
    /// Handles are generational: once the buffer is destroyed, the handle is
    /// rejected by the device instead of aliasing a newer buffer.
    pub struct BufferHandle;
}

/// Handle to a multi-pass program registered with a device.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProgramId(u32);

impl ProgramId {
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which pass(es) of a program a blit draws.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PassSelector {
    /// A single pass by index.
    Index(u32),
    /// Every pass in declaration order, each reading the same source and
    /// writing the same target.
    All,
}

/// What happens to the target's previous contents before a blit.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LoadOp {
    /// Target is cleared to transparent black.
    #[default]
    Clear,
    /// Previous contents are preserved and visible to blending.
    Load,
}

impl LoadOp {
    /// Picks the load op honouring the target's restore-expected flag.
    #[inline]
    #[must_use]
    pub fn for_target(desc: &FrameBufferDesc) -> Self {
        if desc.restore_expected {
            Self::Load
        } else {
            Self::Clear
        }
    }
}

/// Program + pass selection for a blit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProgramPass {
    pub program: ProgramId,
    pub pass: PassSelector,
}

/// A single full-screen pass from `source` to `target`.
///
/// When `program` is `None` the blit is a raw copy (resampled with the
/// source's filter mode when sizes differ) and `params` are ignored.
#[derive(Clone, Copy, Debug)]
pub struct Blit<'a> {
    pub source: BufferHandle,
    pub target: BufferHandle,
    pub program: Option<ProgramPass>,
    pub params: Option<&'a ParamSet>,
    pub load: LoadOp,
}

impl<'a> Blit<'a> {
    /// Raw copy from `source` to `target`.
    #[must_use]
    pub fn copy(source: BufferHandle, target: BufferHandle) -> Self {
        Self {
            source,
            target,
            program: None,
            params: None,
            load: LoadOp::Clear,
        }
    }

    /// Program pass from `source` to `target`.
    #[must_use]
    pub fn pass(
        source: BufferHandle,
        target: BufferHandle,
        program: ProgramId,
        pass: PassSelector,
        params: &'a ParamSet,
    ) -> Self {
        Self {
            source,
            target,
            program: Some(ProgramPass { program, pass }),
            params: Some(params),
            load: LoadOp::Clear,
        }
    }

    #[must_use]
    pub fn with_load(mut self, load: LoadOp) -> Self {
        self.load = load;
        self
    }
}

/// Platform features the image-effect protocol depends on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DeviceCapabilities {
    pub image_effects: bool,
    pub render_targets: bool,
}

impl DeviceCapabilities {
    pub const FULL: Self = Self {
        image_effects: true,
        render_targets: true,
    };

    #[inline]
    #[must_use]
    pub fn supports_post_effects(&self) -> bool {
        self.image_effects && self.render_targets
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self::FULL
    }
}

/// Graphics backend interface used by every effect.
///
/// All calls are synchronous and issued from the host's render thread; a
/// device is never shared between concurrently running effects.
pub trait RenderDevice {
    /// Platform capability report.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Allocates a new frame buffer.
    fn create_buffer(&mut self, desc: &FrameBufferDesc) -> Result<BufferHandle>;

    /// Destroys a frame buffer. The handle becomes invalid immediately.
    fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<()>;

    /// Returns the descriptor of a live buffer.
    fn buffer_desc(&self, handle: BufferHandle) -> Option<&FrameBufferDesc>;

    /// Changes the sampling filter of a live buffer.
    fn set_filter_mode(&mut self, handle: BufferHandle, filter: FilterMode) -> Result<()>;

    /// Name of a registered program.
    fn program_name(&self, program: ProgramId) -> Option<&str>;

    /// Whether the program exists and can run on this device.
    fn is_program_supported(&self, program: ProgramId) -> bool;

    /// Number of passes exposed by the program (0 if unknown).
    fn pass_count(&self, program: ProgramId) -> u32;

    /// Executes a single full-screen pass.
    fn blit(&mut self, blit: &Blit<'_>) -> Result<()>;

    /// Number of buffers currently alive on the device.
    fn live_buffer_count(&self) -> usize;
}
