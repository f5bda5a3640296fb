//! Post-Processing Effects
//!
//! Every effect implements [`PostEffect`], the lifecycle a host drives per
//! camera:
//!
//! ```text
//! on_attach(camera)          once, may request depth textures
//! on_frame(ctx, src, dst)    every frame, always writes dst
//! on_detach(device)          once, releases cross-frame state
//! ```
//!
//! # Frame Protocol
//!
//! `on_frame` resolves the effect's program binding. When the program is
//! unavailable the source is copied to the destination unchanged. Otherwise
//! the effect pushes its parameters into the material, builds a
//! [`PassChain`] and hands it to the [`PassChainExecutor`]. Errors never
//! escape: they are logged, and the frame falls back to a pass-through copy.

pub mod bloom;
pub mod edge_detection;
pub mod edge_normals_depth;
pub mod fog;
pub mod gaussian_blur;
pub mod motion_blur;
pub mod motion_blur_depth;
pub mod stack;

pub use bloom::Bloom;
pub use edge_detection::EdgeDetection;
pub use edge_normals_depth::EdgeNormalsDepth;
pub use fog::{DepthFog, frustum_corners_ray};
pub use gaussian_blur::GaussianBlur;
pub use motion_blur::MotionBlur;
pub use motion_blur_depth::DepthMotionBlur;
pub use stack::EffectStack;

use crate::errors::Result;
use crate::renderer::camera::CameraState;
use crate::renderer::device::{BufferHandle, RenderDevice};
use crate::renderer::graph::{PassChain, PassChainExecutor, TransientBufferPool};
use crate::renderer::program::{Material, ProgramBinding};

/// Texture parameter carrying the scene depth.
pub const CAMERA_DEPTH_TEXTURE: &str = "_CameraDepthTexture";
/// Texture parameter carrying packed view-space normals + depth.
pub const CAMERA_DEPTH_NORMALS_TEXTURE: &str = "_CameraDepthNormalsTexture";

/// When in the camera's frame an effect runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InjectionPoint {
    /// After opaque geometry, before transparent objects are drawn.
    AfterOpaque,
    /// After everything has been rendered.
    #[default]
    AfterEverything,
}

/// What an effect did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The effect's chain wrote the destination.
    Applied,
    /// The destination holds an unmodified copy of the source.
    PassThrough,
    /// Not even the pass-through copy succeeded; the destination is undefined.
    Failed,
}

/// Per-frame services handed to effects by the host.
pub struct FrameContext<'a> {
    pub device: &'a mut dyn RenderDevice,
    pub pool: &'a mut TransientBufferPool,
    pub camera: &'a CameraState,
    /// Present when some attached effect requested
    /// [`DepthTextureMode::DEPTH`](crate::renderer::DepthTextureMode::DEPTH).
    pub depth_texture: Option<BufferHandle>,
    pub depth_normals_texture: Option<BufferHandle>,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        device: &'a mut dyn RenderDevice,
        pool: &'a mut TransientBufferPool,
        camera: &'a CameraState,
    ) -> Self {
        Self {
            device,
            pool,
            camera,
            depth_texture: None,
            depth_normals_texture: None,
        }
    }

    #[must_use]
    pub fn with_depth_texture(mut self, depth: BufferHandle) -> Self {
        self.depth_texture = Some(depth);
        self
    }

    #[must_use]
    pub fn with_depth_normals_texture(mut self, depth_normals: BufferHandle) -> Self {
        self.depth_normals_texture = Some(depth_normals);
        self
    }

    /// Binds (or unbinds) the camera depth texture on `material`.
    pub fn bind_depth_texture(&self, material: &mut Material) {
        match self.depth_texture {
            Some(handle) => material.params_mut().set_texture(CAMERA_DEPTH_TEXTURE, handle),
            None => {
                material.params_mut().remove(CAMERA_DEPTH_TEXTURE);
            }
        }
    }

    /// Binds (or unbinds) the camera depth + normals texture on `material`.
    pub fn bind_depth_normals_texture(&self, material: &mut Material) {
        match self.depth_normals_texture {
            Some(handle) => material
                .params_mut()
                .set_texture(CAMERA_DEPTH_NORMALS_TEXTURE, handle),
            None => {
                material.params_mut().remove(CAMERA_DEPTH_NORMALS_TEXTURE);
            }
        }
    }
}

/// A screen-space effect plugged into a camera.
pub trait PostEffect {
    fn name(&self) -> &'static str;

    fn injection_point(&self) -> InjectionPoint {
        InjectionPoint::AfterEverything
    }

    fn is_enabled(&self) -> bool {
        true
    }

    /// Runtime toggle. Switching an effect off discards its cross-frame
    /// state, so it starts over when switched back on. Effects without an
    /// enabled flag ignore this.
    fn set_enabled(&mut self, _enabled: bool) {}

    /// Called once when the effect is added to a camera.
    fn on_attach(&mut self, _camera: &mut CameraState) {}

    /// Renders `source` into `destination`. Always writes the destination
    /// unless the outcome is [`FrameOutcome::Failed`].
    fn on_frame(
        &mut self,
        ctx: &mut FrameContext<'_>,
        source: BufferHandle,
        destination: BufferHandle,
    ) -> FrameOutcome;

    /// Called once when the effect is removed or disabled.
    fn on_detach(&mut self, _device: &mut dyn RenderDevice) {}
}

/// Copies `source` to `destination`, reporting the outcome.
pub(crate) fn pass_through(
    ctx: &mut FrameContext<'_>,
    effect: &str,
    source: BufferHandle,
    destination: BufferHandle,
) -> FrameOutcome {
    match PassChainExecutor::passthrough(ctx.device, source, destination) {
        Ok(()) => FrameOutcome::PassThrough,
        Err(e) => {
            log::error!("{effect}: pass-through copy failed: {e}");
            FrameOutcome::Failed
        }
    }
}

/// Frame driver shared by every effect.
///
/// `configure` pushes the frame's parameters into the material and returns
/// the chain to execute.
pub(crate) fn render_or_pass_through<F>(
    ctx: &mut FrameContext<'_>,
    effect: &str,
    binding: &mut ProgramBinding,
    source: BufferHandle,
    destination: BufferHandle,
    configure: F,
) -> FrameOutcome
where
    F: FnOnce(&mut Material, &mut FrameContext<'_>) -> Result<PassChain>,
{
    let Some(material) = binding.resolve(&*ctx.device) else {
        return pass_through(ctx, effect, source, destination);
    };

    let result = configure(material, ctx).and_then(|chain| {
        PassChainExecutor::run(
            ctx.device,
            ctx.pool,
            &chain,
            Some(material),
            source,
            destination,
        )
    });

    match result {
        Ok(report) => {
            log::trace!(
                "{effect}: {} step(s), {} transient buffer(s)",
                report.steps,
                report.transient_buffers
            );
            FrameOutcome::Applied
        }
        Err(e) => {
            log::warn!("{effect}: {e}; falling back to pass-through");
            pass_through(ctx, effect, source, destination)
        }
    }
}
