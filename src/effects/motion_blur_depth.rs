//! Depth Motion Blur
//!
//! Reconstructs each pixel's world position from depth with the inverse of
//! this frame's view-projection, reprojects it with last frame's, and blurs
//! along the resulting screen-space velocity.

use crate::renderer::camera::{CameraState, DepthTextureMode};
use crate::renderer::device::{BufferHandle, ProgramId, RenderDevice};
use crate::renderer::graph::{PassChain, PreviousViewProjection};
use crate::renderer::program::ProgramBinding;
use crate::resources::motion_blur::DepthMotionBlurSettings;

use super::{FrameContext, FrameOutcome, PostEffect, render_or_pass_through};

pub struct DepthMotionBlur {
    binding: ProgramBinding,
    previous: PreviousViewProjection,
    pub settings: DepthMotionBlurSettings,
}

impl DepthMotionBlur {
    #[must_use]
    pub fn new(program: Option<ProgramId>) -> Self {
        Self {
            binding: ProgramBinding::new(program),
            previous: PreviousViewProjection::new(),
            settings: DepthMotionBlurSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: DepthMotionBlurSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    #[must_use]
    pub fn previous_view_projection(&self) -> &PreviousViewProjection {
        &self.previous
    }
}

impl PostEffect for DepthMotionBlur {
    fn name(&self) -> &'static str {
        "DepthMotionBlur"
    }

    fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.settings.enabled && !enabled {
            self.previous.reset();
        }
        self.settings.enabled = enabled;
    }

    fn on_attach(&mut self, camera: &mut CameraState) {
        camera.depth_texture_mode |= DepthTextureMode::DEPTH;
    }

    fn on_frame(
        &mut self,
        ctx: &mut FrameContext<'_>,
        source: BufferHandle,
        destination: BufferHandle,
    ) -> FrameOutcome {
        let blur_size = self.settings.blur_size();
        let current = ctx.camera.view_projection();
        let previous = self.previous.previous_or(current);

        let outcome = render_or_pass_through(
            ctx,
            "DepthMotionBlur",
            &mut self.binding,
            source,
            destination,
            |material, ctx| {
                let params = material.params_mut();
                params.set_float("_BlurSize", blur_size);
                params.set_matrix("_PreviousViewProjectionMatrix", previous);
                params.set_matrix("_CurrentViewProjectionInverseMatrix", current.inverse());
                ctx.bind_depth_texture(material);
                Ok(PassChain::single_pass(0))
            },
        );

        // A frame that fell back to a copy never consumed `previous`.
        if outcome == FrameOutcome::Applied {
            self.previous.store(current);
        }
        outcome
    }

    fn on_detach(&mut self, _device: &mut dyn RenderDevice) {
        self.previous.reset();
    }
}
