//! Depth + Normals Edge Detection
//!
//! Roberts cross over the camera's depth-normals texture. Runs right after
//! opaque geometry so transparent objects are not outlined.

use crate::renderer::camera::{CameraState, DepthTextureMode};
use crate::renderer::device::{BufferHandle, ProgramId};
use crate::renderer::graph::PassChain;
use crate::renderer::program::ProgramBinding;
use crate::resources::edge_detection::EdgeNormalsDepthSettings;

use super::edge_detection::push_edge_params;
use super::{FrameContext, FrameOutcome, InjectionPoint, PostEffect, render_or_pass_through};

pub struct EdgeNormalsDepth {
    binding: ProgramBinding,
    pub settings: EdgeNormalsDepthSettings,
}

impl EdgeNormalsDepth {
    #[must_use]
    pub fn new(program: Option<ProgramId>) -> Self {
        Self {
            binding: ProgramBinding::new(program),
            settings: EdgeNormalsDepthSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EdgeNormalsDepthSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl PostEffect for EdgeNormalsDepth {
    fn name(&self) -> &'static str {
        "EdgeNormalsDepth"
    }

    fn injection_point(&self) -> InjectionPoint {
        InjectionPoint::AfterOpaque
    }

    fn is_enabled(&self) -> bool {
        self.settings.edges.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.settings.edges.enabled = enabled;
    }

    fn on_attach(&mut self, camera: &mut CameraState) {
        camera.depth_texture_mode |= DepthTextureMode::DEPTH_NORMALS;
    }

    fn on_frame(
        &mut self,
        ctx: &mut FrameContext<'_>,
        source: BufferHandle,
        destination: BufferHandle,
    ) -> FrameOutcome {
        let settings = self.settings;
        render_or_pass_through(
            ctx,
            self.name(),
            &mut self.binding,
            source,
            destination,
            |material, ctx| {
                push_edge_params(material, &settings.edges);
                let params = material.params_mut();
                params.set_float("_SampleDistance", settings.sample_distance);
                params.set_vector("_Sensitivity", settings.sensitivity());
                ctx.bind_depth_normals_texture(material);
                Ok(PassChain::single_pass(0))
            },
        )
    }
}
