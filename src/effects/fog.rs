//! Depth Fog
//!
//! Reconstructs world positions from the depth texture using rays through
//! the four near-plane corners, and fades towards the fog color by height.

use glam::{Mat4, Vec3};

use crate::renderer::camera::{CameraState, DepthTextureMode};
use crate::renderer::device::{BufferHandle, ProgramId};
use crate::renderer::graph::PassChain;
use crate::renderer::program::ProgramBinding;
use crate::resources::fog::FogSettings;

use super::{FrameContext, FrameOutcome, PostEffect, render_or_pass_through};

/// Rays from the camera through the near-plane corners, one per row:
/// bottom-left, bottom-right, top-right, top-left (`w = 0`).
///
/// Each ray is scaled so that its component along the view direction is 1;
/// multiplying by linear eye depth yields the world-space offset from the
/// camera.
#[must_use]
pub fn frustum_corners_ray(camera: &CameraState) -> Mat4 {
    let near = camera.near;
    let half_height = near * (camera.fov_y.to_radians() * 0.5).tan();
    let forward = camera.forward();
    let to_right = camera.right() * half_height * camera.aspect;
    let to_top = camera.up() * half_height;

    let center = forward * near;
    let top_left = center + to_top - to_right;
    let scale = top_left.length() / near;
    let ray = |corner: Vec3| corner.normalize() * scale;

    let bottom_left = ray(center - to_top - to_right);
    let bottom_right = ray(center + to_right - to_top);
    let top_right = ray(center + to_right + to_top);
    let top_left = ray(top_left);

    Mat4::from_cols(
        bottom_left.extend(0.0),
        bottom_right.extend(0.0),
        top_right.extend(0.0),
        top_left.extend(0.0),
    )
    .transpose()
}

pub struct DepthFog {
    binding: ProgramBinding,
    pub settings: FogSettings,
}

impl DepthFog {
    #[must_use]
    pub fn new(program: Option<ProgramId>) -> Self {
        Self {
            binding: ProgramBinding::new(program),
            settings: FogSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: FogSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl PostEffect for DepthFog {
    fn name(&self) -> &'static str {
        "DepthFog"
    }

    fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
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
        let settings = self.settings;
        render_or_pass_through(
            ctx,
            self.name(),
            &mut self.binding,
            source,
            destination,
            |material, ctx| {
                let params = material.params_mut();
                params.set_matrix("_FrustumCornersRay", frustum_corners_ray(ctx.camera));
                params.set_float("_FogDensity", settings.fog_density());
                params.set_color("_FogColor", settings.fog_color);
                params.set_float("_FogStart", settings.fog_start);
                params.set_float("_FogEnd", settings.fog_end);
                ctx.bind_depth_texture(material);
                Ok(PassChain::single_pass(0))
            },
        )
    }
}
