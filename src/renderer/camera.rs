//! Camera State
//!
//! Per-frame camera description handed to effects by the host. Effects never
//! look the camera up themselves; everything they need travels in
//! [`CameraState`] through the [`FrameContext`](crate::effects::FrameContext).

use bitflags::bitflags;
use glam::{Mat4, Vec3};

bitflags! {
    /// Auxiliary camera textures an effect asks the host to render.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct DepthTextureMode: u32 {
        /// Scene depth (`_CameraDepthTexture`).
        const DEPTH         = 1 << 0;
        /// Packed view-space normals + depth (`_CameraDepthNormalsTexture`).
        const DEPTH_NORMALS = 1 << 1;
    }
}

/// Snapshot of the rendering camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraState {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    /// Width / height.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// World-to-camera transform (right-handed, camera looks down -Z).
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    /// Auxiliary textures requested by attached effects.
    pub depth_texture_mode: DepthTextureMode,
}

impl Default for CameraState {
    fn default() -> Self {
        Self::new_perspective(60.0, 16.0 / 9.0, 0.3, 1000.0)
    }
}

impl CameraState {
    /// Perspective camera at the origin looking down -Z.
    #[must_use]
    pub fn new_perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y,
            aspect,
            near,
            far,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::perspective_rh(fov_y.to_radians(), aspect, near, far),
            depth_texture_mode: DepthTextureMode::empty(),
        }
    }

    /// Places the camera at `eye` looking at `target`.
    #[must_use]
    pub fn looking_at(mut self, eye: Vec3, target: Vec3, up: Vec3) -> Self {
        self.view_matrix = Mat4::look_at_rh(eye, target, up);
        self
    }

    /// Recomputes the projection after changing fov / aspect / clip planes.
    pub fn update_projection(&mut self) {
        self.projection_matrix =
            Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.near, self.far);
    }

    /// Camera-to-world transform.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> Mat4 {
        self.view_matrix.inverse()
    }

    /// World-space right axis.
    #[must_use]
    pub fn right(&self) -> Vec3 {
        self.world_matrix().x_axis.truncate().normalize()
    }

    /// World-space up axis.
    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.world_matrix().y_axis.truncate().normalize()
    }

    /// World-space viewing direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        -self.world_matrix().z_axis.truncate().normalize()
    }

    /// `projection * view` for the current frame.
    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }
}
