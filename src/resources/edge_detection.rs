//! Edge Detection Configuration
//!
//! Two flavours share the color parameters:
//!
//! - [`EdgeDetectionSettings`]: Sobel filter on the color buffer
//! - [`EdgeNormalsDepthSettings`]: Roberts cross on the camera's
//!   depth + normals texture

use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Sobel edge detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDetectionSettings {
    pub enabled: bool,

    /// 0 draws edges over the scene, 1 draws edges over `background_color`.
    ///
    /// Default: `0.0`
    edge_only: f32,

    /// Default: black
    pub edge_color: Vec4,

    /// Default: white
    pub background_color: Vec4,
}

impl Default for EdgeDetectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            edge_only: 0.0,
            edge_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            background_color: Vec4::ONE,
        }
    }
}

impl EdgeDetectionSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn edge_only(&self) -> f32 {
        self.edge_only
    }

    pub fn set_edge_only(&mut self, edge_only: f32) {
        self.edge_only = edge_only.clamp(0.0, 1.0);
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.set_edge_only(self.edge_only);
        self
    }
}

/// Depth + normals edge detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeNormalsDepthSettings {
    #[serde(flatten)]
    pub edges: EdgeDetectionSettings,

    /// Sampling offset in texels; larger values draw wider outlines.
    pub sample_distance: f32,

    /// Depth difference sensitivity.
    pub sensitivity_depth: f32,

    /// Normal difference sensitivity.
    pub sensitivity_normals: f32,
}

impl Default for EdgeNormalsDepthSettings {
    fn default() -> Self {
        Self {
            edges: EdgeDetectionSettings::default(),
            sample_distance: 1.0,
            sensitivity_depth: 1.0,
            sensitivity_normals: 1.0,
        }
    }
}

impl EdgeNormalsDepthSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `(normals, depth, 0, 0)`, the layout the program reads `_Sensitivity` in.
    #[must_use]
    pub fn sensitivity(&self) -> Vec4 {
        Vec4::new(self.sensitivity_normals, self.sensitivity_depth, 0.0, 0.0)
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.edges = self.edges.clamped();
        self
    }
}
