//! Effect Settings Document
//!
//! [`PostFxSettings`] gathers the configuration of every effect in one
//! serializable document, the way a host inspector would persist them.
//! Loading always re-applies the setter ranges, so an out-of-range value in
//! a file behaves exactly like the same value typed into a setter.
//!
//! ```json
//! {
//!   "bloom": { "iterations": 2, "luminance_threshold": 1.2 },
//!   "motion_blur": { "blur_amount": 0.8 }
//! }
//! ```
//!
//! Missing sections and fields take their defaults.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

use super::bloom::BloomSettings;
use super::blur::GaussianBlurSettings;
use super::edge_detection::{EdgeDetectionSettings, EdgeNormalsDepthSettings};
use super::fog::FogSettings;
use super::motion_blur::{DepthMotionBlurSettings, MotionBlurSettings};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostFxSettings {
    pub bloom: BloomSettings,
    pub gaussian_blur: GaussianBlurSettings,
    pub edge_detection: EdgeDetectionSettings,
    pub edge_normals_depth: EdgeNormalsDepthSettings,
    pub fog: FogSettings,
    pub motion_blur: MotionBlurSettings,
    pub depth_motion_blur: DepthMotionBlurSettings,
}

impl PostFxSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a settings document and clamps every value into range.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.clamped())
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            bloom: self.bloom.clamped(),
            gaussian_blur: self.gaussian_blur.clamped(),
            edge_detection: self.edge_detection.clamped(),
            edge_normals_depth: self.edge_normals_depth.clamped(),
            fog: self.fog.clamped(),
            motion_blur: self.motion_blur.clamped(),
            depth_motion_blur: self.depth_motion_blur.clamped(),
        }
    }
}
