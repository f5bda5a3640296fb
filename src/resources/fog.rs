//! Depth Fog Configuration

use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Height fog reconstructed from the depth texture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogSettings {
    pub enabled: bool,

    /// Fog density, `0..=3`.
    ///
    /// Default: `1.0`
    fog_density: f32,

    /// Default: white
    pub fog_color: Vec4,

    /// World-space height where the fog starts.
    pub fog_start: f32,

    /// World-space height where the fog ends.
    pub fog_end: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fog_density: 1.0,
            fog_color: Vec4::ONE,
            fog_start: 0.0,
            fog_end: 2.0,
        }
    }
}

impl FogSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn fog_density(&self) -> f32 {
        self.fog_density
    }

    pub fn set_fog_density(&mut self, density: f32) {
        self.fog_density = density.clamp(0.0, 3.0);
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.set_fog_density(self.fog_density);
        self
    }
}
