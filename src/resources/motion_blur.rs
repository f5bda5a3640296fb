//! Motion Blur Configuration

use serde::{Deserialize, Serialize};

/// Accumulation-buffer motion blur.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionBlurSettings {
    pub enabled: bool,

    /// Trail strength, `0..=0.9`. Capped below 1 so the current frame always
    /// contributes.
    ///
    /// Default: `0.5`
    blur_amount: f32,
}

impl Default for MotionBlurSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            blur_amount: 0.5,
        }
    }
}

impl MotionBlurSettings {
    pub const MAX_BLUR_AMOUNT: f32 = 0.9;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn blur_amount(&self) -> f32 {
        self.blur_amount
    }

    pub fn set_blur_amount(&mut self, amount: f32) {
        self.blur_amount = amount.clamp(0.0, Self::MAX_BLUR_AMOUNT);
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.set_blur_amount(self.blur_amount);
        self
    }
}

/// Depth-reconstruction motion blur.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthMotionBlurSettings {
    pub enabled: bool,

    /// Sample spacing along the velocity vector, `0..=1`.
    ///
    /// Default: `0.5`
    blur_size: f32,
}

impl Default for DepthMotionBlurSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            blur_size: 0.5,
        }
    }
}

impl DepthMotionBlurSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn blur_size(&self) -> f32 {
        self.blur_size
    }

    pub fn set_blur_size(&mut self, size: f32) {
        self.blur_size = size.clamp(0.0, 1.0);
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.set_blur_size(self.blur_size);
        self
    }
}
