//! Iterated Blur Configuration
//!
//! Shared by [`GaussianBlur`](crate::effects::GaussianBlur) and, through
//! [`BloomSettings`](super::bloom::BloomSettings), by bloom.

use serde::{Deserialize, Serialize};

use crate::renderer::graph::{BlurPasses, BlurSchedule};

/// Parameters of the downsample + N × double-pass blur.
///
/// # Usage
///
/// ```rust,ignore
/// let mut blur = BlurSettings::new();
/// blur.set_iterations(2);
/// blur.set_down_sample(4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurSettings {
    /// Number of blur iterations, `0..=4`.
    ///
    /// Default: `3`
    iterations: u32,

    /// Kernel spread increase per iteration, `0.2..=3.0`.
    ///
    /// Default: `0.6`
    blur_spread: f32,

    /// Integer buffer size divisor, `1..=8`.
    ///
    /// Default: `2`
    down_sample: u32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            iterations: 3,
            blur_spread: 0.6,
            down_sample: 2,
        }
    }
}

impl BlurSettings {
    pub const MAX_ITERATIONS: u32 = 4;
    pub const MAX_DOWN_SAMPLE: u32 = 8;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    #[inline]
    #[must_use]
    pub fn blur_spread(&self) -> f32 {
        self.blur_spread
    }

    #[inline]
    #[must_use]
    pub fn down_sample(&self) -> u32 {
        self.down_sample
    }

    pub fn set_iterations(&mut self, iterations: u32) {
        self.iterations = iterations.min(Self::MAX_ITERATIONS);
    }

    pub fn set_blur_spread(&mut self, blur_spread: f32) {
        self.blur_spread = blur_spread.clamp(0.2, 3.0);
    }

    pub fn set_down_sample(&mut self, down_sample: u32) {
        self.down_sample = down_sample.clamp(1, Self::MAX_DOWN_SAMPLE);
    }

    /// Re-applies every range, e.g. after deserialization.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.set_iterations(self.iterations);
        self.set_blur_spread(self.blur_spread);
        self.set_down_sample(self.down_sample);
        self
    }

    /// Blur schedule drawing `passes` for each iteration.
    #[must_use]
    pub fn schedule(&self, passes: BlurPasses) -> BlurSchedule {
        BlurSchedule {
            iterations: self.iterations,
            blur_spread: self.blur_spread,
            down_sample: self.down_sample,
            passes,
        }
    }
}

/// Gaussian blur effect configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianBlurSettings {
    pub enabled: bool,

    #[serde(flatten)]
    pub blur: BlurSettings,
}

impl Default for GaussianBlurSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            blur: BlurSettings::default(),
        }
    }
}

impl GaussianBlurSettings {
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.blur = self.blur.clamped();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp_to_inspector_ranges() {
        let mut blur = BlurSettings::new();
        blur.set_iterations(10);
        blur.set_blur_spread(0.0);
        blur.set_down_sample(0);
        assert_eq!(blur.iterations(), 4);
        assert!((blur.blur_spread() - 0.2).abs() < 1e-6);
        assert_eq!(blur.down_sample(), 1);

        blur.set_down_sample(32);
        blur.set_blur_spread(9.0);
        assert_eq!(blur.down_sample(), 8);
        assert!((blur.blur_spread() - 3.0).abs() < 1e-6);
    }
}
