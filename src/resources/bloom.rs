//! Bloom Configuration
//!
//! Threshold-based bloom: bright regions above a luminance threshold are
//! extracted into a downsampled buffer, blurred with the iterated double-pass
//! blur ([`BlurSettings`]) and composited back over the source.

use serde::{Deserialize, Serialize};

use super::blur::BlurSettings;

/// Bloom configuration (pure data).
///
/// # Usage
///
/// ```rust,ignore
/// let mut bloom = BloomSettings::new();
/// bloom.set_luminance_threshold(1.2);
/// bloom.blur_mut().set_iterations(2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    /// Whether bloom is enabled.
    pub enabled: bool,

    #[serde(flatten)]
    blur: BlurSettings,

    /// Luminance above which a pixel contributes to bloom, `0..=4`.
    ///
    /// Values above 1 only make sense with HDR sources.
    ///
    /// Default: `0.6`
    luminance_threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            blur: BlurSettings::default(),
            luminance_threshold: 0.6,
        }
    }
}

impl BloomSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn blur(&self) -> &BlurSettings {
        &self.blur
    }

    #[inline]
    pub fn blur_mut(&mut self) -> &mut BlurSettings {
        &mut self.blur
    }

    #[inline]
    #[must_use]
    pub fn luminance_threshold(&self) -> f32 {
        self.luminance_threshold
    }

    pub fn set_luminance_threshold(&mut self, threshold: f32) {
        self.luminance_threshold = threshold.clamp(0.0, 4.0);
    }

    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.blur = self.blur.clamped();
        self.set_luminance_threshold(self.luminance_threshold);
        self
    }
}
