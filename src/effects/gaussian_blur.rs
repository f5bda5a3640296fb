//! Gaussian Blur
//!
//! Downsamples the source with a raw copy, runs N double-pass blur
//! iterations (passes 0 and 1) and draws the result into the destination
//! through every pass of the program.

use crate::renderer::device::{BufferHandle, ProgramId};
use crate::renderer::graph::{BlurPasses, PassChain};
use crate::renderer::program::ProgramBinding;
use crate::resources::blur::GaussianBlurSettings;

use super::{FrameContext, FrameOutcome, PostEffect, render_or_pass_through};

pub struct GaussianBlur {
    binding: ProgramBinding,
    pub settings: GaussianBlurSettings,
}

impl GaussianBlur {
    pub const BLUR_PASSES: BlurPasses = BlurPasses { first: 0, second: 1 };

    #[must_use]
    pub fn new(program: Option<ProgramId>) -> Self {
        Self {
            binding: ProgramBinding::new(program),
            settings: GaussianBlurSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: GaussianBlurSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    #[must_use]
    pub fn binding(&self) -> &ProgramBinding {
        &self.binding
    }

    #[inline]
    pub fn binding_mut(&mut self) -> &mut ProgramBinding {
        &mut self.binding
    }
}

impl PostEffect for GaussianBlur {
    fn name(&self) -> &'static str {
        "GaussianBlur"
    }

    fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    fn on_frame(
        &mut self,
        ctx: &mut FrameContext<'_>,
        source: BufferHandle,
        destination: BufferHandle,
    ) -> FrameOutcome {
        let schedule = self.settings.blur.schedule(Self::BLUR_PASSES);
        render_or_pass_through(ctx, self.name(), &mut self.binding, source, destination, |_, _| {
            Ok(PassChain::iterative_blur(&schedule))
        })
    }
}
