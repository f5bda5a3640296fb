//! Bloom
//!
//! ```text
//! Source ──pass 0 (extract)──▶ A ──[pass 1, pass 2] × N──▶ A'
//! Source + _Bloom(A') ──pass 3 (composite)──▶ Destination
//! ```

use crate::renderer::device::{BufferHandle, ProgramId};
use crate::renderer::graph::{BlurPasses, PassChain};
use crate::renderer::program::ProgramBinding;
use crate::resources::bloom::BloomSettings;

use super::{FrameContext, FrameOutcome, PostEffect, render_or_pass_through};

pub struct Bloom {
    binding: ProgramBinding,
    pub settings: BloomSettings,
}

impl Bloom {
    pub const EXTRACT_PASS: u32 = 0;
    pub const BLUR_PASSES: BlurPasses = BlurPasses { first: 1, second: 2 };
    pub const COMPOSITE_PASS: u32 = 3;

    #[must_use]
    pub fn new(program: Option<ProgramId>) -> Self {
        Self {
            binding: ProgramBinding::new(program),
            settings: BloomSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: BloomSettings) -> Self {
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

impl PostEffect for Bloom {
    fn name(&self) -> &'static str {
        "Bloom"
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
        let settings = self.settings;
        render_or_pass_through(
            ctx,
            self.name(),
            &mut self.binding,
            source,
            destination,
            |material, _| {
                material
                    .params_mut()
                    .set_float("_LuminanceThreshold", settings.luminance_threshold());
                let schedule = settings.blur().schedule(Self::BLUR_PASSES);
                Ok(PassChain::bloom(&schedule, Self::EXTRACT_PASS, Self::COMPOSITE_PASS))
            },
        )
    }
}
