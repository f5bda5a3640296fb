//! Accumulation Motion Blur
//!
//! Each frame the source is blended into a persistent accumulation buffer
//! with weight `1 - blur_amount`, and the buffer is copied to the
//! destination. The buffer is never cleared between frames.

use crate::renderer::device::{BufferHandle, ProgramId, RenderDevice};
use crate::renderer::graph::{AccumulationBuffer, BufferRef, PassChain, PassStep};
use crate::renderer::program::ProgramBinding;
use crate::resources::motion_blur::MotionBlurSettings;

use super::{FrameContext, FrameOutcome, PostEffect, render_or_pass_through};

pub struct MotionBlur {
    binding: ProgramBinding,
    accumulation: AccumulationBuffer,
    pub settings: MotionBlurSettings,
}

impl MotionBlur {
    #[must_use]
    pub fn new(program: Option<ProgramId>) -> Self {
        Self {
            binding: ProgramBinding::new(program),
            accumulation: AccumulationBuffer::new(),
            settings: MotionBlurSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: MotionBlurSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    #[must_use]
    pub fn accumulation(&self) -> &AccumulationBuffer {
        &self.accumulation
    }
}

impl PostEffect for MotionBlur {
    fn name(&self) -> &'static str {
        "MotionBlur"
    }

    fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Disabling discards the accumulated history; the buffer itself is
    /// destroyed on the next frame or on detach.
    fn set_enabled(&mut self, enabled: bool) {
        if self.settings.enabled && !enabled {
            self.accumulation.invalidate();
        }
        self.settings.enabled = enabled;
    }

    fn on_frame(
        &mut self,
        ctx: &mut FrameContext<'_>,
        source: BufferHandle,
        destination: BufferHandle,
    ) -> FrameOutcome {
        let blur_amount = self.settings.blur_amount();
        let accumulation = &mut self.accumulation;
        render_or_pass_through(
            ctx,
            "MotionBlur",
            &mut self.binding,
            source,
            destination,
            |material, ctx| {
                let buffer = accumulation.get_or_create(ctx.device, source)?;
                material.params_mut().set_float("_BlurAmount", 1.0 - blur_amount);

                let mut chain = PassChain::new();
                chain
                    .push(PassStep::all_passes(BufferRef::Source, BufferRef::Persistent(buffer)))
                    .push(PassStep::copy(BufferRef::Persistent(buffer), BufferRef::Destination));
                Ok(chain)
            },
        )
    }

    fn on_detach(&mut self, device: &mut dyn RenderDevice) {
        self.accumulation.destroy(device);
    }
}
