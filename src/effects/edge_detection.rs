//! Sobel Edge Detection
//!
//! Single pass over the color buffer.

use crate::renderer::device::{BufferHandle, ProgramId};
use crate::renderer::graph::PassChain;
use crate::renderer::program::{Material, ProgramBinding};
use crate::resources::edge_detection::EdgeDetectionSettings;

use super::{FrameContext, FrameOutcome, PostEffect, render_or_pass_through};

/// Writes the color parameters shared by both edge detectors.
pub(crate) fn push_edge_params(material: &mut Material, settings: &EdgeDetectionSettings) {
    let params = material.params_mut();
    params.set_float("_EdgeOnly", settings.edge_only());
    params.set_color("_EdgeColor", settings.edge_color);
    params.set_color("_BackgroundColor", settings.background_color);
}

pub struct EdgeDetection {
    binding: ProgramBinding,
    pub settings: EdgeDetectionSettings,
}

impl EdgeDetection {
    #[must_use]
    pub fn new(program: Option<ProgramId>) -> Self {
        Self {
            binding: ProgramBinding::new(program),
            settings: EdgeDetectionSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EdgeDetectionSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    pub fn binding_mut(&mut self) -> &mut ProgramBinding {
        &mut self.binding
    }
}

impl PostEffect for EdgeDetection {
    fn name(&self) -> &'static str {
        "EdgeDetection"
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
                push_edge_params(material, &settings);
                Ok(PassChain::single_pass(0))
            },
        )
    }
}
