//! Effect Stack
//!
//! Chains several effects on one camera and injection point, the way a host
//! runs every image-effect component attached to a camera in order:
//!
//! ```text
//! Source ──e₀──▶ A ──e₁──▶ B ──e₂──▶ A ── … ──eₙ──▶ Destination
//! ```
//!
//! Intermediates come from the transient pool (same size and format as the
//! source) and go back to it before `on_frame` returns. Disabled effects
//! are skipped; with nothing enabled the source is copied through.
//!
//! An effect switched from enabled to disabled is detached on the next frame,
//! so its cross-frame state starts over once it is enabled again.

use crate::renderer::camera::CameraState;
use crate::renderer::device::{BufferHandle, RenderDevice};
use crate::resources::frame_buffer::FrameBufferDesc;

use super::{FrameContext, FrameOutcome, InjectionPoint, PostEffect, pass_through};

pub struct EffectStack {
    injection_point: InjectionPoint,
    effects: Vec<Box<dyn PostEffect>>,
    /// `is_enabled()` of each effect as seen by the last frame.
    was_enabled: Vec<bool>,
}

impl EffectStack {
    #[must_use]
    pub fn new(injection_point: InjectionPoint) -> Self {
        Self {
            injection_point,
            effects: Vec::new(),
            was_enabled: Vec::new(),
        }
    }

    /// Appends an effect and runs its attach hook.
    ///
    /// Effects declaring a different injection point are kept but never run
    /// by this stack.
    pub fn attach(&mut self, mut effect: Box<dyn PostEffect>, camera: &mut CameraState) {
        if effect.injection_point() != self.injection_point {
            log::warn!(
                "{} runs at {:?} but was attached to a {:?} stack",
                effect.name(),
                effect.injection_point(),
                self.injection_point
            );
        }
        effect.on_attach(camera);
        self.was_enabled.push(effect.is_enabled());
        self.effects.push(effect);
    }

    /// Runs every detach hook and empties the stack.
    pub fn detach_all(&mut self, device: &mut dyn RenderDevice) {
        for mut effect in self.effects.drain(..) {
            effect.on_detach(device);
        }
        self.was_enabled.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn effects(&self) -> impl Iterator<Item = &dyn PostEffect> {
        self.effects.iter().map(AsRef::as_ref)
    }

    /// Mutable access to the attached effects, e.g. to toggle them.
    ///
    /// Disabling takes effect on the next frame, which runs the effect's
    /// detach hook.
    pub fn effects_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn PostEffect>> {
        self.effects.iter_mut()
    }

    /// Detaches every effect that went from enabled to disabled since the
    /// last frame.
    fn detach_newly_disabled(&mut self, device: &mut dyn RenderDevice) {
        for (effect, was_enabled) in self.effects.iter_mut().zip(&mut self.was_enabled) {
            let enabled = effect.is_enabled();
            if *was_enabled && !enabled {
                log::debug!("{} disabled, detaching", effect.name());
                effect.on_detach(device);
            }
            *was_enabled = enabled;
        }
    }

    fn is_active(&self, effect: &dyn PostEffect) -> bool {
        effect.is_enabled() && effect.injection_point() == self.injection_point
    }
}

impl PostEffect for EffectStack {
    fn name(&self) -> &'static str {
        "EffectStack"
    }

    fn injection_point(&self) -> InjectionPoint {
        self.injection_point
    }

    fn on_attach(&mut self, camera: &mut CameraState) {
        for effect in &mut self.effects {
            effect.on_attach(camera);
        }
    }

    fn on_frame(
        &mut self,
        ctx: &mut FrameContext<'_>,
        source: BufferHandle,
        destination: BufferHandle,
    ) -> FrameOutcome {
        self.detach_newly_disabled(ctx.device);

        let active: Vec<usize> = (0..self.effects.len())
            .filter(|&i| self.is_active(self.effects[i].as_ref()))
            .collect();

        let Some((&last, rest)) = active.split_last() else {
            return pass_through(ctx, "EffectStack", source, destination);
        };

        let Some(source_desc) = ctx.device.buffer_desc(source).cloned() else {
            log::error!("EffectStack: invalid source buffer {source:?}");
            return FrameOutcome::Failed;
        };
        let scratch_desc =
            FrameBufferDesc::new(source_desc.width, source_desc.height, source_desc.format)
                .with_filter(source_desc.filter)
                .with_label("Effect Stack Intermediate");

        // Two intermediates at most: the one being read and the one being written.
        let mut scratch: [Option<BufferHandle>; 2] = [None, None];
        let mut outcomes = Vec::with_capacity(active.len());
        let mut current = source;

        for (n, &index) in rest.iter().enumerate() {
            let slot = n % 2;
            let target = match scratch[slot] {
                Some(handle) => handle,
                None => match ctx.pool.acquire(ctx.device, &scratch_desc) {
                    Ok(handle) => *scratch[slot].insert(handle),
                    Err(e) => {
                        log::warn!("EffectStack: cannot allocate intermediate buffer: {e}");
                        break;
                    }
                },
            };
            outcomes.push(self.effects[index].on_frame(ctx, current, target));
            current = target;
        }

        outcomes.push(self.effects[last].on_frame(ctx, current, destination));

        for handle in scratch.into_iter().flatten() {
            if let Err(e) = ctx.pool.release(handle) {
                log::error!("EffectStack: {e}");
            }
        }

        if outcomes.contains(&FrameOutcome::Failed) {
            FrameOutcome::Failed
        } else if outcomes.contains(&FrameOutcome::Applied) {
            FrameOutcome::Applied
        } else {
            FrameOutcome::PassThrough
        }
    }

    fn on_detach(&mut self, device: &mut dyn RenderDevice) {
        for effect in &mut self.effects {
            effect.on_detach(device);
        }
    }
}
