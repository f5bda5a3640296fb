//! Pass Chains
//!
//! A [`PassChain`] is an ordered list of [`PassStep`]s plus the transient
//! buffer slots they exchange data through. Chains are plain data: effects
//! build one per frame and hand it to the
//! [`PassChainExecutor`](super::executor::PassChainExecutor).
//!
//! # Canonical Topologies
//!
//! ```text
//! single pass:     Source ──pass k──▶ Destination
//!
//! bloom:           Source ──pass 0──▶ A₀ ─┬─pass 1──▶ A₁ ──pass 2──▶ A₂ ─ … ─▶ Aₙ
//!                                         │                                   │ (_Bloom)
//!                  Source ───────────────────────────────────pass 3──────────┴──▶ Destination
//!
//! iterative blur:  Source ──copy(↓)──▶ A₀ ──pass 0──▶ A₁ ─ … ─▶ Aₙ ──all──▶ Destination
//! ```
//!
//! Every blur sub-pass writes a fresh slot; the executor derives when each
//! slot is acquired and released from the step order alone.

use smallvec::SmallVec;

use crate::errors::{PostFxError, Result};
use crate::renderer::device::{BufferHandle, PassSelector};
use crate::resources::frame_buffer::{FilterMode, FrameBufferDesc};
use crate::resources::params::ParamSet;

/// Material parameter driving the separable blur kernel spread.
pub const BLUR_SIZE_PARAM: &str = "_BlurSize";
/// Texture parameter the bloom composite samples the blurred highlights from.
pub const BLOOM_TEXTURE_PARAM: &str = "_Bloom";

// ─── Buffer References ────────────────────────────────────────────────────────

/// Index of a transient buffer declared on a chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TransientSlot(u16);

impl TransientSlot {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A buffer as seen from inside a chain.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BufferRef {
    /// The host's source frame (read-only).
    Source,
    /// The host's destination frame.
    Destination,
    /// A scratch buffer owned by the transient pool for this invocation.
    Transient(TransientSlot),
    /// A buffer that outlives the invocation (e.g. an accumulation buffer).
    Persistent(BufferHandle),
}

/// Size / filter recipe for a transient slot, relative to the source frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TransientDesc {
    pub down_sample: u32,
    pub filter: FilterMode,
    pub label: &'static str,
}

impl TransientDesc {
    #[must_use]
    pub fn scaled(down_sample: u32, filter: FilterMode, label: &'static str) -> Self {
        Self {
            down_sample,
            filter,
            label,
        }
    }

    /// Concrete descriptor for a given source frame.
    #[must_use]
    pub fn resolve(&self, source: &FrameBufferDesc) -> FrameBufferDesc {
        source
            .downsampled(self.down_sample)
            .with_filter(self.filter)
            .with_label(self.label)
            .with_restore_expected(false)
    }
}

// ─── Steps ────────────────────────────────────────────────────────────────────

/// What a step does with its input.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepOp {
    /// Raw copy / resample, no material involved.
    Copy,
    /// Draw through the material's program.
    Pass(PassSelector),
}

/// One full-screen pass.
#[derive(Clone, Debug)]
pub struct PassStep {
    pub input: BufferRef,
    pub output: BufferRef,
    pub op: StepOp,
    /// Additional buffers bound as named texture parameters for this draw.
    pub textures: SmallVec<[(&'static str, BufferRef); 2]>,
    /// Written into the material before the draw. They stay on the material
    /// afterwards, like any other parameter set on it.
    pub overrides: ParamSet,
}

impl PassStep {
    fn new(input: BufferRef, output: BufferRef, op: StepOp) -> Self {
        Self {
            input,
            output,
            op,
            textures: SmallVec::new(),
            overrides: ParamSet::new(),
        }
    }

    #[must_use]
    pub fn copy(input: BufferRef, output: BufferRef) -> Self {
        Self::new(input, output, StepOp::Copy)
    }

    #[must_use]
    pub fn pass(input: BufferRef, output: BufferRef, pass: u32) -> Self {
        Self::new(input, output, StepOp::Pass(PassSelector::Index(pass)))
    }

    #[must_use]
    pub fn all_passes(input: BufferRef, output: BufferRef) -> Self {
        Self::new(input, output, StepOp::Pass(PassSelector::All))
    }

    #[must_use]
    pub fn with_texture(mut self, name: &'static str, buffer: BufferRef) -> Self {
        self.textures.push((name, buffer));
        self
    }

    #[must_use]
    pub fn with_float(mut self, name: &'static str, value: f32) -> Self {
        self.overrides.set_float(name, value);
        self
    }

    /// Every buffer this step samples from.
    pub fn reads(&self) -> impl Iterator<Item = BufferRef> + '_ {
        std::iter::once(self.input).chain(self.textures.iter().map(|(_, b)| *b))
    }

    #[inline]
    #[must_use]
    pub fn needs_material(&self) -> bool {
        matches!(self.op, StepOp::Pass(_))
    }
}

// ─── Blur Schedule ────────────────────────────────────────────────────────────

/// The two program passes of one blur iteration.
///
/// Treated as an opaque ordered pair: the first is drawn before the second,
/// nothing more is assumed about their axes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlurPasses {
    pub first: u32,
    pub second: u32,
}

/// Parameters of the iterated double-pass blur shared by bloom and
/// Gaussian blur.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BlurSchedule {
    pub iterations: u32,
    pub blur_spread: f32,
    pub down_sample: u32,
    pub passes: BlurPasses,
}

impl BlurSchedule {
    /// Kernel spread for iteration `i`: grows linearly from 1.
    #[inline]
    #[must_use]
    pub fn blur_size(&self, iteration: u32) -> f32 {
        1.0 + iteration as f32 * self.blur_spread
    }
}

/// Lifetime of a transient slot in step indices (inclusive).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SlotLifetime {
    pub first_write: usize,
    pub last_use: usize,
}

// ─── Chain ────────────────────────────────────────────────────────────────────

/// Ordered pass list with its transient slot declarations.
#[derive(Clone, Debug, Default)]
pub struct PassChain {
    transients: Vec<TransientDesc>,
    steps: Vec<PassStep>,
}

impl PassChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new transient slot.
    pub fn transient(&mut self, desc: TransientDesc) -> BufferRef {
        let slot = TransientSlot(self.transients.len() as u16);
        self.transients.push(desc);
        BufferRef::Transient(slot)
    }

    pub fn push(&mut self, step: PassStep) -> &mut Self {
        self.steps.push(step);
        self
    }

    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[PassStep] {
        &self.steps
    }

    #[inline]
    #[must_use]
    pub fn transients(&self) -> &[TransientDesc] {
        &self.transients
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn requires_material(&self) -> bool {
        self.steps.iter().any(PassStep::needs_material)
    }

    // ── Topologies ──────────────────────────────────────────────────────────

    /// Direct copy from source to destination, no program involved.
    #[must_use]
    pub fn passthrough() -> Self {
        let mut chain = Self::new();
        chain.push(PassStep::copy(BufferRef::Source, BufferRef::Destination));
        chain
    }

    /// One program pass from source to destination.
    #[must_use]
    pub fn single_pass(pass: u32) -> Self {
        let mut chain = Self::new();
        chain.push(PassStep::pass(BufferRef::Source, BufferRef::Destination, pass));
        chain
    }

    /// Extract → blur × N → composite.
    ///
    /// `extract_pass` writes the bright regions of the source into a
    /// downsampled buffer, the blur iterations refine it, and
    /// `composite_pass` draws the source into the destination with the
    /// blurred buffer bound as `_Bloom`.
    #[must_use]
    pub fn bloom(schedule: &BlurSchedule, extract_pass: u32, composite_pass: u32) -> Self {
        let mut chain = Self::new();
        let extracted = chain.transient(TransientDesc::scaled(
            schedule.down_sample,
            FilterMode::Bilinear,
            "Bloom Extract",
        ));
        chain.push(PassStep::pass(BufferRef::Source, extracted, extract_pass));

        let blurred = chain.push_blur_iterations(extracted, schedule, "Bloom Blur");

        chain.push(
            PassStep::pass(BufferRef::Source, BufferRef::Destination, composite_pass)
                .with_texture(BLOOM_TEXTURE_PARAM, blurred),
        );
        chain
    }

    /// Downsample → blur × N → final draw through every program pass.
    #[must_use]
    pub fn iterative_blur(schedule: &BlurSchedule) -> Self {
        let mut chain = Self::new();
        let downsampled = chain.transient(TransientDesc::scaled(
            schedule.down_sample,
            FilterMode::Bilinear,
            "Blur Downsample",
        ));
        chain.push(PassStep::copy(BufferRef::Source, downsampled));

        let blurred = chain.push_blur_iterations(downsampled, schedule, "Blur Iteration");

        chain.push(PassStep::all_passes(blurred, BufferRef::Destination));
        chain
    }

    /// Appends `schedule.iterations` double sub-passes starting at `start`
    /// and returns the buffer holding the final result.
    ///
    /// With zero iterations nothing is appended and `start` is returned.
    pub fn push_blur_iterations(
        &mut self,
        start: BufferRef,
        schedule: &BlurSchedule,
        label: &'static str,
    ) -> BufferRef {
        let mut current = start;
        for i in 0..schedule.iterations {
            let desc = TransientDesc::scaled(schedule.down_sample, FilterMode::Bilinear, label);

            let first = self.transient(desc);
            self.push(
                PassStep::pass(current, first, schedule.passes.first)
                    .with_float(BLUR_SIZE_PARAM, schedule.blur_size(i)),
            );

            let second = self.transient(desc);
            self.push(PassStep::pass(first, second, schedule.passes.second));

            current = second;
        }
        current
    }

    // ── Validation ──────────────────────────────────────────────────────────

    /// Checks the data-flow invariants:
    ///
    /// - every read refers to the source, a persistent buffer, or a buffer
    ///   written by an earlier step
    /// - no step reads the buffer it writes
    /// - nothing writes the source
    /// - the destination is written at least once
    pub fn validate(&self) -> Result<()> {
        let mut written = vec![false; self.transients.len()];
        let mut destination_written = false;

        for (i, step) in self.steps.iter().enumerate() {
            for read in step.reads() {
                let available = match read {
                    BufferRef::Source | BufferRef::Persistent(_) => true,
                    BufferRef::Destination => destination_written,
                    BufferRef::Transient(slot) => {
                        *written.get(slot.index()).ok_or_else(|| unknown_slot(i, slot))?
                    }
                };
                if !available {
                    return Err(PostFxError::InvalidChain {
                        step: i,
                        reason: format!("{read:?} is read before any step writes it"),
                    });
                }
                if read == step.output {
                    return Err(PostFxError::InvalidChain {
                        step: i,
                        reason: format!("{read:?} is both read and written (in-place pass)"),
                    });
                }
            }

            match step.output {
                BufferRef::Source => {
                    return Err(PostFxError::InvalidChain {
                        step: i,
                        reason: "the source frame is read-only".to_string(),
                    });
                }
                BufferRef::Destination => destination_written = true,
                BufferRef::Transient(slot) => {
                    *written.get_mut(slot.index()).ok_or_else(|| unknown_slot(i, slot))? = true;
                }
                BufferRef::Persistent(_) => {}
            }
        }

        if !destination_written {
            return Err(PostFxError::InvalidChain {
                step: self.steps.len(),
                reason: "the destination is never written".to_string(),
            });
        }
        Ok(())
    }

    /// Acquire / release points of every slot that is actually written.
    ///
    /// Slots never written have no lifetime (`None`).
    #[must_use]
    pub fn slot_lifetimes(&self) -> Vec<Option<SlotLifetime>> {
        let mut lifetimes: Vec<Option<SlotLifetime>> = vec![None; self.transients.len()];

        for (i, step) in self.steps.iter().enumerate() {
            if let BufferRef::Transient(slot) = step.output
                && let Some(entry) = lifetimes.get_mut(slot.index())
            {
                match entry {
                    Some(lifetime) => lifetime.last_use = lifetime.last_use.max(i),
                    None => {
                        *entry = Some(SlotLifetime {
                            first_write: i,
                            last_use: i,
                        });
                    }
                }
            }
            for read in step.reads() {
                if let BufferRef::Transient(slot) = read
                    && let Some(Some(lifetime)) = lifetimes.get_mut(slot.index())
                {
                    lifetime.last_use = lifetime.last_use.max(i);
                }
            }
        }
        lifetimes
    }
}

fn unknown_slot(step: usize, slot: TransientSlot) -> PostFxError {
    PostFxError::InvalidChain {
        step,
        reason: format!("transient slot {} was never declared", slot.index()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(iterations: u32) -> BlurSchedule {
        BlurSchedule {
            iterations,
            blur_spread: 0.6,
            down_sample: 2,
            passes: BlurPasses { first: 1, second: 2 },
        }
    }

    #[test]
    fn blur_size_grows_linearly() {
        let s = schedule(4);
        assert!((s.blur_size(0) - 1.0).abs() < 1e-6);
        assert!((s.blur_size(3) - 2.8).abs() < 1e-6);
    }

    #[test]
    fn bloom_chain_shape() {
        let chain = PassChain::bloom(&schedule(3), 0, 3);
        // extract + 2 per iteration + composite
        assert_eq!(chain.len(), 1 + 2 * 3 + 1);
        assert_eq!(chain.transients().len(), 1 + 2 * 3);
        chain.validate().unwrap();

        let last = chain.steps().last().unwrap();
        assert_eq!(last.input, BufferRef::Source);
        assert_eq!(last.output, BufferRef::Destination);
        assert_eq!(last.textures[0].0, BLOOM_TEXTURE_PARAM);
    }

    #[test]
    fn bloom_without_iterations_composites_the_extraction() {
        let chain = PassChain::bloom(&schedule(0), 0, 3);
        assert_eq!(chain.len(), 2);
        let extract_out = chain.steps()[0].output;
        assert_eq!(chain.steps()[1].textures[0].1, extract_out);
        chain.validate().unwrap();
    }

    #[test]
    fn blur_iterations_only_set_size_on_first_sub_pass() {
        let chain = PassChain::iterative_blur(&schedule(2));
        let steps = chain.steps();
        assert_eq!(steps[1].overrides.get_float(BLUR_SIZE_PARAM), Some(1.0));
        assert!(steps[2].overrides.is_empty());
        assert_eq!(steps[3].overrides.get_float(BLUR_SIZE_PARAM), Some(1.6));
        assert_eq!(steps.last().unwrap().op, StepOp::Pass(PassSelector::All));
    }

    #[test]
    fn lifetimes_keep_at_most_two_blur_buffers_alive() {
        let chain = PassChain::iterative_blur(&schedule(4));
        let lifetimes = chain.slot_lifetimes();
        for step in 0..chain.len() {
            let alive = lifetimes
                .iter()
                .flatten()
                .filter(|l| l.first_write <= step && step <= l.last_use)
                .count();
            assert!(alive <= 2, "step {step} keeps {alive} buffers alive");
        }
    }

    #[test]
    fn validate_rejects_read_before_write() {
        let mut chain = PassChain::new();
        let a = chain.transient(TransientDesc::scaled(1, FilterMode::Bilinear, "a"));
        chain.push(PassStep::pass(a, BufferRef::Destination, 0));
        assert!(matches!(
            chain.validate(),
            Err(PostFxError::InvalidChain { step: 0, .. })
        ));
    }

    #[test]
    fn validate_rejects_in_place_pass() {
        let mut chain = PassChain::new();
        let a = chain.transient(TransientDesc::scaled(1, FilterMode::Bilinear, "a"));
        chain.push(PassStep::copy(BufferRef::Source, a));
        chain.push(PassStep::pass(a, a, 1));
        chain.push(PassStep::copy(a, BufferRef::Destination));
        assert!(matches!(
            chain.validate(),
            Err(PostFxError::InvalidChain { step: 1, .. })
        ));
    }

    #[test]
    fn validate_requires_destination_write() {
        let mut chain = PassChain::new();
        let a = chain.transient(TransientDesc::scaled(1, FilterMode::Bilinear, "a"));
        chain.push(PassStep::copy(BufferRef::Source, a));
        assert!(chain.validate().is_err());
        assert!(PassChain::passthrough().validate().is_ok());
    }
}
