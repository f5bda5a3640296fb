//! Pass Chain Executor
//!
//! Runs a [`PassChain`] against a device and a transient pool.
//!
//! # Slot Lifetimes
//!
//! Each transient slot is acquired right before the first step that writes
//! it and released right after the last step that reads it, so an iterated
//! blur never keeps more than the current input/output pair alive. If any
//! step fails, every slot still held is released before the error is
//! returned: the pool always ends an invocation balanced.

use crate::errors::{PostFxError, Result};
use crate::renderer::device::{Blit, BufferHandle, LoadOp, RenderDevice};
use crate::renderer::graph::chain::{BufferRef, PassChain, PassStep, StepOp};
use crate::renderer::graph::transient_pool::TransientBufferPool;
use crate::renderer::program::Material;
use crate::resources::frame_buffer::FrameBufferDesc;

/// Summary of one chain execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainReport {
    /// Steps that issued a blit.
    pub steps: usize,
    /// Transient buffers acquired (and released) by the run.
    pub transient_buffers: usize,
}

/// Stateless chain runner.
pub struct PassChainExecutor;

impl PassChainExecutor {
    /// Executes `chain`, reading `source` and writing `destination`.
    ///
    /// `material` is required as soon as the chain contains a program step;
    /// a pure copy chain may run without one.
    pub fn run(
        device: &mut dyn RenderDevice,
        pool: &mut TransientBufferPool,
        chain: &PassChain,
        mut material: Option<&mut Material>,
        source: BufferHandle,
        destination: BufferHandle,
    ) -> Result<ChainReport> {
        chain.validate()?;

        let source_desc = device
            .buffer_desc(source)
            .cloned()
            .ok_or(PostFxError::InvalidBuffer(source))?;
        if device.buffer_desc(destination).is_none() {
            return Err(PostFxError::InvalidBuffer(destination));
        }

        let mut held: Vec<Option<BufferHandle>> = vec![None; chain.transients().len()];
        let mut report = ChainReport::default();

        let result = Self::execute_steps(
            device,
            pool,
            chain,
            &mut material,
            &source_desc,
            Endpoints {
                source,
                destination,
            },
            &mut held,
            &mut report,
        );

        // Anything still held here is either a leftover from an error or a
        // slot the lifetime analysis never released.
        for handle in held.iter_mut().filter_map(Option::take) {
            if let Err(e) = pool.release(handle) {
                log::error!("Failed to release transient buffer after chain: {e}");
            }
        }

        result.map(|()| report)
    }

    /// Copies `source` into `destination` without any program.
    pub fn passthrough(
        device: &mut dyn RenderDevice,
        source: BufferHandle,
        destination: BufferHandle,
    ) -> Result<()> {
        device.blit(&Blit::copy(source, destination))
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_steps(
        device: &mut dyn RenderDevice,
        pool: &mut TransientBufferPool,
        chain: &PassChain,
        material: &mut Option<&mut Material>,
        source_desc: &FrameBufferDesc,
        endpoints: Endpoints,
        held: &mut [Option<BufferHandle>],
        report: &mut ChainReport,
    ) -> Result<()> {
        let lifetimes = chain.slot_lifetimes();

        for (index, step) in chain.steps().iter().enumerate() {
            for (slot, lifetime) in lifetimes.iter().enumerate() {
                if lifetime.is_some_and(|l| l.first_write == index) {
                    let desc = chain.transients()[slot].resolve(source_desc);
                    held[slot] = Some(pool.acquire(device, &desc)?);
                    report.transient_buffers += 1;
                }
            }

            Self::execute_step(device, step, index, material, endpoints, held)?;
            report.steps += 1;

            for (slot, lifetime) in lifetimes.iter().enumerate() {
                if lifetime.is_some_and(|l| l.last_use == index)
                    && let Some(handle) = held[slot].take()
                {
                    pool.release(handle)?;
                }
            }
        }
        Ok(())
    }

    fn execute_step(
        device: &mut dyn RenderDevice,
        step: &PassStep,
        index: usize,
        material: &mut Option<&mut Material>,
        endpoints: Endpoints,
        held: &[Option<BufferHandle>],
    ) -> Result<()> {
        let input = endpoints.resolve(step.input, held, index)?;
        let output = endpoints.resolve(step.output, held, index)?;
        let load = device
            .buffer_desc(output)
            .map(LoadOp::for_target)
            .ok_or(PostFxError::InvalidBuffer(output))?;

        match step.op {
            StepOp::Copy => device.blit(&Blit::copy(input, output).with_load(load)),
            StepOp::Pass(pass) => {
                let material = material
                    .as_deref_mut()
                    .ok_or(PostFxError::MissingMaterial(index))?;

                material.params_mut().apply(&step.overrides);
                for &(name, buffer) in &step.textures {
                    let handle = endpoints.resolve(buffer, held, index)?;
                    material.params_mut().set_texture(name, handle);
                }

                let program = material.program();
                let result = device.blit(
                    &Blit::pass(input, output, program, pass, material.params()).with_load(load),
                );

                // Texture bindings must not outlive the buffers they point at.
                for (name, _) in &step.textures {
                    material.params_mut().remove(name);
                }
                result
            }
        }
    }
}

#[derive(Clone, Copy)]
struct Endpoints {
    source: BufferHandle,
    destination: BufferHandle,
}

impl Endpoints {
    fn resolve(
        self,
        buffer: BufferRef,
        held: &[Option<BufferHandle>],
        step: usize,
    ) -> Result<BufferHandle> {
        match buffer {
            BufferRef::Source => Ok(self.source),
            BufferRef::Destination => Ok(self.destination),
            BufferRef::Persistent(handle) => Ok(handle),
            BufferRef::Transient(slot) => held
                .get(slot.index())
                .copied()
                .flatten()
                .ok_or_else(|| PostFxError::InvalidChain {
                    step,
                    reason: format!("transient slot {} is not held", slot.index()),
                }),
        }
    }
}
