//! Shader Program Binding
//!
//! Resolves a multi-pass program into a ready-to-use [`Material`] once and
//! caches it, so per-frame use never reallocates.
//!
//! # Resolution Rules
//!
//! | Situation                                   | Result                 |
//! |---------------------------------------------|------------------------|
//! | No program assigned                         | Unavailable            |
//! | Device lacks image effects / render targets | Unavailable            |
//! | Program unsupported on this device          | Unavailable            |
//! | Cached material already wraps the program   | Cached material        |
//! | Otherwise                                   | New material (1 alloc) |
//!
//! Unavailable always means the effect falls back to a pass-through copy.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::renderer::device::{ProgramId, RenderDevice};
use crate::resources::params::ParamSet;

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// A parameter-carrying instance bound to one program.
#[derive(Debug)]
pub struct Material {
    id: u64,
    program: ProgramId,
    params: ParamSet,
    persistent: bool,
}

impl Material {
    fn new(program: ProgramId) -> Self {
        Self {
            id: NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed),
            program,
            params: ParamSet::new(),
            // Runtime-only: the host must not save or serialize it.
            persistent: false,
        }
    }

    /// Process-wide unique identity of this allocation.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> ProgramId {
        self.program
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    #[inline]
    pub fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    /// Whether the host should persist this material. Always `false`.
    #[inline]
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

/// Lazily created, cached material for one effect instance.
#[derive(Debug, Default)]
pub struct ProgramBinding {
    program: Option<ProgramId>,
    material: Option<Material>,
    allocations: u32,
    warned: bool,
}

impl ProgramBinding {
    #[must_use]
    pub fn new(program: Option<ProgramId>) -> Self {
        Self {
            program,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Assigns a different program. The cached material is dropped when the
    /// program actually changes and rebuilt on the next [`resolve`](Self::resolve).
    pub fn set_program(&mut self, program: Option<ProgramId>) {
        if self.program != program {
            self.program = program;
            self.material = None;
            self.warned = false;
        }
    }

    /// Resolves the material for this frame, or `None` when unavailable.
    pub fn resolve(&mut self, device: &dyn RenderDevice) -> Option<&mut Material> {
        let program = self.program?;

        if !device.capabilities().supports_post_effects() {
            if !self.warned {
                log::warn!("This platform does not support image effects or render textures.");
                self.warned = true;
            }
            self.material = None;
            return None;
        }

        if !device.is_program_supported(program) {
            if !self.warned {
                log::warn!(
                    "Program '{}' is not supported on this device, effect disabled",
                    device.program_name(program).unwrap_or("<unknown>")
                );
                self.warned = true;
            }
            self.material = None;
            return None;
        }

        // Available again: a later failure is worth a new warning.
        self.warned = false;

        let cache_hit = self
            .material
            .as_ref()
            .is_some_and(|m| m.program() == program);

        if !cache_hit {
            log::debug!(
                "Creating material for program '{}'",
                device.program_name(program).unwrap_or("<unknown>")
            );
            self.material = Some(Material::new(program));
            self.allocations += 1;
        }

        self.material.as_mut()
    }

    /// The cached material, without resolving.
    #[must_use]
    pub fn material(&self) -> Option<&Material> {
        self.material.as_ref()
    }

    /// ID of the currently cached material, if any.
    #[must_use]
    pub fn material_id(&self) -> Option<u64> {
        self.material.as_ref().map(Material::id)
    }

    /// Number of materials created over the binding's lifetime.
    #[must_use]
    pub fn allocation_count(&self) -> u32 {
        self.allocations
    }

    /// Drops the cached material.
    pub fn invalidate(&mut self) {
        self.material = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::backend::cpu::{CpuDevice, IdentityProgram};
    use crate::renderer::device::DeviceCapabilities;

    #[test]
    fn warning_rearms_after_recovery() {
        let mut device = CpuDevice::new();
        let program = device.register_program("Identity", IdentityProgram { passes: 1 });
        let mut binding = ProgramBinding::new(Some(program));

        device.set_program_supported(program, false);
        assert!(binding.resolve(&device).is_none());
        assert!(binding.warned);

        device.set_program_supported(program, true);
        assert!(binding.resolve(&device).is_some());
        assert!(!binding.warned);

        device.set_capabilities(DeviceCapabilities {
            image_effects: true,
            render_targets: false,
        });
        assert!(binding.resolve(&device).is_none());
        assert!(binding.warned, "second failure warns again");
    }
}
