//! CPU Reference Backend
//!
//! A software [`RenderDevice`] that stores frame buffers as RGBA `f32` images
//! and runs programs as Rust closures. It is slow and exact, which makes it
//! the backend of choice for tests and headless tooling: every blit is
//! recorded in a history that tests can inspect afterwards.
//!
//! # Sampling
//!
//! Texture coordinates address texel centers at `(x + 0.5) / width`.
//! Out-of-range lookups clamp to the edge. Buffers sample with their own
//! [`FilterMode`]; same-size raw copies are exact texel copies.
//!
//! # Blending
//!
//! Each program pass declares a [`BlendMode`]. `AlphaBlendRgb` blends the
//! pass output over the target's current RGB using the output alpha and
//! leaves the target alpha untouched; combined with `LoadOp::Load` this is
//! how an accumulation buffer fades in new frames.

use glam::{Vec2, Vec4};
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::errors::{PostFxError, Result};
use crate::renderer::device::{
    Blit, BufferHandle, DeviceCapabilities, LoadOp, PassSelector, ProgramId, ProgramPass,
    RenderDevice,
};
use crate::resources::frame_buffer::{FilterMode, FrameBufferDesc};
use crate::resources::params::ParamSet;

// ─── Images ───────────────────────────────────────────────────────────────────

/// A frame buffer living in system memory.
#[derive(Debug, Clone)]
pub struct CpuImage {
    desc: FrameBufferDesc,
    pixels: Vec<Vec4>,
}

impl CpuImage {
    fn new(desc: FrameBufferDesc) -> Self {
        let pixels = vec![Vec4::ZERO; desc.texel_count()];
        Self { desc, pixels }
    }

    #[inline]
    #[must_use]
    pub fn desc(&self) -> &FrameBufferDesc {
        &self.desc
    }

    #[inline]
    #[must_use]
    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    #[inline]
    #[must_use]
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.desc.width as f32, 1.0 / self.desc.height as f32)
    }

    /// Texel at integer coordinates, clamped to the edges.
    #[must_use]
    pub fn texel(&self, x: i32, y: i32) -> Vec4 {
        let x = x.clamp(0, self.desc.width as i32 - 1) as usize;
        let y = y.clamp(0, self.desc.height as i32 - 1) as usize;
        self.pixels[y * self.desc.width as usize + x]
    }

    /// Samples with the image's own filter mode.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        match self.desc.filter {
            FilterMode::Nearest => self.sample_nearest(uv),
            FilterMode::Bilinear => self.sample_bilinear(uv),
        }
    }

    fn sample_nearest(&self, uv: Vec2) -> Vec4 {
        let x = (uv.x * self.desc.width as f32).floor() as i32;
        let y = (uv.y * self.desc.height as f32).floor() as i32;
        self.texel(x, y)
    }

    fn sample_bilinear(&self, uv: Vec2) -> Vec4 {
        let fx = uv.x * self.desc.width as f32 - 0.5;
        let fy = uv.y * self.desc.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);

        let top = self.texel(x0, y0).lerp(self.texel(x0 + 1, y0), tx);
        let bottom = self.texel(x0, y0 + 1).lerp(self.texel(x0 + 1, y0 + 1), tx);
        top.lerp(bottom, ty)
    }
}

// ─── Programs ─────────────────────────────────────────────────────────────────

/// How a pass output is combined with the target.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BlendMode {
    #[default]
    Replace,
    /// `rgb = src.rgb * src.a + dst.rgb * (1 - src.a)`, alpha kept.
    AlphaBlendRgb,
}

/// Everything one shaded pixel may read.
pub struct ShadeContext<'a> {
    source: &'a CpuImage,
    params: &'a ParamSet,
    images: &'a SlotMap<BufferHandle, CpuImage>,
}

impl<'a> ShadeContext<'a> {
    /// The blit's source buffer (`_MainTex`).
    #[inline]
    #[must_use]
    pub fn source(&self) -> &'a CpuImage {
        self.source
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &'a ParamSet {
        self.params
    }

    /// Float parameter, `0.0` when unset (like an unset shader property).
    #[must_use]
    pub fn float(&self, name: &str) -> f32 {
        self.params.get_float(name).unwrap_or(0.0)
    }

    /// A buffer bound as a named texture parameter.
    #[must_use]
    pub fn texture(&self, name: &str) -> Option<&'a CpuImage> {
        self.params
            .get_texture(name)
            .and_then(|handle| self.images.get(handle))
    }
}

/// A multi-pass program runnable by [`CpuDevice`].
pub trait CpuProgram {
    fn pass_count(&self) -> u32;

    fn blend(&self, _pass: u32) -> BlendMode {
        BlendMode::Replace
    }

    /// Shades one pixel of `pass` at texture coordinate `uv`.
    fn shade(&self, pass: u32, ctx: &ShadeContext<'_>, uv: Vec2) -> Vec4;
}

/// Every pass returns the source unchanged.
#[derive(Debug, Clone, Copy)]
pub struct IdentityProgram {
    pub passes: u32,
}

impl CpuProgram for IdentityProgram {
    fn pass_count(&self) -> u32 {
        self.passes
    }

    fn shade(&self, _pass: u32, ctx: &ShadeContext<'_>, uv: Vec2) -> Vec4 {
        ctx.source().sample(uv)
    }
}

/// Closure-backed program.
pub struct FnProgram<F> {
    blends: Vec<BlendMode>,
    shade: F,
}

impl<F> FnProgram<F>
where
    F: Fn(u32, &ShadeContext<'_>, Vec2) -> Vec4,
{
    pub fn new(passes: u32, shade: F) -> Self {
        Self {
            blends: vec![BlendMode::Replace; passes as usize],
            shade,
        }
    }

    #[must_use]
    pub fn with_blend(mut self, pass: u32, blend: BlendMode) -> Self {
        if let Some(slot) = self.blends.get_mut(pass as usize) {
            *slot = blend;
        }
        self
    }
}

impl<F> CpuProgram for FnProgram<F>
where
    F: Fn(u32, &ShadeContext<'_>, Vec2) -> Vec4,
{
    fn pass_count(&self) -> u32 {
        self.blends.len() as u32
    }

    fn blend(&self, pass: u32) -> BlendMode {
        self.blends.get(pass as usize).copied().unwrap_or_default()
    }

    fn shade(&self, pass: u32, ctx: &ShadeContext<'_>, uv: Vec2) -> Vec4 {
        (self.shade)(pass, ctx, uv)
    }
}

struct RegisteredProgram {
    name: String,
    program: Box<dyn CpuProgram>,
    supported: bool,
}

/// One executed blit, as seen by the device.
#[derive(Debug, Clone)]
pub struct BlitRecord {
    pub source: BufferHandle,
    pub target: BufferHandle,
    pub program: Option<ProgramPass>,
    pub load: LoadOp,
    /// Snapshot of the parameters at draw time.
    pub params: ParamSet,
}

// ─── Device ───────────────────────────────────────────────────────────────────

/// Software render device.
#[derive(Default)]
pub struct CpuDevice {
    images: SlotMap<BufferHandle, CpuImage>,
    programs: Vec<RegisteredProgram>,
    capabilities: DeviceCapabilities,
    history: Vec<BlitRecord>,
    created: usize,
    fail_after: Option<usize>,
}

impl CpuDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_capabilities(&mut self, capabilities: DeviceCapabilities) {
        self.capabilities = capabilities;
    }

    /// Registers a program and returns its id.
    pub fn register_program(
        &mut self,
        name: impl Into<String>,
        program: impl CpuProgram + 'static,
    ) -> ProgramId {
        let id = ProgramId::from_index(self.programs.len());
        self.programs.push(RegisteredProgram {
            name: name.into(),
            program: Box::new(program),
            supported: true,
        });
        id
    }

    /// Marks a program as (un)supported, emulating a shader that fails to
    /// compile on the current platform.
    pub fn set_program_supported(&mut self, program: ProgramId, supported: bool) {
        if let Some(entry) = self.programs.get_mut(program.index()) {
            entry.supported = supported;
        }
    }

    #[must_use]
    pub fn find_program(&self, name: &str) -> Option<ProgramId> {
        self.programs
            .iter()
            .position(|p| p.name == name)
            .map(ProgramId::from_index)
    }

    // ── Pixel access ────────────────────────────────────────────────────────

    #[must_use]
    pub fn image(&self, handle: BufferHandle) -> Option<&CpuImage> {
        self.images.get(handle)
    }

    #[must_use]
    pub fn pixels(&self, handle: BufferHandle) -> Option<&[Vec4]> {
        self.images.get(handle).map(CpuImage::pixels)
    }

    #[must_use]
    pub fn pixel(&self, handle: BufferHandle, x: u32, y: u32) -> Option<Vec4> {
        let image = self.images.get(handle)?;
        (x < image.desc.width && y < image.desc.height).then(|| image.texel(x as i32, y as i32))
    }

    /// Overwrites every pixel of a buffer.
    pub fn write_pixels(&mut self, handle: BufferHandle, pixels: &[Vec4]) -> Result<()> {
        let image = self
            .images
            .get_mut(handle)
            .ok_or(PostFxError::InvalidBuffer(handle))?;
        if pixels.len() != image.pixels.len() {
            return Err(PostFxError::InvalidSize {
                width: image.desc.width,
                height: image.desc.height,
            });
        }
        image.pixels.copy_from_slice(pixels);
        Ok(())
    }

    pub fn fill(&mut self, handle: BufferHandle, color: Vec4) -> Result<()> {
        let image = self
            .images
            .get_mut(handle)
            .ok_or(PostFxError::InvalidBuffer(handle))?;
        image.pixels.fill(color);
        Ok(())
    }

    /// Creates a buffer and fills it with `color`.
    pub fn create_filled(&mut self, desc: &FrameBufferDesc, color: Vec4) -> Result<BufferHandle> {
        let handle = self.create_buffer(desc)?;
        self.fill(handle, color)?;
        Ok(handle)
    }

    // ── Diagnostics ─────────────────────────────────────────────────────────

    /// Every blit executed since the last [`clear_history`](Self::clear_history).
    #[must_use]
    pub fn history(&self) -> &[BlitRecord] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Total number of buffers ever created.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Makes the blit after the next `successful` ones fail.
    pub fn fail_blit_after(&mut self, successful: usize) {
        self.fail_after = Some(successful);
    }

    // ── Blit internals ──────────────────────────────────────────────────────

    fn selected_passes(&self, selection: ProgramPass) -> Result<SmallVec<[u32; 4]>> {
        let entry = self
            .programs
            .get(selection.program.index())
            .ok_or_else(|| {
                PostFxError::ProgramUnsupported(format!("#{}", selection.program.index()))
            })?;
        if !entry.supported {
            return Err(PostFxError::ProgramUnsupported(entry.name.clone()));
        }

        let count = entry.program.pass_count();
        match selection.pass {
            PassSelector::All => Ok((0..count).collect()),
            PassSelector::Index(index) if index < count => Ok(smallvec::smallvec![index]),
            PassSelector::Index(index) => Err(PostFxError::PassOutOfRange {
                program: entry.name.clone(),
                index,
                pass_count: count,
            }),
        }
    }

    fn render_into(
        &self,
        pixels: &mut [Vec4],
        target: &FrameBufferDesc,
        blit: &Blit<'_>,
        passes: &[u32],
    ) -> Result<()> {
        let source = self
            .images
            .get(blit.source)
            .ok_or(PostFxError::InvalidBuffer(blit.source))?;

        let width = target.width as usize;
        let uv_at = |i: usize| {
            Vec2::new(
                ((i % width) as f32 + 0.5) / target.width as f32,
                ((i / width) as f32 + 0.5) / target.height as f32,
            )
        };

        match blit.program {
            None if source.desc.size() == target.size() => {
                pixels.copy_from_slice(&source.pixels);
            }
            None => {
                for (i, pixel) in pixels.iter_mut().enumerate() {
                    *pixel = source.sample(uv_at(i));
                }
            }
            Some(selection) => {
                let program = &self
                    .programs
                    .get(selection.program.index())
                    .ok_or_else(|| {
                        PostFxError::ProgramUnsupported(format!("#{}", selection.program.index()))
                    })?
                    .program;
                let empty = ParamSet::new();
                let ctx = ShadeContext {
                    source,
                    params: blit.params.unwrap_or(&empty),
                    images: &self.images,
                };

                for &pass in passes {
                    let blend = program.blend(pass);
                    for (i, pixel) in pixels.iter_mut().enumerate() {
                        let value = program.shade(pass, &ctx, uv_at(i));
                        *pixel = match blend {
                            BlendMode::Replace => value,
                            BlendMode::AlphaBlendRgb => {
                                let rgb = value.truncate() * value.w
                                    + pixel.truncate() * (1.0 - value.w);
                                rgb.extend(pixel.w)
                            }
                        };
                    }
                }
            }
        }

        if !target.format.is_hdr() {
            for pixel in pixels.iter_mut() {
                *pixel = pixel.clamp(Vec4::ZERO, Vec4::ONE);
            }
        }
        Ok(())
    }
}

impl RenderDevice for CpuDevice {
    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_buffer(&mut self, desc: &FrameBufferDesc) -> Result<BufferHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(PostFxError::InvalidSize {
                width: desc.width,
                height: desc.height,
            });
        }
        self.created += 1;
        Ok(self.images.insert(CpuImage::new(desc.clone())))
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        self.images
            .remove(handle)
            .map(|_| ())
            .ok_or(PostFxError::InvalidBuffer(handle))
    }

    fn buffer_desc(&self, handle: BufferHandle) -> Option<&FrameBufferDesc> {
        self.images.get(handle).map(CpuImage::desc)
    }

    fn set_filter_mode(&mut self, handle: BufferHandle, filter: FilterMode) -> Result<()> {
        let image = self
            .images
            .get_mut(handle)
            .ok_or(PostFxError::InvalidBuffer(handle))?;
        image.desc.filter = filter;
        Ok(())
    }

    fn program_name(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(program.index()).map(|p| p.name.as_str())
    }

    fn is_program_supported(&self, program: ProgramId) -> bool {
        self.programs
            .get(program.index())
            .is_some_and(|p| p.supported)
    }

    fn pass_count(&self, program: ProgramId) -> u32 {
        self.programs
            .get(program.index())
            .map_or(0, |p| p.program.pass_count())
    }

    fn blit(&mut self, blit: &Blit<'_>) -> Result<()> {
        if let Some(remaining) = self.fail_after.as_mut() {
            if *remaining == 0 {
                self.fail_after = None;
                return Err(PostFxError::BlitFailed("injected failure".to_string()));
            }
            *remaining -= 1;
        }

        if blit.source == blit.target {
            return Err(PostFxError::InPlaceBlit(blit.target));
        }
        if !self.images.contains_key(blit.source) {
            return Err(PostFxError::InvalidBuffer(blit.source));
        }
        if let Some(params) = blit.params {
            for (_, handle) in params.textures() {
                if handle == blit.target {
                    return Err(PostFxError::InPlaceBlit(handle));
                }
                if !self.images.contains_key(handle) {
                    return Err(PostFxError::InvalidBuffer(handle));
                }
            }
        }

        let passes = match blit.program {
            Some(selection) => self.selected_passes(selection)?,
            None => SmallVec::new(),
        };

        let target = self
            .images
            .get_mut(blit.target)
            .ok_or(PostFxError::InvalidBuffer(blit.target))?;
        let target_desc = target.desc.clone();
        let mut pixels = std::mem::take(&mut target.pixels);
        if blit.load == LoadOp::Clear {
            pixels.fill(Vec4::ZERO);
        }

        let result = self.render_into(&mut pixels, &target_desc, blit, &passes);

        if let Some(target) = self.images.get_mut(blit.target) {
            target.pixels = pixels;
        }
        result?;

        self.history.push(BlitRecord {
            source: blit.source,
            target: blit.target,
            program: blit.program,
            load: blit.load,
            params: blit.params.cloned().unwrap_or_default(),
        });
        Ok(())
    }

    fn live_buffer_count(&self) -> usize {
        self.images.len()
    }
}
