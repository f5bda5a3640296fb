//! Shared fixtures for the integration tests: CPU programs standing in for
//! the effect shaders, and frame helpers.

#![allow(dead_code)]

use glam::{Vec2, Vec4};

use myth_postfx::renderer::backend::{BlendMode, CpuDevice, FnProgram, IdentityProgram};
use myth_postfx::renderer::{BufferHandle, ProgramId, RenderDevice};
use myth_postfx::resources::{FrameBufferDesc, PixelFormat};

pub const EPSILON: f32 = 1e-4;

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

pub fn approx_vec4(a: Vec4, b: Vec4) -> bool {
    (a - b).abs().max_element() < EPSILON
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn hdr_desc(width: u32, height: u32) -> FrameBufferDesc {
    FrameBufferDesc::new(width, height, PixelFormat::Rgba16Float)
}

/// Source frame with a distinct value in every pixel.
pub fn gradient_frame(device: &mut CpuDevice, width: u32, height: u32) -> BufferHandle {
    let handle = device.create_buffer(&hdr_desc(width, height)).unwrap();
    let pixels: Vec<Vec4> = (0..width * height)
        .map(|i| {
            let x = (i % width) as f32 / width as f32;
            let y = (i / width) as f32 / height as f32;
            Vec4::new(x, y, x * y + 0.5, 1.0)
        })
        .collect();
    device.write_pixels(handle, &pixels).unwrap();
    handle
}

pub fn solid_frame(device: &mut CpuDevice, width: u32, height: u32, color: Vec4) -> BufferHandle {
    device.create_filled(&hdr_desc(width, height), color).unwrap()
}

pub fn empty_frame(device: &mut CpuDevice, width: u32, height: u32) -> BufferHandle {
    device.create_buffer(&hdr_desc(width, height)).unwrap()
}

pub fn assert_same_pixels(device: &CpuDevice, a: BufferHandle, b: BufferHandle) {
    let pa = device.pixels(a).unwrap();
    let pb = device.pixels(b).unwrap();
    assert_eq!(pa.len(), pb.len(), "buffers differ in size");
    for (i, (x, y)) in pa.iter().zip(pb).enumerate() {
        assert!(approx_vec4(*x, *y), "pixel {i} differs: {x} vs {y}");
    }
}

/// Four passes: bright-pass extract, two blur passes, additive composite.
pub fn register_bloom_program(device: &mut CpuDevice) -> ProgramId {
    device.register_program(
        "Bloom",
        FnProgram::new(4, |pass, ctx, uv| {
            let color = ctx.source().sample(uv);
            match pass {
                0 => {
                    let threshold = ctx.float("_LuminanceThreshold");
                    (color - Vec4::splat(threshold)).max(Vec4::ZERO)
                }
                1 | 2 => color,
                _ => {
                    let bloom = ctx.texture("_Bloom").map_or(Vec4::ZERO, |b| b.sample(uv));
                    color + bloom
                }
            }
        }),
    )
}

/// Separable 3-tap box blur: pass 0 horizontal, pass 1 vertical, spread
/// scaled by `_BlurSize`.
pub fn register_blur_program(device: &mut CpuDevice) -> ProgramId {
    device.register_program(
        "GaussianBlur",
        FnProgram::new(2, |pass, ctx, uv| {
            let source = ctx.source();
            let step = source.texel_size() * ctx.float("_BlurSize");
            let offset = if pass == 0 {
                Vec2::new(step.x, 0.0)
            } else {
                Vec2::new(0.0, step.y)
            };
            (source.sample(uv - offset) + source.sample(uv) + source.sample(uv + offset)) / 3.0
        }),
    )
}

/// Single blended pass writing `(source.rgb, _BlurAmount)`.
pub fn register_accumulation_program(device: &mut CpuDevice) -> ProgramId {
    device.register_program(
        "MotionBlur",
        FnProgram::new(1, |_, ctx, uv| {
            ctx.source().sample(uv).truncate().extend(ctx.float("_BlurAmount"))
        })
        .with_blend(0, BlendMode::AlphaBlendRgb),
    )
}

/// Adds 0.1 to every channel.
pub fn register_brighten_program(device: &mut CpuDevice) -> ProgramId {
    device.register_program(
        "Brighten",
        FnProgram::new(1, |_, ctx, uv| ctx.source().sample(uv) + Vec4::splat(0.1)),
    )
}

pub fn register_identity_program(device: &mut CpuDevice, name: &str) -> ProgramId {
    device.register_program(name, IdentityProgram { passes: 1 })
}
