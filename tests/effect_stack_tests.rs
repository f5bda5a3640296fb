//! Effect Stack Tests
//!
//! Tests for:
//! - Ordered ping-pong through several effects
//! - Skipping disabled effects and foreign injection points
//! - Attach / detach hooks forwarded to every effect
//! - Detaching effects switched off at runtime
//! - Outcome aggregation

mod common;

use glam::Vec4;

use myth_postfx::effects::{
    DepthFog, EdgeDetection, EdgeNormalsDepth, EffectStack, FrameContext, FrameOutcome,
    InjectionPoint, MotionBlur, PostEffect,
};
use myth_postfx::renderer::graph::TransientBufferPool;
use myth_postfx::renderer::{
    BufferHandle, CameraState, CpuDevice, DepthTextureMode, RenderDevice,
};
use myth_postfx::resources::MotionBlurSettings;

use common::{
    approx_vec4, assert_same_pixels, empty_frame, gradient_frame, register_accumulation_program,
    register_brighten_program, solid_frame,
};

fn brighten(device: &mut CpuDevice) -> EdgeDetection {
    let program = device
        .find_program("Brighten")
        .unwrap_or_else(|| register_brighten_program(device));
    EdgeDetection::new(Some(program))
}

fn render(
    stack: &mut EffectStack,
    device: &mut CpuDevice,
    pool: &mut TransientBufferPool,
    source: BufferHandle,
    destination: BufferHandle,
) -> FrameOutcome {
    let camera = CameraState::default();
    let mut ctx = FrameContext::new(device, pool, &camera);
    stack.on_frame(&mut ctx, source, destination)
}

fn motion_blur(device: &mut CpuDevice, amount: f32) -> MotionBlur {
    let program = register_accumulation_program(device);
    let mut settings = MotionBlurSettings::default();
    settings.set_blur_amount(amount);
    MotionBlur::new(Some(program)).with_settings(settings)
}

fn assert_brightened(
    device: &CpuDevice,
    source: BufferHandle,
    destination: BufferHandle,
    times: u32,
) {
    let offset = Vec4::splat(0.1 * times as f32);
    for (s, d) in device.pixels(source).unwrap().iter().zip(device.pixels(destination).unwrap()) {
        assert!(approx_vec4(*s + offset, *d), "expected {} got {d}", *s + offset);
    }
}

// ============================================================================
// Chaining
// ============================================================================

#[test]
fn test_effects_run_in_order_through_intermediates() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut camera = CameraState::default();
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);

    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    for _ in 0..3 {
        let effect = brighten(&mut device);
        stack.attach(Box::new(effect), &mut camera);
    }
    assert_eq!(stack.len(), 3);

    assert_eq!(render(&mut stack, &mut device, &mut pool, src, dst), FrameOutcome::Applied);
    assert_brightened(&device, src, dst, 3);

    let stats = pool.end_frame();
    assert!(stats.is_balanced());
    assert_eq!(stats.created, 2, "two intermediates suffice for any length");

    let history = device.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].source, src);
    assert_eq!(history[2].target, dst);
    assert_eq!(history[1].source, history[0].target);
    assert_eq!(history[2].source, history[1].target);
}

#[test]
fn test_single_effect_writes_destination_directly() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut camera = CameraState::default();
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);

    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    stack.attach(Box::new(brighten(&mut device)), &mut camera);

    render(&mut stack, &mut device, &mut pool, src, dst);
    assert_brightened(&device, src, dst, 1);
    assert_eq!(pool.end_frame().acquires, 0);
}

#[test]
fn test_empty_stack_copies_through() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);

    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    assert!(stack.is_empty());
    assert_eq!(render(&mut stack, &mut device, &mut pool, src, dst), FrameOutcome::PassThrough);
    assert_same_pixels(&device, src, dst);
}

// ============================================================================
// Skipping
// ============================================================================

#[test]
fn test_disabled_effects_are_skipped() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut camera = CameraState::default();
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);

    let mut disabled = brighten(&mut device);
    disabled.settings.enabled = false;

    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    stack.attach(Box::new(brighten(&mut device)), &mut camera);
    stack.attach(Box::new(disabled), &mut camera);
    stack.attach(Box::new(brighten(&mut device)), &mut camera);

    render(&mut stack, &mut device, &mut pool, src, dst);
    assert_brightened(&device, src, dst, 2);
}

#[test]
fn test_effects_for_other_injection_points_are_skipped() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut camera = CameraState::default();
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);
    let program = register_brighten_program(&mut device);

    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    stack.attach(Box::new(EdgeNormalsDepth::new(Some(program))), &mut camera);
    stack.attach(Box::new(brighten(&mut device)), &mut camera);

    render(&mut stack, &mut device, &mut pool, src, dst);
    assert_brightened(&device, src, dst, 1);
    assert_eq!(device.history().len(), 1);
}

#[test]
fn test_all_disabled_copies_through() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut camera = CameraState::default();
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);

    let mut effect = brighten(&mut device);
    effect.settings.enabled = false;
    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    stack.attach(Box::new(effect), &mut camera);

    assert_eq!(render(&mut stack, &mut device, &mut pool, src, dst), FrameOutcome::PassThrough);
    assert_same_pixels(&device, src, dst);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_attach_collects_depth_requests() {
    let mut camera = CameraState::default();
    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    stack.attach(Box::new(DepthFog::new(None)), &mut camera);
    stack.attach(Box::new(EdgeNormalsDepth::new(None)), &mut camera);

    assert!(camera.depth_texture_mode.contains(DepthTextureMode::DEPTH));
    assert!(camera.depth_texture_mode.contains(DepthTextureMode::DEPTH_NORMALS));
}

#[test]
fn test_detach_all_releases_cross_frame_buffers() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut camera = CameraState::default();
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);
    let program = register_accumulation_program(&mut device);

    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    stack.attach(Box::new(MotionBlur::new(Some(program))), &mut camera);
    stack.attach(Box::new(brighten(&mut device)), &mut camera);

    render(&mut stack, &mut device, &mut pool, src, dst);
    pool.end_frame();
    pool.clear(&mut device);
    assert_eq!(device.live_buffer_count(), 3, "source, destination, accumulation");

    stack.detach_all(&mut device);
    assert!(stack.is_empty());
    assert_eq!(device.live_buffer_count(), 2);
}

#[test]
fn test_reenabled_motion_blur_starts_from_the_new_frame() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut camera = CameraState::default();
    let black = solid_frame(&mut device, 4, 4, Vec4::new(0.0, 0.0, 0.0, 1.0));
    let white = solid_frame(&mut device, 4, 4, Vec4::ONE);
    let dst = empty_frame(&mut device, 4, 4);

    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    stack.attach(Box::new(motion_blur(&mut device, 0.9)), &mut camera);
    render(&mut stack, &mut device, &mut pool, black, dst);

    for effect in stack.effects_mut() {
        effect.set_enabled(false);
        effect.set_enabled(true);
    }

    assert_eq!(
        render(&mut stack, &mut device, &mut pool, white, dst),
        FrameOutcome::Applied
    );
    assert_same_pixels(&device, white, dst);
}

#[test]
fn test_disabled_frame_detaches_the_effect() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut camera = CameraState::default();
    let black = solid_frame(&mut device, 4, 4, Vec4::new(0.0, 0.0, 0.0, 1.0));
    let white = solid_frame(&mut device, 4, 4, Vec4::ONE);
    let dst = empty_frame(&mut device, 4, 4);

    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    stack.attach(Box::new(motion_blur(&mut device, 0.9)), &mut camera);
    render(&mut stack, &mut device, &mut pool, black, dst);
    let with_accumulation = device.live_buffer_count();

    stack.effects_mut().for_each(|effect| effect.set_enabled(false));
    assert_eq!(
        render(&mut stack, &mut device, &mut pool, white, dst),
        FrameOutcome::PassThrough
    );
    assert_eq!(device.live_buffer_count(), with_accumulation - 1);

    stack.effects_mut().for_each(|effect| effect.set_enabled(true));
    render(&mut stack, &mut device, &mut pool, white, dst);
    assert_same_pixels(&device, white, dst);
    assert_eq!(device.live_buffer_count(), with_accumulation);
}

// ============================================================================
// Outcomes
// ============================================================================

#[test]
fn test_outcome_is_applied_when_any_effect_applied() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut camera = CameraState::default();
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);

    let mut stack = EffectStack::new(InjectionPoint::AfterEverything);
    stack.attach(Box::new(EdgeDetection::new(None)), &mut camera);
    stack.attach(Box::new(brighten(&mut device)), &mut camera);

    assert_eq!(render(&mut stack, &mut device, &mut pool, src, dst), FrameOutcome::Applied);
    assert_brightened(&device, src, dst, 1);
}

#[test]
fn test_stack_is_itself_a_post_effect() {
    let stack = EffectStack::new(InjectionPoint::AfterOpaque);
    let effect: &dyn PostEffect = &stack;
    assert_eq!(effect.injection_point(), InjectionPoint::AfterOpaque);
    assert_eq!(effect.name(), "EffectStack");
}
