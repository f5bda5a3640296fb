//! Motion Blur Tests
//!
//! Tests for:
//! - Accumulation blending weights and convergence
//! - Accumulation buffer seeding, resize and detach
//! - Previous / current view-projection hand-off in depth motion blur
//! - History discarded when an effect is switched off

mod common;

use glam::{Mat4, Vec3, Vec4};

use myth_postfx::effects::{
    CAMERA_DEPTH_TEXTURE, DepthMotionBlur, FrameContext, FrameOutcome, MotionBlur, PostEffect,
};
use myth_postfx::renderer::graph::TransientBufferPool;
use myth_postfx::renderer::{
    BufferHandle, CameraState, CpuDevice, DepthTextureMode, LoadOp, RenderDevice,
};
use myth_postfx::resources::{DepthMotionBlurSettings, MotionBlurSettings};

use common::{
    approx, approx_vec4, assert_same_pixels, empty_frame, gradient_frame,
    register_accumulation_program, register_identity_program, solid_frame,
};

fn motion_blur(device: &mut CpuDevice, amount: f32) -> MotionBlur {
    let program = register_accumulation_program(device);
    let mut settings = MotionBlurSettings::default();
    settings.set_blur_amount(amount);
    MotionBlur::new(Some(program)).with_settings(settings)
}

fn render(
    effect: &mut dyn PostEffect,
    device: &mut CpuDevice,
    pool: &mut TransientBufferPool,
    camera: &CameraState,
    source: BufferHandle,
    destination: BufferHandle,
) -> FrameOutcome {
    let mut ctx = FrameContext::new(device, pool, camera);
    effect.on_frame(&mut ctx, source, destination)
}

fn mat_approx(a: Mat4, b: Mat4) -> bool {
    a.abs_diff_eq(b, 1e-4)
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_blur_amount_is_capped() {
    let mut settings = MotionBlurSettings::default();
    assert!(approx(settings.blur_amount(), 0.5));

    settings.set_blur_amount(1.0);
    assert!(approx(settings.blur_amount(), MotionBlurSettings::MAX_BLUR_AMOUNT));

    settings.set_blur_amount(-3.0);
    assert!(approx(settings.blur_amount(), 0.0));
}

// ============================================================================
// Accumulation
// ============================================================================

#[test]
fn test_zero_blur_amount_shows_only_the_current_frame() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let camera = CameraState::default();
    let mut effect = motion_blur(&mut device, 0.0);
    let dst = empty_frame(&mut device, 8, 8);

    for value in [0.1, 0.7, 0.3] {
        let src = solid_frame(&mut device, 8, 8, Vec4::new(value, value, value, 1.0));
        assert_eq!(
            render(&mut effect, &mut device, &mut pool, &camera, src, dst),
            FrameOutcome::Applied
        );
        assert_same_pixels(&device, src, dst);
    }
}

#[test]
fn test_first_frame_is_seeded_from_the_source() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let camera = CameraState::default();
    let mut effect = motion_blur(&mut device, 0.9);
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);

    render(&mut effect, &mut device, &mut pool, &camera, src, dst);

    // Blending the source into a copy of itself changes nothing.
    assert_same_pixels(&device, src, dst);
}

#[test]
fn test_accumulation_converges_to_a_static_frame() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let camera = CameraState::default();
    let mut effect = motion_blur(&mut device, 0.9);
    let black = solid_frame(&mut device, 4, 4, Vec4::new(0.0, 0.0, 0.0, 1.0));
    let white = solid_frame(&mut device, 4, 4, Vec4::ONE);
    let dst = empty_frame(&mut device, 4, 4);

    render(&mut effect, &mut device, &mut pool, &camera, black, dst);
    render(&mut effect, &mut device, &mut pool, &camera, white, dst);
    let after_one = device.pixel(dst, 0, 0).unwrap();
    assert!(approx(after_one.x, 0.1), "one frame contributes 1 - amount, got {after_one}");

    for _ in 0..99 {
        render(&mut effect, &mut device, &mut pool, &camera, white, dst);
    }
    let settled = device.pixel(dst, 2, 2).unwrap();
    assert!(
        approx_vec4(settled.truncate().extend(1.0), Vec4::ONE),
        "expected convergence to white, got {settled}"
    );
}

#[test]
fn test_accumulation_target_is_loaded_not_cleared() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let camera = CameraState::default();
    let mut effect = motion_blur(&mut device, 0.5);
    let src = gradient_frame(&mut device, 8, 8);
    let dst = empty_frame(&mut device, 8, 8);

    render(&mut effect, &mut device, &mut pool, &camera, src, dst);
    device.clear_history();
    render(&mut effect, &mut device, &mut pool, &camera, src, dst);

    let accumulation = effect.accumulation().handle().unwrap();
    assert!(device.buffer_desc(accumulation).unwrap().restore_expected);

    let history = device.history();
    assert_eq!(history.len(), 2, "blend into accumulation, then copy out");
    assert_eq!(history[0].target, accumulation);
    assert_eq!(history[0].load, LoadOp::Load);
    assert!(approx(history[0].params.get_float("_BlurAmount").unwrap(), 0.5));
    assert_eq!(history[1].source, accumulation);
    assert_eq!(history[1].target, dst);
    assert!(pool.end_frame().is_balanced());
}

#[test]
fn test_resize_reallocates_and_reseeds() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let camera = CameraState::default();
    let mut effect = motion_blur(&mut device, 0.9);

    let small_src = solid_frame(&mut device, 8, 8, Vec4::new(0.0, 0.0, 0.0, 1.0));
    let small_dst = empty_frame(&mut device, 8, 8);
    render(&mut effect, &mut device, &mut pool, &camera, small_src, small_dst);
    render(&mut effect, &mut device, &mut pool, &camera, small_src, small_dst);
    let old = effect.accumulation().handle().unwrap();
    assert_eq!(effect.accumulation().reallocation_count(), 1);

    let big_src = gradient_frame(&mut device, 16, 16);
    let big_dst = empty_frame(&mut device, 16, 16);
    render(&mut effect, &mut device, &mut pool, &camera, big_src, big_dst);

    let new = effect.accumulation().handle().unwrap();
    assert_ne!(old, new);
    assert!(device.buffer_desc(old).is_none(), "old buffer must be destroyed");
    assert_eq!(device.buffer_desc(new).unwrap().size(), (16, 16));
    assert_eq!(effect.accumulation().reallocation_count(), 2);
    assert_same_pixels(&device, big_src, big_dst);
}

#[test]
fn test_detach_destroys_and_next_frame_reseeds() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let camera = CameraState::default();
    let mut effect = motion_blur(&mut device, 0.9);
    let black = solid_frame(&mut device, 4, 4, Vec4::new(0.0, 0.0, 0.0, 1.0));
    let white = solid_frame(&mut device, 4, 4, Vec4::ONE);
    let dst = empty_frame(&mut device, 4, 4);
    let live_before = device.live_buffer_count();

    render(&mut effect, &mut device, &mut pool, &camera, black, dst);
    assert_eq!(device.live_buffer_count(), live_before + 1);

    effect.on_detach(&mut device);
    assert!(effect.accumulation().handle().is_none());
    assert_eq!(device.live_buffer_count(), live_before);

    render(&mut effect, &mut device, &mut pool, &camera, white, dst);
    assert_same_pixels(&device, white, dst);
    assert_eq!(effect.accumulation().reallocation_count(), 2);
}

#[test]
fn test_unavailable_program_keeps_no_accumulation() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let camera = CameraState::default();
    let mut effect = MotionBlur::new(None);
    let src = gradient_frame(&mut device, 4, 4);
    let dst = empty_frame(&mut device, 4, 4);

    assert_eq!(
        render(&mut effect, &mut device, &mut pool, &camera, src, dst),
        FrameOutcome::PassThrough
    );
    assert!(effect.accumulation().handle().is_none());
}

// ============================================================================
// Depth Motion Blur
// ============================================================================

fn depth_motion_blur(device: &mut CpuDevice) -> DepthMotionBlur {
    let program = register_identity_program(device, "DepthMotionBlur");
    let mut settings = DepthMotionBlurSettings::default();
    settings.set_blur_size(0.8);
    DepthMotionBlur::new(Some(program)).with_settings(settings)
}

#[test]
fn test_attach_requests_depth() {
    let mut device = CpuDevice::new();
    let mut effect = depth_motion_blur(&mut device);
    let mut camera = CameraState::default();

    effect.on_attach(&mut camera);
    assert!(camera.depth_texture_mode.contains(DepthTextureMode::DEPTH));
}

#[test]
fn test_view_projection_hand_off() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut effect = depth_motion_blur(&mut device);
    let src = gradient_frame(&mut device, 4, 4);
    let dst = empty_frame(&mut device, 4, 4);
    let depth = solid_frame(&mut device, 4, 4, Vec4::splat(0.5));

    let first = CameraState::default().looking_at(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO, Vec3::Y);
    let second = CameraState::default().looking_at(Vec3::new(2.0, 1.0, 5.0), Vec3::ZERO, Vec3::Y);

    for camera in [&first, &second] {
        let mut ctx = FrameContext::new(&mut device, &mut pool, camera).with_depth_texture(depth);
        assert_eq!(effect.on_frame(&mut ctx, src, dst), FrameOutcome::Applied);
    }

    let history = device.history();
    let frame1 = &history[0].params;
    let frame2 = &history[1].params;

    let vp1 = first.view_projection();
    let vp2 = second.view_projection();

    assert!(
        mat_approx(frame1.get_matrix("_PreviousViewProjectionMatrix").unwrap(), vp1),
        "first frame has no motion: previous equals current"
    );
    assert!(mat_approx(frame2.get_matrix("_PreviousViewProjectionMatrix").unwrap(), vp1));
    assert!(mat_approx(
        frame2.get_matrix("_CurrentViewProjectionInverseMatrix").unwrap(),
        vp2.inverse()
    ));
    assert!(approx(frame2.get_float("_BlurSize").unwrap(), 0.8));
    assert_eq!(frame2.get_texture(CAMERA_DEPTH_TEXTURE), Some(depth));
    assert_eq!(effect.previous_view_projection().stored(), Some(vp2));
}

#[test]
fn test_fallback_frame_keeps_previous_view_projection() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut effect = depth_motion_blur(&mut device);
    let src = gradient_frame(&mut device, 4, 4);
    let dst = empty_frame(&mut device, 4, 4);

    let first = CameraState::default().looking_at(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO, Vec3::Y);
    let second = CameraState::default().looking_at(Vec3::new(2.0, 1.0, 5.0), Vec3::ZERO, Vec3::Y);
    let third = CameraState::default().looking_at(Vec3::new(4.0, 1.0, 5.0), Vec3::ZERO, Vec3::Y);

    assert_eq!(
        render(&mut effect, &mut device, &mut pool, &first, src, dst),
        FrameOutcome::Applied
    );

    device.fail_blit_after(0);
    assert_eq!(
        render(&mut effect, &mut device, &mut pool, &second, src, dst),
        FrameOutcome::PassThrough
    );
    assert_same_pixels(&device, src, dst);
    assert_eq!(
        effect.previous_view_projection().stored(),
        Some(first.view_projection())
    );

    assert_eq!(
        render(&mut effect, &mut device, &mut pool, &third, src, dst),
        FrameOutcome::Applied
    );
    let last = device.history().last().unwrap();
    assert!(mat_approx(
        last.params.get_matrix("_PreviousViewProjectionMatrix").unwrap(),
        first.view_projection()
    ));
    assert_eq!(
        effect.previous_view_projection().stored(),
        Some(third.view_projection())
    );
}

#[test]
fn test_switching_off_resets_previous_view_projection() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut effect = depth_motion_blur(&mut device);
    let src = gradient_frame(&mut device, 4, 4);
    let dst = empty_frame(&mut device, 4, 4);
    let camera = CameraState::default();

    render(&mut effect, &mut device, &mut pool, &camera, src, dst);
    effect.set_enabled(false);
    assert!(effect.previous_view_projection().stored().is_none());
    effect.set_enabled(true);
    assert!(effect.is_enabled());
}

#[test]
fn test_detach_resets_previous_view_projection() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut effect = depth_motion_blur(&mut device);
    let src = gradient_frame(&mut device, 4, 4);
    let dst = empty_frame(&mut device, 4, 4);
    let camera = CameraState::default();

    render(&mut effect, &mut device, &mut pool, &camera, src, dst);
    assert!(effect.previous_view_projection().stored().is_some());

    effect.on_detach(&mut device);
    assert!(effect.previous_view_projection().stored().is_none());
}

#[test]
fn test_missing_depth_texture_is_unbound() {
    let mut device = CpuDevice::new();
    let mut pool = TransientBufferPool::new();
    let mut effect = depth_motion_blur(&mut device);
    let src = gradient_frame(&mut device, 4, 4);
    let dst = empty_frame(&mut device, 4, 4);
    let depth = solid_frame(&mut device, 4, 4, Vec4::splat(0.5));
    let camera = CameraState::default();

    {
        let mut ctx = FrameContext::new(&mut device, &mut pool, &camera).with_depth_texture(depth);
        effect.on_frame(&mut ctx, src, dst);
    }
    render(&mut effect, &mut device, &mut pool, &camera, src, dst);

    let last = device.history().last().unwrap();
    assert!(last.params.get_texture(CAMERA_DEPTH_TEXTURE).is_none());
}
