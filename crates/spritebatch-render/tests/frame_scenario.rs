//! Whole frames through the batch against the mock backend.

mod common;

use common::{
    ALL_VARIANTS, assert_vertices_close, batch, draw_frame, mock_context, resolve_triangles,
    target, target_desc,
};
use glam::{Vec2, Vec3, Vec4};
use spritebatch_render::expansion::{bindings, reference};
use spritebatch_render::{
    BatchError, ExpansionKind, OrthographicCamera, RenderContext, ScopeError, SpriteInstance,
    SpriteSheetLayout, create_rgba8_texture,
};
use spritebatch_test_utils::{RecordedCommand, RenderCall};

fn three_sprites() -> Vec<SpriteInstance> {
    vec![
        SpriteInstance::new(Vec3::new(10.0, 10.0, 0.0), Vec2::splat(16.0)),
        SpriteInstance::new(Vec3::new(40.0, 10.0, 0.5), Vec2::new(8.0, 24.0))
            .with_rotation(std::f32::consts::FRAC_PI_4),
        SpriteInstance::new(Vec3::new(10.0, 40.0, 1.0), Vec2::splat(4.0))
            .with_color(Vec4::new(1.0, 0.0, 0.0, 0.5)),
    ]
}

#[test]
fn test_three_sprites_draw_once_with_eighteen_elements() {
    for kind in ALL_VARIANTS {
        let ctx = mock_context();
        let mut batch = batch(&ctx, kind, 16);
        let draws = draw_frame(&ctx, &mut batch, &three_sprites());

        assert_eq!(draws.len(), 1, "{kind}");
        assert_eq!(draws[0].element_count(), 18, "{kind}");
        assert_eq!(draws[0].instances, 0..1);
        assert_eq!(draws[0].indexed, kind != ExpansionKind::Pull);

        let stats = batch.end_frame();
        assert_eq!(stats.instance_count, 3);
        assert_eq!(stats.draw_calls, 1);
    }
}

/// White, red rotated a quarter turn, and translucent green.
fn screen_scene() -> Vec<SpriteInstance> {
    vec![
        SpriteInstance::new(Vec3::ZERO, Vec2::splat(32.0)),
        SpriteInstance::new(Vec3::new(100.0, 0.0, 0.0), Vec2::splat(16.0))
            .with_rotation(std::f32::consts::FRAC_PI_2)
            .with_color(Vec4::new(1.0, 0.0, 0.0, 1.0)),
        SpriteInstance::new(Vec3::new(0.0, 100.0, 0.0), Vec2::splat(64.0))
            .with_color(Vec4::new(0.0, 1.0, 0.0, 0.5)),
    ]
}

#[test]
fn test_screen_scene_draws_eighteen_vertices_once() {
    let sprites = screen_scene();
    let camera = OrthographicCamera::screen(640.0, 480.0);
    let expected: Vec<_> = sprites
        .iter()
        .flat_map(|sprite| {
            let corners = reference::expand_instance(&sprite.to_gpu());
            [0, 1, 2, 2, 1, 3].map(|corner| corners[corner])
        })
        .collect();

    for kind in ALL_VARIANTS {
        let ctx = mock_context();
        let mut batch = batch(&ctx, kind, 16);
        batch.set_camera(&camera);
        let draws = draw_frame(&ctx, &mut batch, &sprites);

        assert_eq!(draws.len(), 1, "{kind}");
        assert_eq!(draws[0].element_count(), 18, "{kind}");
        assert_eq!(batch.end_frame().draw_calls, 1, "{kind}");

        let uniforms = &draws[0].bindings[&bindings::FRAME_UNIFORMS];
        let view_proj = camera.view_projection().to_cols_array();
        assert_eq!(&uniforms[..64], bytemuck::cast_slice::<f32, u8>(&view_proj));

        let triangles = resolve_triangles(&draws[0]);
        assert_eq!(triangles.len(), expected.len(), "{kind}");
        for (vertex, corner) in triangles.iter().zip(&expected) {
            assert_vertices_close(vertex, corner, 1e-4);
        }

        // The quarter turn swings the red sprite's +x edge onto +y
        let red = &triangles[6..12];
        assert!(red[1].position().truncate().truncate().abs_diff_eq(Vec2::new(100.0, 16.0), 1e-4));
        assert!(red[2].position().truncate().truncate().abs_diff_eq(Vec2::new(84.0, 0.0), 1e-4));
        assert_eq!(red[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(triangles[12].color, [0.0, 1.0, 0.0, 0.5]);
    }
}

#[test]
fn test_empty_frame_records_no_draw() {
    for kind in ALL_VARIANTS {
        let ctx = mock_context();
        let mut batch = batch(&ctx, kind, 16);
        let draws = draw_frame(&ctx, &mut batch, &[]);

        assert!(draws.is_empty(), "{kind}");
        assert!(ctx.dispatches().is_empty(), "{kind}");
        assert_eq!(batch.end_frame().draw_calls, 0);
    }
}

#[test]
fn test_scopes_are_ordered_copy_compute_render() {
    let ctx = mock_context();
    let mut batch = batch(&ctx, ExpansionKind::Compute, 16);
    draw_frame(&ctx, &mut batch, &three_sprites());

    let scopes: Vec<&str> = ctx
        .submitted_commands()
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::BeginCopyScope => Some("copy"),
            RecordedCommand::BeginComputeScope { .. } => Some("compute"),
            RecordedCommand::BufferBarrier { .. } => Some("barrier"),
            RecordedCommand::BeginRenderScope { .. } => Some("render"),
            _ => None,
        })
        .collect();
    assert_eq!(scopes, ["copy", "compute", "barrier", "render"]);
}

#[test]
fn test_host_and_pull_record_no_compute() {
    for kind in [ExpansionKind::Host, ExpansionKind::Pull] {
        let ctx = mock_context();
        let mut batch = batch(&ctx, kind, 16);
        draw_frame(&ctx, &mut batch, &three_sprites());

        assert!(ctx.dispatches().is_empty());
        assert_eq!(ctx.count_compute_pipeline_creates(), 0);
        assert!(
            !ctx
                .submitted_commands()
                .iter()
                .any(|command| matches!(command, RecordedCommand::BeginComputeScope { .. }))
        );
    }
}

#[test]
fn test_index_buffer_uploaded_once_at_setup() {
    let ctx = mock_context();
    let mut batch = batch(&ctx, ExpansionKind::Host, 16);
    let setup_waits = ctx
        .calls()
        .iter()
        .filter(|call| matches!(call, RenderCall::WaitIdle))
        .count();
    assert_eq!(setup_waits, 1);

    for _ in 0..4 {
        draw_frame(&ctx, &mut batch, &three_sprites());
    }
    let waits = ctx
        .calls()
        .iter()
        .filter(|call| matches!(call, RenderCall::WaitIdle))
        .count();
    assert_eq!(waits, 1);
}

#[test]
fn test_draw_sees_camera_uniforms() {
    let ctx = mock_context();
    let mut batch = batch(&ctx, ExpansionKind::Pull, 16);
    let camera = OrthographicCamera::screen(64.0, 64.0);
    batch.set_camera(&camera);

    let draws = draw_frame(&ctx, &mut batch, &three_sprites());
    let uniforms = &draws[0].bindings[&bindings::FRAME_UNIFORMS];
    let expected = camera.view_projection().to_cols_array();
    assert_eq!(&uniforms[..64], bytemuck::cast_slice::<f32, u8>(&expected));
    assert_eq!(&uniforms[64..68], &3u32.to_le_bytes());
}

#[test]
fn test_atlas_texture_bound_at_draw() {
    let ctx = mock_context();
    let mut batch = batch(&ctx, ExpansionKind::Host, 16);
    let pixels = vec![255u8; 32 * 16 * 4];
    let atlas = create_rgba8_texture(&ctx, "atlas", 32, 16, &pixels);
    batch.set_texture(atlas.clone(), None);

    let layout = SpriteSheetLayout {
        texture_width: 32,
        texture_height: 16,
        cell_width: 16,
        cell_height: 16,
        columns: 2,
        rows: 1,
        ..Default::default()
    };
    let uv = layout.cell_uv(1).unwrap();
    let sprite = SpriteInstance::new(Vec3::ZERO, Vec2::splat(16.0)).with_region(uv);
    draw_frame(&ctx, &mut batch, &[sprite]);

    let bound = ctx.submitted_commands().into_iter().find_map(|command| match command {
        RecordedCommand::BindTexture { binding, texture } if binding == bindings::TEXTURE => {
            Some(texture)
        }
        _ => None,
    });
    assert_eq!(bound.and_then(|texture| texture.mock_id()), atlas.mock_id());
    assert_eq!(ctx.texture_contents(&atlas), pixels);
}

#[test]
fn test_draw_outside_render_scope_is_scope_error() {
    let ctx = mock_context();
    let mut batch = batch(&ctx, ExpansionKind::Host, 16);
    batch.begin_frame();
    batch.extend(three_sprites()).unwrap();

    let mut stream = ctx.acquire_command_stream("frame");
    batch.prepare(&ctx, stream.as_mut()).unwrap();
    assert!(matches!(
        batch.draw(stream.as_mut()),
        Err(BatchError::Scope(ScopeError::WrongScope { active: None, .. }))
    ));
}

#[test]
fn test_unterminated_render_scope_rejected_at_submit() {
    let ctx = mock_context();
    let texture = target(&ctx);
    let mut batch = batch(&ctx, ExpansionKind::Host, 16);
    batch.begin_frame();
    batch.extend(three_sprites()).unwrap();

    let mut stream = ctx.acquire_command_stream("frame");
    batch.prepare(&ctx, stream.as_mut()).unwrap();
    stream.begin_render_scope(&target_desc(&texture)).unwrap();
    batch.draw(stream.as_mut()).unwrap();
    assert!(matches!(ctx.submit(stream), Err(ScopeError::Unterminated(_))));
}
