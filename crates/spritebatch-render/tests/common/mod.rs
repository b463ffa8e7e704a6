//! Shared helpers for sprite batch integration tests.

#![allow(dead_code)]

use glam::{Vec2, Vec3, Vec4};
use spritebatch_render::expansion::{EXPAND_KERNEL_LABEL, bindings, reference};
use spritebatch_render::{
    EXPANSION_WORKGROUP_SIZE, ExpansionKind, GpuSpriteInstance, GpuTexture, QuadVertex,
    RenderContext, RenderTargetDesc, SpriteBatch, SpriteBatchConfig, SpriteInstance,
    create_render_target,
};
use spritebatch_test_utils::{DrawRecord, MockRenderContext};

pub const ALL_VARIANTS: [ExpansionKind; 3] = [
    ExpansionKind::Host,
    ExpansionKind::Compute,
    ExpansionKind::Pull,
];

/// Mock context that runs the `expand_sprites` kernel on the CPU.
pub fn mock_context() -> MockRenderContext {
    let ctx = MockRenderContext::new();
    register_expand_kernel(&ctx);
    ctx
}

pub fn register_expand_kernel(ctx: &MockRenderContext) {
    ctx.register_kernel(EXPAND_KERNEL_LABEL, |invocation| {
        let uniforms = invocation.binding(bindings::FRAME_UNIFORMS);
        let sprite_count = uniforms
            .get(64..68)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .unwrap_or(0);
        let invocations = invocation.workgroups[0] * EXPANSION_WORKGROUP_SIZE;
        let live = sprite_count.min(invocations) as usize;

        let instances = decode_instances(invocation.binding(bindings::INSTANCES));
        let mut vertices: Vec<QuadVertex> = invocation
            .binding(bindings::VERTICES)
            .chunks_exact(QuadVertex::SIZE as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect();

        reference::expand_sprites(&instances, live, &mut vertices);

        let out = invocation.binding_mut(bindings::VERTICES);
        for (chunk, vertex) in out
            .chunks_exact_mut(QuadVertex::SIZE as usize)
            .zip(&vertices)
        {
            chunk.copy_from_slice(bytemuck::bytes_of(vertex));
        }
    });
}

pub fn decode_instances(bytes: &[u8]) -> Vec<GpuSpriteInstance> {
    bytes
        .chunks_exact(GpuSpriteInstance::SIZE as usize)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// The vertices a draw rasterizes, three per triangle, in draw order.
pub fn resolve_triangles(draw: &DrawRecord) -> Vec<QuadVertex> {
    match draw.vertex_buffers.get(&0) {
        Some(bytes) => {
            let vertices: Vec<QuadVertex> = bytes
                .chunks_exact(QuadVertex::SIZE as usize)
                .map(bytemuck::pod_read_unaligned)
                .collect();
            draw.vertex_ids()
                .into_iter()
                .filter_map(|id| vertices.get(id as usize).copied())
                .collect()
        }
        None => {
            let instances = draw
                .bindings
                .get(&bindings::INSTANCES)
                .map(|bytes| decode_instances(bytes))
                .unwrap_or_default();
            draw.vertex_ids()
                .into_iter()
                .filter_map(|id| reference::pull_vertex(&instances, id))
                .collect()
        }
    }
}

pub fn batch(ctx: &dyn RenderContext, kind: ExpansionKind, max_sprites: usize) -> SpriteBatch {
    SpriteBatch::new(
        ctx,
        SpriteBatchConfig::default()
            .with_max_sprites(max_sprites)
            .with_expansion(kind),
    )
    .unwrap()
}

pub fn target(ctx: &dyn RenderContext) -> GpuTexture {
    create_render_target(ctx, "target", 64, 64, wgpu::TextureFormat::Rgba8UnormSrgb)
}

pub fn target_desc(texture: &GpuTexture) -> RenderTargetDesc<'_> {
    RenderTargetDesc {
        label: Some("sprites"),
        target: texture,
        clear_color: Some([0.0, 0.0, 0.0, 1.0]),
    }
}

/// Sprites with varied rotation, size, depth, uv and color.
pub fn scene(count: usize) -> Vec<SpriteInstance> {
    (0..count)
        .map(|i| {
            let f = i as f32;
            SpriteInstance::new(
                Vec3::new(f * 13.0 - 40.0, f * 7.5 + 3.0, f * 0.01),
                Vec2::new(4.0 + f, 9.0 + 0.5 * f),
            )
            .with_rotation(f * 0.37)
            .with_uv(Vec2::new(0.25, 0.5), Vec2::new(0.25, 0.125))
            .with_color(Vec4::new(1.0, f / count as f32, 0.5, 1.0))
        })
        .collect()
}

/// Run one frame and return what it drew.
pub fn draw_frame(
    ctx: &MockRenderContext,
    batch: &mut SpriteBatch,
    sprites: &[SpriteInstance],
) -> Vec<DrawRecord> {
    let texture = target(ctx);
    batch.begin_frame();
    batch.extend(sprites.iter().copied()).unwrap();
    batch.submit_frame(ctx, &target_desc(&texture)).unwrap();
    ctx.take_draws()
}

pub fn assert_vertices_close(a: &QuadVertex, b: &QuadVertex, tolerance: f32) {
    let pairs = [
        (a.position(), b.position()),
        (a.color(), b.color()),
        (a.tex_coord().extend(0.0).extend(0.0), b.tex_coord().extend(0.0).extend(0.0)),
    ];
    for (x, y) in pairs {
        assert!(
            (x - y).abs().max_element() <= tolerance,
            "vertices differ: {:?} vs {:?}",
            a,
            b
        );
    }
}
