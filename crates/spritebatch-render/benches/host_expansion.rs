//! Benchmarks for CPU quad expansion and full host-variant frames on the mock backend.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::{Vec2, Vec3, Vec4};
use spritebatch_render::expansion::reference;
use spritebatch_render::{
    CapacityPolicy, ExpansionKind, GpuSpriteInstance, QuadVertex, RenderContext,
    RenderTargetDesc, SpriteBatch, SpriteBatchConfig, SpriteInstance, VERTICES_PER_SPRITE,
};
use spritebatch_test_utils::{MockRenderContext, TextureDesc, TextureUsage};

fn scene(count: usize) -> Vec<SpriteInstance> {
    (0..count)
        .map(|i| {
            let f = i as f32;
            SpriteInstance::new(Vec3::new(f % 640.0, f / 640.0, 0.0), Vec2::splat(16.0))
                .with_rotation(f * 0.01)
                .with_color(Vec4::new(1.0, 0.5, 0.25, 1.0))
        })
        .collect()
}

fn bench_expand_sprites(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_sprites");

    for size in [100, 1000, 8192] {
        group.throughput(Throughput::Elements(size as u64));

        let instances: Vec<GpuSpriteInstance> = scene(size).iter().map(|s| s.to_gpu()).collect();
        let mut vertices = vec![QuadVertex::default(); size * VERTICES_PER_SPRITE];

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                reference::expand_sprites(black_box(&instances), size, &mut vertices);
                black_box(&vertices);
            });
        });
    }

    group.finish();
}

fn bench_host_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_frame");

    for size in [100, 1000, 8192] {
        group.throughput(Throughput::Elements(size as u64));

        let ctx = MockRenderContext::new().without_draw_snapshots();
        let mut batch = SpriteBatch::new(
            &ctx,
            SpriteBatchConfig::default()
                .with_expansion(ExpansionKind::Host)
                .with_capacity_policy(CapacityPolicy::Truncate),
        )
        .unwrap();
        let target = ctx.create_texture(&TextureDesc {
            label: Some("bench_target"),
            width: 64,
            height: 64,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsage::RENDER_TARGET,
        });
        let sprites = scene(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                batch.begin_frame();
                batch.extend(sprites.iter().copied()).unwrap();
                batch
                    .submit_frame(
                        &ctx,
                        &RenderTargetDesc {
                            label: None,
                            target: &target,
                            clear_color: None,
                        },
                    )
                    .unwrap();
                ctx.clear_submissions();
                ctx.clear_calls();
                black_box(batch.end_frame())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_expand_sprites, bench_host_frame);
criterion_main!(benches);
