//! Rendering through a real device.

use glam::{Vec2, Vec3, Vec4};
use spritebatch_render::expansion::reference;
use spritebatch_render::{
    AtlasRegion, ExpansionKind, GpuSampler, GpuTexture, GraphicsContext, GraphicsError,
    OrthographicCamera, RenderContext, RenderTargetDesc, SpriteBatch, SpriteBatchConfig,
    SpriteInstance, create_render_target, create_rgba8_texture, read_texture_rgba8,
};
use spritebatch_test_utils::SamplerDesc;

const SIZE: u32 = 64;

/// Render `sprites` into a black target and read it back.
fn render(
    ctx: &GraphicsContext,
    kind: ExpansionKind,
    sprites: &[SpriteInstance],
    atlas: Option<(GpuTexture, GpuSampler)>,
) -> Vec<u8> {
    let format = wgpu::TextureFormat::Rgba8Unorm;
    let target = create_render_target(ctx, "target", SIZE, SIZE, format);
    let mut batch = SpriteBatch::new(
        ctx,
        SpriteBatchConfig::default()
            .with_max_sprites(16)
            .with_expansion(kind)
            .with_color_format(format)
            .with_blend(None),
    )
    .unwrap();
    batch.set_camera(&OrthographicCamera::screen(SIZE as f32, SIZE as f32));
    if let Some((texture, sampler)) = atlas {
        batch.set_texture(texture, Some(sampler));
    }

    batch.begin_frame();
    batch.extend(sprites.iter().copied()).unwrap();
    batch
        .submit_frame(
            ctx,
            &RenderTargetDesc {
                label: Some("gpu_test"),
                target: &target,
                clear_color: Some([0.0, 0.0, 0.0, 1.0]),
            },
        )
        .unwrap();
    ctx.wait_idle();

    read_texture_rgba8(ctx, &target).unwrap()
}

fn half_red(ctx: &GraphicsContext, kind: ExpansionKind) -> Vec<u8> {
    let sprite = SpriteInstance::new(Vec3::ZERO, Vec2::new(SIZE as f32 / 2.0, SIZE as f32))
        .with_color(Vec4::new(1.0, 0.0, 0.0, 1.0));
    render(ctx, kind, &[sprite], None)
}

/// A 2x1 atlas, red on the left and blue on the right, sampled without filtering.
fn two_texel_atlas(ctx: &GraphicsContext) -> (GpuTexture, GpuSampler) {
    let texture = create_rgba8_texture(ctx, "atlas", 2, 1, &[255, 0, 0, 255, 0, 0, 255, 255]);
    let sampler = ctx.create_sampler(&SamplerDesc {
        label: Some("nearest"),
        filter: wgpu::FilterMode::Nearest,
    });
    (texture, sampler)
}

/// Rotated, non-square sprites each sampling one atlas texel.
fn atlas_scene() -> Vec<SpriteInstance> {
    let red = AtlasRegion::new(0, 0, 1, 1).to_uv(2, 1);
    let blue = AtlasRegion::new(1, 0, 1, 1).to_uv(2, 1);
    vec![
        SpriteInstance::new(Vec3::new(32.0, 8.0, 0.0), Vec2::new(24.0, 12.0))
            .with_rotation(std::f32::consts::FRAC_PI_6)
            .with_region(blue),
        SpriteInstance::new(Vec3::new(10.0, 40.0, 0.0), Vec2::new(20.0, 8.0))
            .with_rotation(-0.4)
            .with_region(red.flip_horizontal()),
    ]
}

/// Quad center of a sprite, from the CPU expansion.
fn center(sprite: &SpriteInstance) -> (u32, u32) {
    let quad = reference::expand_instance(&sprite.to_gpu());
    let mid = (quad[0].position() + quad[3].position()) * 0.5;
    (mid.x as u32, mid.y as u32)
}

fn pixel(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let at = ((y * SIZE + x) * 4) as usize;
    [pixels[at], pixels[at + 1], pixels[at + 2], pixels[at + 3]]
}

fn differing_pixels(a: &[u8], b: &[u8]) -> usize {
    a.chunks_exact(4)
        .zip(b.chunks_exact(4))
        .filter(|(x, y)| x != y)
        .count()
}

#[test]
#[ignore] // Requires GPU - run with: cargo test --test gpu_tests -- --ignored
fn test_host_expansion_renders_sprite() {
    let Ok(ctx) = GraphicsContext::new_owned_sync() else {
        println!("GPU not available");
        return;
    };
    let pixels = half_red(&ctx, ExpansionKind::Host);
    assert_eq!(pixel(&pixels, 4, 16), [255, 0, 0, 255]);
    assert_eq!(pixel(&pixels, 60, 16), [0, 0, 0, 255]);
}

#[test]
#[ignore] // Requires GPU
fn test_variants_render_identically() {
    let Ok(ctx) = GraphicsContext::new_owned_sync() else {
        return;
    };
    if !ctx.supports_compute() {
        return;
    }
    let host = half_red(&ctx, ExpansionKind::Host);
    assert_eq!(half_red(&ctx, ExpansionKind::Compute), host);
    assert_eq!(half_red(&ctx, ExpansionKind::Pull), host);
}

#[test]
#[ignore] // Requires GPU
fn test_rotated_atlas_sprites_match_across_variants() {
    let Ok(ctx) = GraphicsContext::new_owned_sync() else {
        return;
    };
    if !ctx.supports_compute() {
        return;
    }
    let sprites = atlas_scene();
    let host = render(&ctx, ExpansionKind::Host, &sprites, Some(two_texel_atlas(&ctx)));

    // Sprite centers show the sampled texel, far corners stay clear
    let (x, y) = center(&sprites[0]);
    assert_eq!(pixel(&host, x, y), [0, 0, 255, 255]);
    let (x, y) = center(&sprites[1]);
    assert_eq!(pixel(&host, x, y), [255, 0, 0, 255]);
    assert_eq!(pixel(&host, 60, 60), [0, 0, 0, 255]);

    for kind in [ExpansionKind::Compute, ExpansionKind::Pull] {
        let pixels = render(&ctx, kind, &sprites, Some(two_texel_atlas(&ctx)));
        // GPU and CPU transforms may round a silhouette pixel differently
        let differing = differing_pixels(&host, &pixels);
        assert!(differing <= 4, "{kind}: {differing} pixels differ from host");
        assert_eq!(pixel(&pixels, x, y), [255, 0, 0, 255], "{kind}");
    }
}

#[test]
#[ignore] // Requires GPU
fn test_context_reports_compute_support() {
    if let Ok(ctx) = GraphicsContext::new_owned_sync() {
        let batch = SpriteBatch::new(ctx.as_ref(), SpriteBatchConfig::default()).unwrap();
        let expected = if ctx.supports_compute() {
            ExpansionKind::Compute
        } else {
            ExpansionKind::Host
        };
        assert_eq!(batch.expansion(), expected);
    }
}

#[test]
fn test_graphics_error_display() {
    let err = GraphicsError::NoAdapter;
    assert_eq!(err.to_string(), "no suitable GPU adapter found");
}
