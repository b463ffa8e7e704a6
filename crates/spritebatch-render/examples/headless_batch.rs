//! Headless sprite batch example.
//!
//! Renders a grid of rotating sprites into an offscreen texture for a number of
//! frames without a window, then reads the last frame back and reports coverage.
//!
//! Run with: `cargo run -p spritebatch-render --example headless_batch`
//!
//! Select the expansion variant with `--expansion`:
//!   `cargo run -p spritebatch-render --example headless_batch -- --expansion host`
//!   `cargo run -p spritebatch-render --example headless_batch -- --expansion compute`
//!   `cargo run -p spritebatch-render --example headless_batch -- --expansion pull`
//!
//! Set `SPRITEBATCH_PROFILE=http` and connect puffin_viewer to 127.0.0.1:8585 to
//! see per-frame scopes.

use spritebatch_core::config::Config;
use spritebatch_core::profiling::{new_frame, profile_scope};
use spritebatch_render::{
    ExpansionKind, GraphicsContext, OrthographicCamera, RenderContext, RenderTargetDesc,
    SpriteBatch, SpriteBatchConfig, SpriteInstance, create_render_target, read_texture_rgba8,
};
use glam::{Vec2, Vec3, Vec4};

const WIDTH: u32 = 512;
const HEIGHT: u32 = 512;
const FRAMES: u64 = 60;
const GRID: usize = 48;

/// Parse the `--expansion` CLI argument. Omitting it picks the best supported variant.
fn parse_expansion() -> ExpansionKind {
    let args: Vec<String> = std::env::args().collect();
    for (i, arg) in args.iter().enumerate() {
        if arg == "--expansion" {
            if let Some(value) = args.get(i + 1) {
                return match value.as_str() {
                    "host" => ExpansionKind::Host,
                    "compute" => ExpansionKind::Compute,
                    "pull" => ExpansionKind::Pull,
                    "auto" => ExpansionKind::Auto,
                    other => {
                        tracing::warn!(
                            "Unknown expansion '{other}'. Options: host, compute, pull, auto"
                        );
                        ExpansionKind::Auto
                    }
                };
            }
        }
    }
    ExpansionKind::Auto
}

fn sprites(time: f32) -> impl Iterator<Item = SpriteInstance> {
    let cell = WIDTH as f32 / GRID as f32;
    (0..GRID * GRID).map(move |i| {
        let (col, row) = ((i % GRID) as f32, (i / GRID) as f32);
        let hue = i as f32 / (GRID * GRID) as f32;
        SpriteInstance::new(
            Vec3::new(col * cell + cell * 0.5, row * cell + cell * 0.5, 0.0),
            Vec2::splat(cell * 0.6),
        )
        .with_rotation(time + hue * std::f32::consts::TAU)
        .with_color(Vec4::new(hue, 1.0 - hue, 0.5, 1.0))
    })
}

fn main() {
    Config::from_env().apply();

    let context = match GraphicsContext::new_owned_sync() {
        Ok(context) => context,
        Err(err) => {
            tracing::error!("Cannot create graphics context: {err}");
            return;
        }
    };
    let info = context.info();
    tracing::info!("Rendering on {} ({:?})", info.name, info.backend);

    let format = wgpu::TextureFormat::Rgba8UnormSrgb;
    let target = create_render_target(context.as_ref(), "headless_target", WIDTH, HEIGHT, format);

    let config = SpriteBatchConfig::default()
        .with_expansion(parse_expansion())
        .with_color_format(format)
        .with_label("headless_batch");
    let mut batch = match SpriteBatch::new(context.as_ref(), config) {
        Ok(batch) => batch,
        Err(err) => {
            tracing::error!("Cannot create sprite batch: {err}");
            return;
        }
    };
    batch.set_camera(&OrthographicCamera::screen(WIDTH as f32, HEIGHT as f32));

    let target_desc = RenderTargetDesc {
        label: Some("headless_frame"),
        target: &target,
        clear_color: Some([0.05, 0.05, 0.08, 1.0]),
    };

    for frame in 0..FRAMES {
        new_frame();
        profile_scope!("frame");

        batch.begin_frame();
        if let Err(err) = batch.extend(sprites(frame as f32 / 30.0)) {
            tracing::error!("Frame {frame}: {err}");
            return;
        }
        let submission = match batch.submit_frame(context.as_ref(), &target_desc) {
            Ok(submission) => submission,
            Err(err) => {
                tracing::error!("Frame {frame}: {err}");
                return;
            }
        };
        let stats = batch.end_frame();
        tracing::debug!(
            "Frame {} (submission {}): {} sprites, {} draws, {} bytes",
            stats.frame_index,
            submission,
            stats.instance_count,
            stats.draw_calls,
            stats.bytes_uploaded
        );

        // Drain the queue once per trip around the staging rings
        if (frame + 1) % batch.config().ring_depth as u64 == 0 {
            context.wait_idle();
            batch.notify_frame_completed(stats.frame_index);
        }
    }

    context.wait_idle();
    match read_texture_rgba8(&context, &target) {
        Ok(pixels) => {
            let lit = pixels
                .chunks_exact(4)
                .filter(|px| px[0] > 32 || px[1] > 32)
                .count();
            tracing::info!(
                "{} expansion: {:.1}% of {}x{} pixels covered",
                batch.expansion(),
                100.0 * lit as f32 / (WIDTH * HEIGHT) as f32,
                WIDTH,
                HEIGHT
            );
        }
        Err(err) => tracing::error!("Readback failed: {err}"),
    }
}
