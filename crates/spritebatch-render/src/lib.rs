//! Spritebatch Render
//!
//! Draws large numbers of textured, colored, rotated 2D sprites in a single draw
//! call. Sprites are collected into an [`InstanceStore`] each frame and expanded
//! into quads by one of three interchangeable strategies:
//!
//! - [`HostExpansion`] - CPU builds four vertices per sprite and uploads them
//! - [`ComputeExpansion`] - a compute kernel expands uploaded instances
//! - [`PullExpansion`] - the vertex shader reads instances by `vertex_index`
//!
//! All host writes go through [`StagingRing`]s of `ring_depth` regions, so the
//! host can prepare frame N+1 while the GPU still reads frame N.
//!
//! The batch only talks to the GPU through [`RenderContext`] and
//! [`CommandStream`], implemented here for [`GraphicsContext`] and by the mock in
//! `spritebatch-test-utils`.
//!
//! # Example
//!
//! ```rust,no_run
//! use spritebatch_render::*;
//! use glam::{Vec2, Vec3};
//!
//! let ctx = GraphicsContext::new_owned_sync().expect("no GPU available");
//! let target = create_render_target(
//!     ctx.as_ref(),
//!     "target",
//!     256,
//!     256,
//!     wgpu::TextureFormat::Rgba8UnormSrgb,
//! );
//!
//! let mut batch = SpriteBatch::new(ctx.as_ref(), SpriteBatchConfig::default()).unwrap();
//! batch.set_camera(&OrthographicCamera::screen(256.0, 256.0));
//!
//! batch.begin_frame();
//! batch.push(SpriteInstance::new(Vec3::new(128.0, 128.0, 0.0), Vec2::splat(32.0))).unwrap();
//! batch
//!     .submit_frame(
//!         ctx.as_ref(),
//!         &RenderTargetDesc {
//!             label: Some("sprites"),
//!             target: &target,
//!             clear_color: Some([0.0, 0.0, 0.0, 1.0]),
//!         },
//!     )
//!     .unwrap();
//! let stats = batch.end_frame();
//! assert_eq!(stats.draw_calls, 1);
//! ```

pub mod atlas;
pub mod batch;
pub mod camera;
pub mod config;
mod context;
mod context_impl;
pub mod error;
pub mod expansion;
pub mod instance;
pub mod readback;
pub mod staging;
pub mod vertex;

pub use atlas::{AtlasRegion, SpriteSheetLayout, SpriteUv, create_rgba8_texture};
pub use batch::{BatchStats, SpriteBatch};
pub use camera::OrthographicCamera;
pub use config::{
    CapacityPolicy, DEFAULT_RING_DEPTH, EXPANSION_WORKGROUP_SIZE, ExpansionKind,
    MAX_SPRITE_COUNT, SpriteBatchConfig,
};
pub use context::{GraphicsContext, GraphicsContextDescriptor};
pub use context_impl::WgpuCommandStream;
pub use error::{BatchError, GraphicsError};
pub use expansion::{
    ComputeExpansion, DrawParams, ExpansionStrategy, FrameUniforms, HostExpansion,
    PullExpansion, SharedResources,
};
pub use instance::{GpuSpriteInstance, InstanceStore, SpriteInstance};
pub use readback::{create_render_target, read_texture_rgba8};
pub use staging::{StagingRing, StagingWriter};
pub use vertex::{INDICES_PER_SPRITE, QuadVertex, VERTICES_PER_SPRITE};

// Re-export the graphics interface so callers need a single dependency.
pub use spritebatch_test_utils::{
    BufferAccess, CommandStream, GpuBuffer, GpuSampler, GpuTexture, RenderContext,
    RenderTargetDesc, Scope, ScopeError,
};
pub use wgpu;
