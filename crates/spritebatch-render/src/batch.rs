//! The sprite batch: instance store, expansion strategy and shared bindings.

use std::collections::VecDeque;

use glam::Mat4;
use spritebatch_core::profiling::profile_function;
use spritebatch_test_utils::{
    CommandStream, GpuSampler, GpuTexture, RenderContext, RenderTargetDesc,
};

use crate::atlas::create_rgba8_texture;
use crate::camera::OrthographicCamera;
use crate::config::{ExpansionKind, SpriteBatchConfig};
use crate::error::BatchError;
use crate::expansion::{
    DrawParams, ExpansionStrategy, FrameUniforms, SharedResources, create_strategy,
};
use crate::instance::{InstanceStore, SpriteInstance};

/// Counters for the current (or last finished) frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub instance_count: u32,
    /// Sprites dropped by [`CapacityPolicy::Truncate`](crate::CapacityPolicy::Truncate).
    pub truncated_count: u32,
    pub draw_calls: u32,
    pub dispatches: u32,
    pub bytes_uploaded: u64,
    /// Frames are numbered by `prepare` calls, starting at 0.
    pub frame_index: u64,
}

/// Batches up to `max_sprites` sprites per frame into a single draw call.
///
/// # Frame lifecycle
///
/// ```ignore
/// batch.begin_frame();
/// batch.extend(sprites)?;
///
/// let mut stream = ctx.acquire_command_stream("frame");
/// batch.prepare(ctx, stream.as_mut())?;      // copy + compute scopes
/// stream.begin_render_scope(&target)?;
/// batch.draw(stream.as_mut())?;               // inside the caller's render scope
/// stream.end_render_scope()?;
/// ctx.submit(stream)?;
///
/// let stats = batch.end_frame();
/// ```
///
/// Staging memory is cycled through `ring_depth` regions, so the host never waits
/// on the GPU as long as no more than `ring_depth - 1` frames are in flight.
/// Report completion with
/// [`notify_submission_completed`](Self::notify_submission_completed) to have
/// reuse checked against it.
pub struct SpriteBatch {
    config: SpriteBatchConfig,
    kind: ExpansionKind,
    store: InstanceStore,
    strategy: Box<dyn ExpansionStrategy>,
    shared: SharedResources,
    default_texture: GpuTexture,
    view_proj: Mat4,
    params: Option<DrawParams>,
    draw_calls: u32,
    /// Frames prepared so far.
    frame: u64,
    frame_index: u64,
    /// `(submission, frame)` for frames not yet reported complete, oldest first.
    in_flight: VecDeque<(u64, u64)>,
}

/// Submissions remembered for completion reports. Older entries are dropped.
const MAX_TRACKED_SUBMISSIONS: usize = 64;

impl SpriteBatch {
    pub fn new(ctx: &dyn RenderContext, config: SpriteBatchConfig) -> Result<Self, BatchError> {
        if config.max_sprites == 0 {
            return Err(BatchError::Unsupported("sprite batch capacity must be at least 1"));
        }

        let kind = config.resolve_expansion(ctx.supports_compute());
        if !ctx.supports_compute() {
            match kind {
                ExpansionKind::Compute => {
                    return Err(BatchError::Unsupported(
                        "compute expansion requires compute shader support",
                    ));
                }
                ExpansionKind::Pull => {
                    return Err(BatchError::Unsupported(
                        "vertex pulling requires storage buffers in the vertex stage",
                    ));
                }
                _ => {}
            }
        }

        let default_texture =
            create_rgba8_texture(ctx, &format!("{}_white", config.label), 1, 1, &[255; 4]);
        let shared = SharedResources::new(ctx, &config, default_texture.clone())?;
        let strategy = create_strategy(ctx, &config, kind)?;

        tracing::info!(
            "Created sprite batch '{}': {} expansion, {} sprites, ring depth {}",
            config.label,
            kind,
            config.max_sprites,
            config.ring_depth
        );

        Ok(Self {
            store: InstanceStore::new(config.max_sprites, config.capacity_policy),
            config,
            kind,
            strategy,
            shared,
            default_texture,
            view_proj: Mat4::IDENTITY,
            params: None,
            draw_calls: 0,
            frame: 0,
            frame_index: 0,
            in_flight: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &SpriteBatchConfig {
        &self.config
    }

    /// The expansion variant in use, with `Auto` resolved.
    pub fn expansion(&self) -> ExpansionKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn set_view_projection(&mut self, view_proj: Mat4) {
        self.view_proj = view_proj;
    }

    pub fn set_camera(&mut self, camera: &OrthographicCamera) {
        self.view_proj = camera.view_projection();
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_proj
    }

    /// Sample `texture` from now on, optionally with a new sampler.
    pub fn set_texture(&mut self, texture: GpuTexture, sampler: Option<GpuSampler>) {
        self.shared.set_texture(texture, sampler);
    }

    /// Go back to the built-in 1x1 white texture.
    pub fn clear_texture(&mut self) {
        self.shared.set_texture(self.default_texture.clone(), None);
    }

    pub fn texture(&self) -> &GpuTexture {
        self.shared.texture()
    }

    /// Start a new frame, dropping last frame's sprites.
    pub fn begin_frame(&mut self) {
        self.store.reset();
        self.params = None;
        self.draw_calls = 0;
        self.frame_index = self.frame;
    }

    /// Add a sprite, returning its draw index or `None` if it was truncated.
    pub fn push(&mut self, instance: SpriteInstance) -> Result<Option<usize>, BatchError> {
        self.store.push(instance)
    }

    /// Add sprites in draw order, returning how many were stored.
    pub fn extend<I>(&mut self, instances: I) -> Result<usize, BatchError>
    where
        I: IntoIterator<Item = SpriteInstance>,
    {
        self.store.extend(instances)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn instances(&self) -> &[SpriteInstance] {
        self.store.as_slice()
    }

    /// Stage this frame's sprites and record uploads and expansion work.
    ///
    /// Must be called with no scope open on `stream`. Records one copy scope and,
    /// for compute expansion, one compute scope followed by a barrier.
    ///
    /// The frame number only advances on success, so a failed prepare can be
    /// retried and restages the same frame.
    pub fn prepare(
        &mut self,
        ctx: &dyn RenderContext,
        stream: &mut dyn CommandStream,
    ) -> Result<DrawParams, BatchError> {
        profile_function!();

        let frame = self.frame;
        let live = self.store.len() as u32;
        self.shared
            .write_uniforms(ctx, frame, FrameUniforms::new(self.view_proj, live))?;
        let params =
            self.strategy
                .prepare(ctx, stream, frame, self.store.as_slice(), &self.shared)?;

        self.frame_index = frame;
        self.frame = frame + 1;
        self.params = Some(params);

        tracing::trace!(
            "Sprite batch '{}' frame {}: {} sprites, {} bytes uploaded",
            self.config.label,
            self.frame_index,
            live,
            params.bytes_uploaded
        );
        Ok(params)
    }

    /// Record this frame's draw inside the caller's render scope.
    ///
    /// Returns the number of draw calls recorded: 1, or 0 for an empty frame.
    pub fn draw(&mut self, stream: &mut dyn CommandStream) -> Result<u32, BatchError> {
        profile_function!();

        let Some(params) = self.params else {
            tracing::warn!(
                "Sprite batch '{}' drawn before prepare, skipping",
                self.config.label
            );
            return Ok(0);
        };

        let draws = self.strategy.draw(stream, &params, &self.shared)?;
        self.draw_calls += draws;
        Ok(draws)
    }

    /// Finish the frame and return its stats.
    pub fn end_frame(&mut self) -> BatchStats {
        let stats = self.stats();
        if stats.truncated_count > 0 {
            tracing::debug!(
                "Sprite batch '{}' frame {} truncated {} sprites",
                self.config.label,
                stats.frame_index,
                stats.truncated_count
            );
        }
        stats
    }

    /// Prepare, draw into `target` and submit in one command stream.
    ///
    /// Returns the submission index.
    pub fn submit_frame(
        &mut self,
        ctx: &dyn RenderContext,
        target: &RenderTargetDesc<'_>,
    ) -> Result<u64, BatchError> {
        let mut stream = ctx.acquire_command_stream(&self.config.label);
        self.prepare(ctx, stream.as_mut())?;
        stream.begin_render_scope(target)?;
        self.draw(stream.as_mut())?;
        stream.end_render_scope()?;
        let submission = ctx.submit(stream)?;
        self.track_submission(submission);
        Ok(submission)
    }

    /// Remember that the last prepared frame went out as `submission`.
    ///
    /// [`submit_frame`](Self::submit_frame) does this itself. Callers that submit
    /// their own streams call it after `RenderContext::submit`.
    pub fn track_submission(&mut self, submission: u64) {
        if self.in_flight.len() == MAX_TRACKED_SUBMISSIONS {
            self.in_flight.pop_front();
        }
        self.in_flight.push_back((submission, self.frame_index));
    }

    /// Report that the backend finished every submission up to and including
    /// `submission`, as returned by `RenderContext::submit`.
    ///
    /// Submissions from other batches sharing the context are ignored.
    pub fn notify_submission_completed(&mut self, submission: u64) {
        let mut done = None;
        while let Some(&(index, frame)) = self.in_flight.front() {
            if index > submission {
                break;
            }
            done = Some(frame);
            self.in_flight.pop_front();
        }
        if let Some(frame) = done {
            self.notify_frame_completed(frame);
        }
    }

    /// Report that the GPU finished every frame up to and including `frame`.
    ///
    /// `frame` is this batch's [`BatchStats::frame_index`]. It matches the
    /// backend's submission index only while this batch makes every submission on
    /// its context, one per frame; otherwise use
    /// [`notify_submission_completed`](Self::notify_submission_completed).
    pub fn notify_frame_completed(&mut self, frame: u64) {
        self.in_flight.retain(|&(_, pending)| pending > frame);
        self.shared.notify_frame_completed(frame);
        self.strategy.notify_frame_completed(frame);
    }

    pub fn stats(&self) -> BatchStats {
        let params = self.params.unwrap_or_default();
        BatchStats {
            instance_count: self.store.len() as u32,
            truncated_count: self.store.truncated() as u32,
            draw_calls: self.draw_calls,
            dispatches: params.dispatches,
            bytes_uploaded: params.bytes_uploaded,
            frame_index: self.frame_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapacityPolicy;
    use glam::{Vec2, Vec3};
    use spritebatch_test_utils::MockRenderContext;

    fn sprite(x: f32) -> SpriteInstance {
        SpriteInstance::new(Vec3::new(x, 0.0, 0.0), Vec2::splat(8.0))
    }

    fn config(kind: ExpansionKind) -> SpriteBatchConfig {
        SpriteBatchConfig::default()
            .with_max_sprites(16)
            .with_expansion(kind)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let ctx = MockRenderContext::new();
        let result = SpriteBatch::new(&ctx, config(ExpansionKind::Host).with_max_sprites(0));
        assert!(matches!(result, Err(BatchError::Unsupported(_))));
    }

    #[test]
    fn test_compute_without_support_is_unsupported() {
        let ctx = MockRenderContext::new().without_compute();
        let result = SpriteBatch::new(&ctx, config(ExpansionKind::Compute));
        assert!(matches!(result, Err(BatchError::Unsupported(_))));
    }

    #[test]
    fn test_auto_resolves_against_device() {
        let ctx = MockRenderContext::new().without_compute();
        let batch = SpriteBatch::new(&ctx, config(ExpansionKind::Auto)).unwrap();
        assert_eq!(batch.expansion(), ExpansionKind::Host);
    }

    #[test]
    fn test_draw_before_prepare_records_nothing() {
        let ctx = MockRenderContext::new();
        let mut batch = SpriteBatch::new(&ctx, config(ExpansionKind::Host)).unwrap();
        batch.begin_frame();
        batch.push(sprite(0.0)).unwrap();
        let mut stream = ctx.acquire_command_stream("frame");
        assert_eq!(batch.draw(stream.as_mut()), Ok(0));
    }

    #[test]
    fn test_stats_track_frame() {
        let ctx = MockRenderContext::new();
        let mut batch = SpriteBatch::new(
            &ctx,
            config(ExpansionKind::Pull)
                .with_max_sprites(2)
                .with_capacity_policy(CapacityPolicy::Truncate),
        )
        .unwrap();

        for frame in 0..2u64 {
            batch.begin_frame();
            batch.extend((0..3).map(|i| sprite(i as f32))).unwrap();
            let mut stream = ctx.acquire_command_stream("frame");
            batch.prepare(&ctx, stream.as_mut()).unwrap();

            let stats = batch.end_frame();
            assert_eq!(stats.frame_index, frame);
            assert_eq!(stats.instance_count, 2);
            assert_eq!(stats.truncated_count, 1);
            assert_eq!(stats.dispatches, 0);
            // Uniforms plus two 64 byte instances
            assert_eq!(stats.bytes_uploaded, 80 + 128);
        }
    }

    #[test]
    fn test_failed_prepare_does_not_advance_staging() {
        let ctx = MockRenderContext::new();
        let mut batch = SpriteBatch::new(
            &ctx,
            config(ExpansionKind::Host).with_ring_depth(2),
        )
        .unwrap();

        batch.begin_frame();
        batch.push(sprite(0.0)).unwrap();
        let mut stream = ctx.acquire_command_stream("broken");
        stream.begin_copy_scope().unwrap();
        assert!(matches!(
            batch.prepare(&ctx, stream.as_mut()),
            Err(BatchError::Scope(_))
        ));

        let mut stream = ctx.acquire_command_stream("retry");
        batch.prepare(&ctx, stream.as_mut()).unwrap();
        assert_eq!(batch.stats().frame_index, 0);
    }

    #[test]
    fn test_submission_completion_maps_to_frames() {
        let ctx = MockRenderContext::new();
        let mut batch = SpriteBatch::new(&ctx, config(ExpansionKind::Host)).unwrap();
        batch.track_submission(10);
        batch.frame_index = 1;
        batch.track_submission(12);

        batch.notify_submission_completed(11);
        assert_eq!(batch.in_flight, VecDeque::from([(12, 1)]));
        batch.notify_submission_completed(12);
        assert!(batch.in_flight.is_empty());
    }

    #[test]
    fn test_set_camera_updates_view_projection() {
        let ctx = MockRenderContext::new();
        let mut batch = SpriteBatch::new(&ctx, config(ExpansionKind::Host)).unwrap();
        let camera = OrthographicCamera::screen(640.0, 480.0);
        batch.set_camera(&camera);
        assert_eq!(batch.view_projection(), camera.view_projection());
    }
}
