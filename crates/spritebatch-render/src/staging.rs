//! Cycled host-visible staging regions.
//!
//! A [`StagingRing`] owns `depth` staging regions of identical size. Frame `f`
//! writes region `f % depth` and records a copy from it into a device buffer.
//! With a depth of `d`, a region is rewritten only after `d - 1` further frames
//! have been submitted, so the host never overwrites data an in-flight frame is
//! still copying from as long as at most `d - 1` frames are in flight.
//!
//! Frame numbers come from the caller. A frame that failed before it was
//! submitted may be written again under the same number.
//!
//! ```ignore
//! let mut ring = StagingRing::<GpuSpriteInstance>::new(ctx, "instances", 1024, 3)?;
//!
//! // Each frame
//! let mut writer = ring.begin_write(ctx, frame)?;
//! writer.extend_from_slice(&instances)?;
//! writer.finish();
//!
//! stream.begin_copy_scope()?;
//! ring.upload_to(stream, &device_buffer)?;
//! stream.end_copy_scope()?;
//! ```

use bytemuck::Pod;
use spritebatch_core::profiling::profile_function;
use spritebatch_test_utils::{CommandStream, GpuBuffer, RenderContext};

use crate::error::BatchError;

pub struct StagingRing<T: Pod> {
    label: String,
    regions: Vec<GpuBuffer>,
    /// Frame each region was last written in.
    generations: Vec<Option<u64>>,
    capacity: usize,
    /// Host shadow of the region being written.
    shadow: Vec<T>,
    /// Region and element count of the last finished write.
    current: Option<(usize, usize)>,
    /// Latest frame the GPU is known to have finished, if reported.
    completed: Option<u64>,
}

impl<T: Pod> StagingRing<T> {
    /// Create `depth` regions, each holding `capacity` elements.
    pub fn new(
        ctx: &dyn RenderContext,
        label: &str,
        capacity: usize,
        depth: usize,
    ) -> Result<Self, BatchError> {
        if depth == 0 {
            return Err(BatchError::Unsupported("staging ring depth must be at least 1"));
        }

        let region_size = (capacity.max(1) * std::mem::size_of::<T>()) as u64;
        let regions = (0..depth)
            .map(|slot| ctx.create_staging_region(&format!("{label}_staging_{slot}"), region_size))
            .collect();

        tracing::debug!(
            "Created staging ring '{}': {} regions of {} bytes",
            label,
            depth,
            region_size
        );

        Ok(Self {
            label: label.to_string(),
            regions,
            generations: vec![None; depth],
            capacity,
            shadow: Vec::with_capacity(capacity),
            current: None,
            completed: None,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn depth(&self) -> usize {
        self.regions.len()
    }

    /// Elements per region.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frame of the most recent write, if any.
    pub fn latest_frame(&self) -> Option<u64> {
        self.generations.iter().flatten().copied().max()
    }

    pub fn regions(&self) -> &[GpuBuffer] {
        &self.regions
    }

    /// Frame the region at `slot` was last written in.
    pub fn slot_generation(&self, slot: usize) -> Option<u64> {
        self.generations.get(slot).copied().flatten()
    }

    /// Region of the last finished write.
    pub fn current_region(&self) -> Option<&GpuBuffer> {
        self.current.map(|(slot, _)| &self.regions[slot])
    }

    /// Elements in the last finished write.
    pub fn written(&self) -> usize {
        self.current.map_or(0, |(_, count)| count)
    }

    pub fn written_bytes(&self) -> u64 {
        (self.written() * std::mem::size_of::<T>()) as u64
    }

    /// Report that the GPU finished every frame up to and including `frame`.
    ///
    /// `frame` is in the numbering passed to [`begin_write`](Self::begin_write),
    /// not a backend submission index. Once reported, `begin_write` refuses to
    /// reuse a region whose last write has not been reported complete.
    pub fn notify_frame_completed(&mut self, frame: u64) {
        self.completed = Some(self.completed.map_or(frame, |done| done.max(frame)));
    }

    /// Hand out region `frame % depth` for `frame`'s data.
    ///
    /// Fails with [`BatchError::SynchronizationViolation`] when the region was last
    /// written by a later frame, or by an earlier frame not yet reported complete
    /// while completion is being reported. Writing the same frame again reuses
    /// its region. The ring is left unchanged on error.
    pub fn begin_write<'a>(
        &'a mut self,
        ctx: &'a dyn RenderContext,
        frame: u64,
    ) -> Result<StagingWriter<'a, T>, BatchError> {
        profile_function!();
        let slot = (frame % self.regions.len() as u64) as usize;

        if let Some(last_written) = self.generations[slot] {
            // Without completion reports, round-robin spacing is all there is
            let reusable = last_written == frame
                || (last_written < frame
                    && self.completed.is_none_or(|completed| last_written <= completed));
            if !reusable {
                return Err(BatchError::SynchronizationViolation {
                    slot,
                    last_written,
                    current: frame,
                });
            }
        }

        tracing::trace!(
            "Staging ring '{}' frame {} writes region {}",
            self.label,
            frame,
            slot
        );

        self.generations[slot] = Some(frame);
        self.current = Some((slot, 0));
        self.shadow.clear();

        Ok(StagingWriter {
            ring: self,
            ctx,
            slot,
            finished: false,
        })
    }

    /// Record a copy of the last finished write into `dst`, returning the bytes copied.
    ///
    /// Must be recorded inside a copy scope. Nothing is recorded for an empty write.
    pub fn upload_to(
        &self,
        stream: &mut dyn CommandStream,
        dst: &GpuBuffer,
    ) -> Result<u64, BatchError> {
        profile_function!();
        let Some((slot, count)) = self.current else {
            return Ok(0);
        };
        if count == 0 {
            return Ok(0);
        }

        let bytes = (count * std::mem::size_of::<T>()) as u64;
        stream.copy_buffer_to_buffer(&self.regions[slot], 0, dst, 0, bytes)?;
        Ok(bytes)
    }
}

/// Fills one staging region. The data is flushed to the region by
/// [`finish`](Self::finish) or when the writer is dropped.
pub struct StagingWriter<'a, T: Pod> {
    ring: &'a mut StagingRing<T>,
    ctx: &'a dyn RenderContext,
    slot: usize,
    finished: bool,
}

impl<T: Pod> StagingWriter<'_, T> {
    pub fn push(&mut self, value: T) -> Result<(), BatchError> {
        if self.ring.shadow.len() >= self.ring.capacity {
            return Err(BatchError::OutOfBounds {
                requested: self.ring.shadow.len() + 1,
                capacity: self.ring.capacity,
            });
        }
        self.ring.shadow.push(value);
        Ok(())
    }

    /// Append all of `values`, or none of them if they do not fit.
    pub fn extend_from_slice(&mut self, values: &[T]) -> Result<(), BatchError> {
        let requested = self.ring.shadow.len() + values.len();
        if requested > self.ring.capacity {
            return Err(BatchError::OutOfBounds {
                requested,
                capacity: self.ring.capacity,
            });
        }
        self.ring.shadow.extend_from_slice(values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ring.shadow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.shadow.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.ring.capacity - self.ring.shadow.len()
    }

    /// Flush the written elements to the region, returning how many were written.
    pub fn finish(mut self) -> usize {
        self.flush()
    }

    fn flush(&mut self) -> usize {
        if self.finished {
            return self.ring.written();
        }
        self.finished = true;

        let count = self.ring.shadow.len();
        if count > 0 {
            self.ctx.write_buffer(
                &self.ring.regions[self.slot],
                0,
                bytemuck::cast_slice(&self.ring.shadow),
            );
        }
        self.ring.current = Some((self.slot, count));
        count
    }
}

impl<T: Pod> Drop for StagingWriter<'_, T> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spritebatch_test_utils::{BufferDesc, BufferUsage, MockRenderContext};

    fn device_buffer(ctx: &MockRenderContext, size: u64) -> GpuBuffer {
        ctx.create_buffer(&BufferDesc {
            label: Some("device"),
            size,
            usage: BufferUsage::STORAGE_READ | BufferUsage::COPY_DST,
        })
    }

    #[test]
    fn test_zero_depth_rejected() {
        let ctx = MockRenderContext::new();
        assert!(StagingRing::<u32>::new(&ctx, "ring", 4, 0).is_err());
    }

    #[test]
    fn test_regions_created_once() {
        let ctx = MockRenderContext::new();
        let ring = StagingRing::<u32>::new(&ctx, "ring", 4, 3).unwrap();
        assert_eq!(ring.depth(), 3);
        assert_eq!(ctx.count_buffer_creates(), 3);
        assert!(ring.regions().iter().all(|region| region.size() == 16));
    }

    #[test]
    fn test_regions_cycle_in_order() {
        let ctx = MockRenderContext::new();
        let mut ring = StagingRing::<u32>::new(&ctx, "ring", 4, 3).unwrap();
        let mut used = Vec::new();
        for frame in 0..6 {
            let writer = ring.begin_write(&ctx, frame).unwrap();
            used.push(writer.slot);
        }
        assert_eq!(used, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(ring.slot_generation(0), Some(3));
    }

    #[test]
    fn test_writer_overflow_is_out_of_bounds() {
        let ctx = MockRenderContext::new();
        let mut ring = StagingRing::<u32>::new(&ctx, "ring", 2, 2).unwrap();
        let mut writer = ring.begin_write(&ctx, 0).unwrap();
        writer.push(1).unwrap();
        writer.push(2).unwrap();
        assert_eq!(
            writer.push(3),
            Err(BatchError::OutOfBounds {
                requested: 3,
                capacity: 2
            })
        );
        assert_eq!(
            writer.extend_from_slice(&[4, 5]),
            Err(BatchError::OutOfBounds {
                requested: 4,
                capacity: 2
            })
        );
        assert_eq!(writer.finish(), 2);
    }

    #[test]
    fn test_drop_flushes_to_region() {
        let ctx = MockRenderContext::new();
        let mut ring = StagingRing::<u32>::new(&ctx, "ring", 2, 2).unwrap();
        {
            let mut writer = ring.begin_write(&ctx, 0).unwrap();
            writer.extend_from_slice(&[7, 9]).unwrap();
        }
        assert_eq!(ring.written(), 2);
        let region = ring.current_region().unwrap();
        let contents = ctx.buffer_contents(region);
        assert_eq!(bytemuck::pod_read_unaligned::<u32>(&contents[4..8]), 9);
    }

    #[test]
    fn test_upload_records_copy_of_written_bytes() {
        let ctx = MockRenderContext::new();
        let mut ring = StagingRing::<u32>::new(&ctx, "ring", 4, 2).unwrap();
        let dst = device_buffer(&ctx, 16);
        ring.begin_write(&ctx, 0)
            .unwrap()
            .extend_from_slice(&[1, 2, 3])
            .unwrap();

        let mut stream = ctx.acquire_command_stream("upload");
        stream.begin_copy_scope().unwrap();
        assert_eq!(ring.upload_to(stream.as_mut(), &dst).unwrap(), 12);
        stream.end_copy_scope().unwrap();
        ctx.submit(stream).unwrap();

        let contents = ctx.buffer_contents(&dst);
        assert_eq!(bytemuck::pod_read_unaligned::<u32>(&contents[8..12]), 3);
    }

    #[test]
    fn test_upload_outside_copy_scope_fails() {
        let ctx = MockRenderContext::new();
        let mut ring = StagingRing::<u32>::new(&ctx, "ring", 4, 2).unwrap();
        let dst = device_buffer(&ctx, 16);
        ring.begin_write(&ctx, 0).unwrap().push(1).unwrap();

        let mut stream = ctx.acquire_command_stream("upload");
        assert!(matches!(
            ring.upload_to(stream.as_mut(), &dst),
            Err(BatchError::Scope(_))
        ));
    }

    #[test]
    fn test_empty_write_uploads_nothing() {
        let ctx = MockRenderContext::new();
        let mut ring = StagingRing::<u32>::new(&ctx, "ring", 4, 2).unwrap();
        let dst = device_buffer(&ctx, 16);
        ring.begin_write(&ctx, 0).unwrap().finish();

        let mut stream = ctx.acquire_command_stream("upload");
        stream.begin_copy_scope().unwrap();
        assert_eq!(ring.upload_to(stream.as_mut(), &dst).unwrap(), 0);
        assert_eq!(ctx.count_buffer_writes(), 0);
    }

    #[test]
    fn test_reuse_before_completion_is_violation() {
        let ctx = MockRenderContext::new();
        let mut ring = StagingRing::<u32>::new(&ctx, "ring", 4, 2).unwrap();
        ring.begin_write(&ctx, 0).unwrap().finish();
        ring.begin_write(&ctx, 1).unwrap().finish();
        ring.notify_frame_completed(0);

        // Frame 2 reuses region 0, whose frame 0 has completed
        ring.begin_write(&ctx, 2).unwrap().finish();

        // Frame 3 reuses region 1, but frame 1 has not been reported complete
        let err = ring.begin_write(&ctx, 3).err();
        assert_eq!(
            err,
            Some(BatchError::SynchronizationViolation {
                slot: 1,
                last_written: 1,
                current: 3,
            })
        );
        assert_eq!(ring.latest_frame(), Some(2));

        ring.notify_frame_completed(1);
        assert!(ring.begin_write(&ctx, 3).is_ok());
    }

    #[test]
    fn test_same_frame_may_be_written_again() {
        let ctx = MockRenderContext::new();
        let mut ring = StagingRing::<u32>::new(&ctx, "ring", 4, 2).unwrap();
        ring.begin_write(&ctx, 0).unwrap().finish();
        ring.notify_frame_completed(0);
        ring.begin_write(&ctx, 1).unwrap().push(5).unwrap();

        // Frame 1 was abandoned before submission and is staged again
        ring.begin_write(&ctx, 1).unwrap().push(6).unwrap();
        assert_eq!(ring.slot_generation(1), Some(1));
        assert_eq!(ring.written(), 1);
    }

    #[test]
    fn test_frame_going_backwards_is_violation() {
        let ctx = MockRenderContext::new();
        let mut ring = StagingRing::<u32>::new(&ctx, "ring", 4, 2).unwrap();
        ring.begin_write(&ctx, 4).unwrap().finish();
        assert_eq!(
            ring.begin_write(&ctx, 2).err(),
            Some(BatchError::SynchronizationViolation {
                slot: 0,
                last_written: 4,
                current: 2,
            })
        );
        // Skipping ahead is fine
        assert!(ring.begin_write(&ctx, 7).is_ok());
    }
}
