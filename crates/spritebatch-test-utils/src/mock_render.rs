//! Mock implementation of RenderContext for testing.
//!
//! The mock keeps the byte contents of every buffer and executes submitted
//! streams on the CPU: copies move bytes, dispatches run registered kernels and
//! draws are captured as [`DrawRecord`]s with a snapshot of their inputs.
//!
//! Submissions stay "in flight" for a configurable number of later submissions.
//! A host write to a buffer that an in-flight submission accesses is recorded as a
//! [`Hazard`], which is how tests observe write-after-read races without a GPU.

use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Range;
use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::Mutex;

use crate::descriptors::*;
use crate::gpu_types::*;
use crate::render_context::*;

/// Records a context-level call for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    CreateBuffer {
        label: Option<String>,
        size: u64,
        usage: BufferUsage,
    },
    WriteBuffer {
        buffer_id: usize,
        offset: u64,
        size: usize,
    },
    CreateTexture {
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    },
    WriteTexture {
        texture_id: usize,
        size: usize,
    },
    CreateSampler {
        label: Option<String>,
    },
    CreateRenderPipeline {
        label: String,
    },
    CreateComputePipeline {
        label: String,
    },
    Submit {
        index: u64,
        commands: usize,
    },
    WaitIdle,
}

/// One command recorded into a [`MockCommandStream`].
#[derive(Debug, Clone)]
pub enum RecordedCommand {
    BeginCopyScope,
    EndCopyScope,
    CopyBufferToBuffer {
        src: GpuBuffer,
        src_offset: u64,
        dst: GpuBuffer,
        dst_offset: u64,
        size: u64,
    },
    BeginComputeScope {
        label: String,
    },
    EndComputeScope,
    BindComputePipeline(GpuComputePipeline),
    Dispatch {
        workgroups: [u32; 3],
    },
    BeginRenderScope {
        label: Option<String>,
        target: GpuTexture,
        clear_color: Option<[f64; 4]>,
    },
    EndRenderScope,
    BindRenderPipeline(GpuRenderPipeline),
    BindVertexBuffer {
        slot: u32,
        buffer: GpuBuffer,
    },
    BindIndexBuffer {
        buffer: GpuBuffer,
        format: wgpu::IndexFormat,
    },
    BindUniformBuffer {
        binding: u32,
        buffer: GpuBuffer,
    },
    BindStorageBuffer {
        binding: u32,
        buffer: GpuBuffer,
        read_only: bool,
    },
    BindTexture {
        binding: u32,
        texture: GpuTexture,
    },
    BindSampler {
        binding: u32,
        sampler: GpuSampler,
    },
    BufferBarrier {
        buffer: GpuBuffer,
        from: BufferAccess,
        to: BufferAccess,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

/// A draw executed by the mock, with the contents of everything it read.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub submission: u64,
    pub pipeline: String,
    /// Vertex range for `draw`, index range for `draw_indexed`.
    pub elements: Range<u32>,
    pub base_vertex: i32,
    pub instances: Range<u32>,
    pub indexed: bool,
    pub vertex_buffers: BTreeMap<u32, Vec<u8>>,
    pub index_buffer: Option<(Vec<u8>, wgpu::IndexFormat)>,
    /// Uniform and storage buffer contents by binding.
    pub bindings: BTreeMap<u32, Vec<u8>>,
    pub target: Option<usize>,
}

impl DrawRecord {
    /// Number of vertices the draw invokes.
    pub fn element_count(&self) -> u32 {
        self.elements.end.saturating_sub(self.elements.start)
    }

    /// Vertex indices the draw invokes, in submission order.
    ///
    /// For indexed draws the index buffer is resolved and `base_vertex` applied.
    pub fn vertex_ids(&self) -> Vec<u32> {
        if !self.indexed {
            return self.elements.clone().collect();
        }
        let Some((bytes, format)) = &self.index_buffer else {
            return Vec::new();
        };
        let stride = match format {
            wgpu::IndexFormat::Uint16 => 2,
            wgpu::IndexFormat::Uint32 => 4,
        };
        self.elements
            .clone()
            .filter_map(|i| {
                let at = i as usize * stride;
                let raw = bytes.get(at..at + stride)?;
                let index = match format {
                    wgpu::IndexFormat::Uint16 => u16::from_le_bytes([raw[0], raw[1]]) as i64,
                    wgpu::IndexFormat::Uint32 => {
                        u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64
                    }
                };
                u32::try_from(index + self.base_vertex as i64).ok()
            })
            .collect()
    }
}

/// A dispatch executed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub submission: u64,
    pub pipeline: String,
    pub workgroups: [u32; 3],
    /// Whether a kernel was registered for the pipeline.
    pub executed: bool,
}

/// A host write that raced with an in-flight submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hazard {
    pub buffer_id: usize,
    pub label: Option<String>,
    pub in_flight_submission: u64,
    pub offset: u64,
    pub size: usize,
}

/// Buffers visible to a CPU kernel, by binding.
pub struct KernelInvocation<'a> {
    pub workgroups: [u32; 3],
    bindings: &'a mut BTreeMap<u32, Vec<u8>>,
}

impl KernelInvocation<'_> {
    /// Contents of the buffer at `binding`, empty if nothing is bound.
    pub fn binding(&self, binding: u32) -> &[u8] {
        self.bindings
            .get(&binding)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Mutable contents of the buffer at `binding`.
    ///
    /// Only read-write storage bindings are written back after the kernel runs.
    pub fn binding_mut(&mut self, binding: u32) -> &mut [u8] {
        self.bindings
            .get_mut(&binding)
            .map(Vec::as_mut_slice)
            .unwrap_or_default()
    }
}

type MockKernel = Arc<dyn Fn(&mut KernelInvocation<'_>) + Send + Sync>;

#[derive(Debug, Clone)]
struct MockBuffer {
    label: Option<String>,
    data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct MockTexture {
    data: Vec<u8>,
}

#[derive(Debug)]
struct InFlight {
    index: u64,
    buffers: AHashSet<usize>,
}

#[derive(Debug, Default)]
struct MockQueue {
    frame_latency: usize,
    next_submission: u64,
    completed: Option<u64>,
    in_flight: VecDeque<InFlight>,
}

impl MockQueue {
    fn retire_to_latency(&mut self) {
        while self.in_flight.len() > self.frame_latency {
            if let Some(done) = self.in_flight.pop_front() {
                self.completed = Some(done.index);
            }
        }
    }
}

/// Command stream recorded by [`MockRenderContext`].
///
/// Scope rules are enforced while recording, so misuse is reported at the call
/// site exactly as the real backend reports it.
pub struct MockCommandStream {
    label: String,
    commands: Vec<RecordedCommand>,
    scopes: ScopeTracker,
    render_pipeline_bound: bool,
    compute_pipeline_bound: bool,
}

impl MockCommandStream {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            commands: Vec::new(),
            scopes: ScopeTracker::new(),
            render_pipeline_bound: false,
            compute_pipeline_bound: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }
}

const ANY_PIPELINE_SCOPE: &[Scope] = &[Scope::Compute, Scope::Render];

impl CommandStream for MockCommandStream {
    fn begin_copy_scope(&mut self) -> Result<(), ScopeError> {
        self.scopes.begin(Scope::Copy)?;
        self.commands.push(RecordedCommand::BeginCopyScope);
        Ok(())
    }

    fn end_copy_scope(&mut self) -> Result<(), ScopeError> {
        self.scopes.end(Scope::Copy)?;
        self.commands.push(RecordedCommand::EndCopyScope);
        Ok(())
    }

    fn copy_buffer_to_buffer(
        &mut self,
        src: &GpuBuffer,
        src_offset: u64,
        dst: &GpuBuffer,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), ScopeError> {
        self.scopes.require("copy_buffer_to_buffer", &[Scope::Copy])?;
        check_copy_range("source", src, src_offset, size)?;
        check_copy_range("destination", dst, dst_offset, size)?;
        self.commands.push(RecordedCommand::CopyBufferToBuffer {
            src: src.clone(),
            src_offset,
            dst: dst.clone(),
            dst_offset,
            size,
        });
        Ok(())
    }

    fn begin_compute_scope(&mut self, label: &str) -> Result<(), ScopeError> {
        self.scopes.begin(Scope::Compute)?;
        self.compute_pipeline_bound = false;
        self.commands.push(RecordedCommand::BeginComputeScope {
            label: label.to_string(),
        });
        Ok(())
    }

    fn end_compute_scope(&mut self) -> Result<(), ScopeError> {
        self.scopes.end(Scope::Compute)?;
        self.commands.push(RecordedCommand::EndComputeScope);
        Ok(())
    }

    fn bind_compute_pipeline(&mut self, pipeline: &GpuComputePipeline) -> Result<(), ScopeError> {
        self.scopes.require("bind_compute_pipeline", &[Scope::Compute])?;
        self.compute_pipeline_bound = true;
        self.commands
            .push(RecordedCommand::BindComputePipeline(pipeline.clone()));
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), ScopeError> {
        self.scopes.require("dispatch", &[Scope::Compute])?;
        if !self.compute_pipeline_bound {
            return Err(ScopeError::NoPipeline {
                operation: "dispatch",
            });
        }
        self.commands.push(RecordedCommand::Dispatch {
            workgroups: [x, y, z],
        });
        Ok(())
    }

    fn begin_render_scope(&mut self, target: &RenderTargetDesc<'_>) -> Result<(), ScopeError> {
        self.scopes.begin(Scope::Render)?;
        self.render_pipeline_bound = false;
        self.commands.push(RecordedCommand::BeginRenderScope {
            label: target.label.map(str::to_string),
            target: target.target.clone(),
            clear_color: target.clear_color,
        });
        Ok(())
    }

    fn end_render_scope(&mut self) -> Result<(), ScopeError> {
        self.scopes.end(Scope::Render)?;
        self.commands.push(RecordedCommand::EndRenderScope);
        Ok(())
    }

    fn bind_render_pipeline(&mut self, pipeline: &GpuRenderPipeline) -> Result<(), ScopeError> {
        self.scopes.require("bind_render_pipeline", &[Scope::Render])?;
        self.render_pipeline_bound = true;
        self.commands
            .push(RecordedCommand::BindRenderPipeline(pipeline.clone()));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &GpuBuffer) -> Result<(), ScopeError> {
        self.scopes.require("bind_vertex_buffer", &[Scope::Render])?;
        self.commands.push(RecordedCommand::BindVertexBuffer {
            slot,
            buffer: buffer.clone(),
        });
        Ok(())
    }

    fn bind_index_buffer(
        &mut self,
        buffer: &GpuBuffer,
        format: wgpu::IndexFormat,
    ) -> Result<(), ScopeError> {
        self.scopes.require("bind_index_buffer", &[Scope::Render])?;
        self.commands.push(RecordedCommand::BindIndexBuffer {
            buffer: buffer.clone(),
            format,
        });
        Ok(())
    }

    fn bind_uniform_buffer(&mut self, binding: u32, buffer: &GpuBuffer) -> Result<(), ScopeError> {
        self.scopes
            .require("bind_uniform_buffer", ANY_PIPELINE_SCOPE)?;
        self.commands.push(RecordedCommand::BindUniformBuffer {
            binding,
            buffer: buffer.clone(),
        });
        Ok(())
    }

    fn bind_storage_buffer(
        &mut self,
        binding: u32,
        buffer: &GpuBuffer,
        read_only: bool,
    ) -> Result<(), ScopeError> {
        self.scopes
            .require("bind_storage_buffer", ANY_PIPELINE_SCOPE)?;
        self.commands.push(RecordedCommand::BindStorageBuffer {
            binding,
            buffer: buffer.clone(),
            read_only,
        });
        Ok(())
    }

    fn bind_texture(&mut self, binding: u32, texture: &GpuTexture) -> Result<(), ScopeError> {
        self.scopes.require("bind_texture", ANY_PIPELINE_SCOPE)?;
        self.commands.push(RecordedCommand::BindTexture {
            binding,
            texture: texture.clone(),
        });
        Ok(())
    }

    fn bind_sampler(&mut self, binding: u32, sampler: &GpuSampler) -> Result<(), ScopeError> {
        self.scopes.require("bind_sampler", ANY_PIPELINE_SCOPE)?;
        self.commands.push(RecordedCommand::BindSampler {
            binding,
            sampler: sampler.clone(),
        });
        Ok(())
    }

    fn buffer_barrier(
        &mut self,
        buffer: &GpuBuffer,
        from: BufferAccess,
        to: BufferAccess,
    ) -> Result<(), ScopeError> {
        self.scopes.require_none("buffer_barrier")?;
        self.commands.push(RecordedCommand::BufferBarrier {
            buffer: buffer.clone(),
            from,
            to,
        });
        Ok(())
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) -> Result<(), ScopeError> {
        self.scopes.require("draw", &[Scope::Render])?;
        if !self.render_pipeline_bound {
            return Err(ScopeError::NoPipeline { operation: "draw" });
        }
        self.commands
            .push(RecordedCommand::Draw { vertices, instances });
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    ) -> Result<(), ScopeError> {
        self.scopes.require("draw_indexed", &[Scope::Render])?;
        if !self.render_pipeline_bound {
            return Err(ScopeError::NoPipeline {
                operation: "draw_indexed",
            });
        }
        self.commands.push(RecordedCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
        Ok(())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

#[derive(Debug, Clone)]
enum Binding {
    Uniform(GpuBuffer),
    Storage { buffer: GpuBuffer, read_only: bool },
}

impl Binding {
    fn buffer(&self) -> &GpuBuffer {
        match self {
            Binding::Uniform(buffer) => buffer,
            Binding::Storage { buffer, .. } => buffer,
        }
    }
}

/// Per-scope binding state while a stream executes.
#[derive(Default)]
struct ExecState {
    compute_pipeline: Option<String>,
    render_pipeline: Option<String>,
    target: Option<usize>,
    vertex_buffers: BTreeMap<u32, GpuBuffer>,
    index_buffer: Option<(GpuBuffer, wgpu::IndexFormat)>,
    bindings: BTreeMap<u32, Binding>,
}

/// Mock implementation of RenderContext for testing.
///
/// # Borrow Checking Pattern: Interior Mutability
///
/// Methods take `&self` but need to mutate internal state (record calls, hold
/// buffer contents). All state sits behind `parking_lot::Mutex`, which is
/// `Send + Sync` as the `RenderContext` trait requires. When more than one lock
/// is held, `buffers` is always taken before `queue`.
///
/// # Example
///
/// ```rust
/// use spritebatch_test_utils::{
///     BufferDesc, BufferUsage, CommandStream, MockRenderContext, RenderContext,
/// };
///
/// let mock = MockRenderContext::new().with_frame_latency(1);
/// let staging = mock.create_staging_region("staging", 16);
/// let vertices = mock.create_buffer(&BufferDesc {
///     label: Some("vertices"),
///     size: 16,
///     usage: BufferUsage::VERTEX,
/// });
///
/// let mut stream = mock.acquire_command_stream("upload");
/// stream.begin_copy_scope().unwrap();
/// stream.copy_buffer_to_buffer(&staging, 0, &vertices, 0, 16).unwrap();
/// stream.end_copy_scope().unwrap();
/// mock.submit(stream).unwrap();
///
/// // The copy still reads the staging region, so this write races with it.
/// mock.write_buffer(&staging, 0, &[0u8; 16]);
/// assert_eq!(mock.hazards().len(), 1);
/// ```
pub struct MockRenderContext {
    /// Recorded calls for verification
    calls: Mutex<Vec<RenderCall>>,

    buffers: Mutex<Vec<MockBuffer>>,
    textures: Mutex<Vec<MockTexture>>,

    /// Counters for generating IDs
    next_sampler_id: Mutex<usize>,
    next_pipeline_id: Mutex<usize>,

    kernels: Mutex<BTreeMap<String, MockKernel>>,
    queue: Mutex<MockQueue>,

    submitted: Mutex<Vec<RecordedCommand>>,
    draws: Mutex<Vec<DrawRecord>>,
    dispatches: Mutex<Vec<DispatchRecord>>,
    hazards: Mutex<Vec<Hazard>>,

    supports_compute: bool,
    /// Copy buffer contents into every [`DrawRecord`].
    snapshot_draws: bool,
}

impl MockRenderContext {
    /// Create a new mock render context.
    ///
    /// Submissions complete immediately until a frame latency is set.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            buffers: Mutex::new(Vec::new()),
            textures: Mutex::new(Vec::new()),
            next_sampler_id: Mutex::new(0),
            next_pipeline_id: Mutex::new(0),
            kernels: Mutex::new(BTreeMap::new()),
            queue: Mutex::new(MockQueue::default()),
            submitted: Mutex::new(Vec::new()),
            draws: Mutex::new(Vec::new()),
            dispatches: Mutex::new(Vec::new()),
            hazards: Mutex::new(Vec::new()),
            supports_compute: true,
            snapshot_draws: true,
        }
    }

    /// Keep the last `latency` submissions in flight.
    pub fn with_frame_latency(self, latency: usize) -> Self {
        self.set_frame_latency(latency);
        self
    }

    /// Report no compute support, like a downlevel device.
    pub fn without_compute(mut self) -> Self {
        self.supports_compute = false;
        self
    }

    /// Record draws without copying the buffers they read.
    ///
    /// Draws still mark their buffers as in use for hazard tracking, but
    /// [`DrawRecord`]s carry empty contents.
    pub fn without_draw_snapshots(mut self) -> Self {
        self.snapshot_draws = false;
        self
    }

    pub fn set_frame_latency(&self, latency: usize) {
        let mut queue = self.queue.lock();
        queue.frame_latency = latency;
        queue.retire_to_latency();
    }

    /// Register the CPU implementation run for dispatches of the pipeline `label`.
    pub fn register_kernel<F>(&self, label: impl Into<String>, kernel: F)
    where
        F: Fn(&mut KernelInvocation<'_>) + Send + Sync + 'static,
    {
        self.kernels.lock().insert(label.into(), Arc::new(kernel));
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    /// Count calls of a specific type.
    pub fn count_buffer_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateBuffer { .. }))
    }

    /// Count buffer write operations.
    pub fn count_buffer_writes(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::WriteBuffer { .. }))
    }

    pub fn count_texture_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateTexture { .. }))
    }

    pub fn count_render_pipeline_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateRenderPipeline { .. }))
    }

    pub fn count_compute_pipeline_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateComputePipeline { .. }))
    }

    pub fn count_submissions(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::Submit { .. }))
    }

    fn count(&self, predicate: impl Fn(&RenderCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Current contents of a mock buffer.
    pub fn buffer_contents(&self, buffer: &GpuBuffer) -> Vec<u8> {
        buffer
            .mock_id()
            .and_then(|id| self.buffers.lock().get(id).map(|b| b.data.clone()))
            .unwrap_or_default()
    }

    /// Current contents of a mock texture.
    pub fn texture_contents(&self, texture: &GpuTexture) -> Vec<u8> {
        texture
            .mock_id()
            .and_then(|id| self.textures.lock().get(id).map(|t| t.data.clone()))
            .unwrap_or_default()
    }

    pub fn buffer_label(&self, buffer_id: usize) -> Option<String> {
        self.buffers
            .lock()
            .get(buffer_id)
            .and_then(|b| b.label.clone())
    }

    /// Every command of every submitted stream, in submission order.
    pub fn submitted_commands(&self) -> Vec<RecordedCommand> {
        self.submitted.lock().clone()
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.draws.lock().clone()
    }

    /// Forget submitted commands, draws and dispatches. Buffer contents, hazards
    /// and in-flight submissions are kept.
    pub fn clear_submissions(&self) {
        self.submitted.lock().clear();
        self.draws.lock().clear();
        self.dispatches.lock().clear();
    }

    /// Take the draws recorded so far, leaving none behind.
    pub fn take_draws(&self) -> Vec<DrawRecord> {
        std::mem::take(&mut *self.draws.lock())
    }

    pub fn dispatches(&self) -> Vec<DispatchRecord> {
        self.dispatches.lock().clone()
    }

    pub fn hazards(&self) -> Vec<Hazard> {
        self.hazards.lock().clone()
    }

    /// Index of the latest submission known to have completed.
    pub fn completed_submission(&self) -> Option<u64> {
        self.queue.lock().completed
    }

    pub fn in_flight_submissions(&self) -> usize {
        self.queue.lock().in_flight.len()
    }

    fn execute(&self, index: u64, commands: &[RecordedCommand]) -> AHashSet<usize> {
        let mut touched = AHashSet::new();
        let mut state = ExecState::default();

        for command in commands {
            match command {
                RecordedCommand::CopyBufferToBuffer {
                    src,
                    src_offset,
                    dst,
                    dst_offset,
                    size,
                } => {
                    let (Some(src_id), Some(dst_id)) = (src.mock_id(), dst.mock_id()) else {
                        continue;
                    };
                    touched.insert(src_id);
                    touched.insert(dst_id);
                    let mut buffers = self.buffers.lock();
                    let src_range = *src_offset as usize..(*src_offset + *size) as usize;
                    let bytes = buffers[src_id].data[src_range].to_vec();
                    let dst_start = *dst_offset as usize;
                    buffers[dst_id].data[dst_start..dst_start + bytes.len()]
                        .copy_from_slice(&bytes);
                }
                RecordedCommand::BeginComputeScope { .. } | RecordedCommand::BeginCopyScope => {
                    state = ExecState::default();
                }
                RecordedCommand::BeginRenderScope { target, .. } => {
                    state = ExecState {
                        target: target.mock_id(),
                        ..ExecState::default()
                    };
                }
                RecordedCommand::BindComputePipeline(pipeline) => {
                    state.compute_pipeline = Some(pipeline.label().to_string());
                }
                RecordedCommand::BindRenderPipeline(pipeline) => {
                    state.render_pipeline = Some(pipeline.label().to_string());
                }
                RecordedCommand::BindVertexBuffer { slot, buffer } => {
                    state.vertex_buffers.insert(*slot, buffer.clone());
                }
                RecordedCommand::BindIndexBuffer { buffer, format } => {
                    state.index_buffer = Some((buffer.clone(), *format));
                }
                RecordedCommand::BindUniformBuffer { binding, buffer } => {
                    state
                        .bindings
                        .insert(*binding, Binding::Uniform(buffer.clone()));
                }
                RecordedCommand::BindStorageBuffer {
                    binding,
                    buffer,
                    read_only,
                } => {
                    state.bindings.insert(
                        *binding,
                        Binding::Storage {
                            buffer: buffer.clone(),
                            read_only: *read_only,
                        },
                    );
                }
                RecordedCommand::Dispatch { workgroups } => {
                    self.run_dispatch(index, &state, *workgroups, &mut touched);
                }
                RecordedCommand::Draw {
                    vertices,
                    instances,
                } => {
                    self.record_draw(
                        index,
                        &state,
                        vertices.clone(),
                        0,
                        instances.clone(),
                        false,
                        &mut touched,
                    );
                }
                RecordedCommand::DrawIndexed {
                    indices,
                    base_vertex,
                    instances,
                } => {
                    self.record_draw(
                        index,
                        &state,
                        indices.clone(),
                        *base_vertex,
                        instances.clone(),
                        true,
                        &mut touched,
                    );
                }
                RecordedCommand::EndCopyScope
                | RecordedCommand::EndComputeScope
                | RecordedCommand::EndRenderScope
                | RecordedCommand::BindTexture { .. }
                | RecordedCommand::BindSampler { .. }
                | RecordedCommand::BufferBarrier { .. } => {}
            }
        }

        touched
    }

    fn snapshot_bindings(
        &self,
        state: &ExecState,
        touched: &mut AHashSet<usize>,
    ) -> BTreeMap<u32, Vec<u8>> {
        let buffers = self.buffers.lock();
        state
            .bindings
            .iter()
            .filter_map(|(binding, bound)| {
                let id = bound.buffer().mock_id()?;
                touched.insert(id);
                Some((*binding, buffers[id].data.clone()))
            })
            .collect()
    }

    fn run_dispatch(
        &self,
        index: u64,
        state: &ExecState,
        workgroups: [u32; 3],
        touched: &mut AHashSet<usize>,
    ) {
        let pipeline = state.compute_pipeline.clone().unwrap_or_default();
        let kernel = self.kernels.lock().get(&pipeline).cloned();
        let mut bindings = self.snapshot_bindings(state, touched);

        let executed = match kernel {
            Some(kernel) => {
                kernel(&mut KernelInvocation {
                    workgroups,
                    bindings: &mut bindings,
                });
                let mut buffers = self.buffers.lock();
                for (binding, bound) in &state.bindings {
                    let Binding::Storage {
                        buffer,
                        read_only: false,
                    } = bound
                    else {
                        continue;
                    };
                    if let (Some(id), Some(bytes)) = (buffer.mock_id(), bindings.remove(binding)) {
                        buffers[id].data = bytes;
                    }
                }
                true
            }
            None => {
                tracing::warn!("No mock kernel registered for compute pipeline '{}'", pipeline);
                false
            }
        };

        self.dispatches.lock().push(DispatchRecord {
            submission: index,
            pipeline,
            workgroups,
            executed,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn record_draw(
        &self,
        index: u64,
        state: &ExecState,
        elements: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
        indexed: bool,
        touched: &mut AHashSet<usize>,
    ) {
        if !self.snapshot_draws {
            touched.extend(state.bindings.values().filter_map(|b| b.buffer().mock_id()));
            touched.extend(state.vertex_buffers.values().filter_map(GpuBuffer::mock_id));
            touched.extend(state.index_buffer.iter().filter_map(|(b, _)| b.mock_id()));
            self.draws.lock().push(DrawRecord {
                submission: index,
                pipeline: state.render_pipeline.clone().unwrap_or_default(),
                elements,
                base_vertex,
                instances,
                indexed,
                vertex_buffers: BTreeMap::new(),
                index_buffer: None,
                bindings: BTreeMap::new(),
                target: state.target,
            });
            return;
        }

        let bindings = self.snapshot_bindings(state, touched);
        let buffers = self.buffers.lock();

        let vertex_buffers = state
            .vertex_buffers
            .iter()
            .filter_map(|(slot, buffer)| {
                let id = buffer.mock_id()?;
                touched.insert(id);
                Some((*slot, buffers[id].data.clone()))
            })
            .collect();
        let index_buffer = state.index_buffer.as_ref().and_then(|(buffer, format)| {
            let id = buffer.mock_id()?;
            touched.insert(id);
            Some((buffers[id].data.clone(), *format))
        });

        self.draws.lock().push(DrawRecord {
            submission: index,
            pipeline: state.render_pipeline.clone().unwrap_or_default(),
            elements,
            base_vertex,
            instances,
            indexed,
            vertex_buffers,
            index_buffer,
            bindings,
            target: state.target,
        });
    }

    fn next_pipeline_id(&self) -> usize {
        let mut next = self.next_pipeline_id.lock();
        let id = *next;
        *next += 1;
        id
    }
}

impl Default for MockRenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext for MockRenderContext {
    fn create_buffer(&self, desc: &BufferDesc<'_>) -> GpuBuffer {
        let mut buffers = self.buffers.lock();
        let id = buffers.len();

        buffers.push(MockBuffer {
            label: desc.label.map(str::to_string),
            data: vec![0; desc.size as usize],
        });

        self.calls.lock().push(RenderCall::CreateBuffer {
            label: desc.label.map(str::to_string),
            size: desc.size,
            usage: desc.usage,
        });

        GpuBuffer::mock(id, desc.size, desc.usage)
    }

    /// # Panics
    /// Panics if the write exceeds the buffer, as `wgpu` validation does.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        let Some(buffer_id) = buffer.mock_id() else {
            return;
        };

        let mut buffers = self.buffers.lock();
        let target = &mut buffers[buffer_id];
        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= target.data.len(),
            "write of {}..{} exceeds mock buffer {:?} of {} bytes",
            start,
            end,
            target.label,
            target.data.len()
        );
        target.data[start..end].copy_from_slice(data);

        let queue = self.queue.lock();
        let mut hazards = self.hazards.lock();
        for submission in queue
            .in_flight
            .iter()
            .filter(|submission| submission.buffers.contains(&buffer_id))
        {
            hazards.push(Hazard {
                buffer_id,
                label: target.label.clone(),
                in_flight_submission: submission.index,
                offset,
                size: data.len(),
            });
        }

        self.calls.lock().push(RenderCall::WriteBuffer {
            buffer_id,
            offset,
            size: data.len(),
        });
    }

    fn create_texture(&self, desc: &TextureDesc<'_>) -> GpuTexture {
        let mut textures = self.textures.lock();
        let id = textures.len();

        textures.push(MockTexture { data: Vec::new() });

        self.calls.lock().push(RenderCall::CreateTexture {
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });

        GpuTexture::mock(id, desc.width, desc.height, desc.format)
    }

    fn write_texture(&self, texture: &GpuTexture, data: &[u8]) {
        let Some(texture_id) = texture.mock_id() else {
            return;
        };
        if let Some(stored) = self.textures.lock().get_mut(texture_id) {
            stored.data = data.to_vec();
        }
        self.calls.lock().push(RenderCall::WriteTexture {
            texture_id,
            size: data.len(),
        });
    }

    fn create_sampler(&self, desc: &SamplerDesc<'_>) -> GpuSampler {
        let mut next = self.next_sampler_id.lock();
        let id = *next;
        *next += 1;

        self.calls.lock().push(RenderCall::CreateSampler {
            label: desc.label.map(str::to_string),
        });

        GpuSampler::mock(id)
    }

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc<'_>) -> GpuRenderPipeline {
        let id = self.next_pipeline_id();
        self.calls.lock().push(RenderCall::CreateRenderPipeline {
            label: desc.label.to_string(),
        });
        GpuRenderPipeline::mock(id, desc.label)
    }

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc<'_>) -> GpuComputePipeline {
        let id = self.next_pipeline_id();
        self.calls.lock().push(RenderCall::CreateComputePipeline {
            label: desc.label.to_string(),
        });
        GpuComputePipeline::mock(id, desc.label)
    }

    fn supports_compute(&self) -> bool {
        self.supports_compute
    }

    fn acquire_command_stream(&self, label: &str) -> Box<dyn CommandStream> {
        Box::new(MockCommandStream::new(label))
    }

    fn submit(&self, stream: Box<dyn CommandStream>) -> Result<u64, ScopeError> {
        let stream = stream
            .into_any()
            .downcast::<MockCommandStream>()
            .map_err(|_| ScopeError::ForeignStream)?;
        stream.scopes.finish()?;

        let index = {
            let mut queue = self.queue.lock();
            let index = queue.next_submission;
            queue.next_submission += 1;
            index
        };

        let touched = self.execute(index, &stream.commands);
        tracing::trace!(
            "Mock submission {} ('{}'): {} commands, {} buffers",
            index,
            stream.label,
            stream.commands.len(),
            touched.len()
        );

        {
            let mut queue = self.queue.lock();
            queue.in_flight.push_back(InFlight {
                index,
                buffers: touched,
            });
            queue.retire_to_latency();
        }

        self.calls.lock().push(RenderCall::Submit {
            index,
            commands: stream.commands.len(),
        });
        self.submitted.lock().extend(stream.commands);

        Ok(index)
    }

    fn wait_idle(&self) {
        let mut queue = self.queue.lock();
        if let Some(last) = queue.in_flight.back() {
            queue.completed = Some(last.index);
        }
        queue.in_flight.clear();
        drop(queue);
        self.calls.lock().push(RenderCall::WaitIdle);
    }
}
