//! Traits abstracting GPU resource creation and command recording.
//!
//! [`RenderContext`] creates resources, performs host writes and submits work.
//! [`CommandStream`] records GPU work, which must always sit inside exactly one
//! scope (copy, compute or render). Both are object safe so the sprite batch can
//! be driven by the real `wgpu` backend or by the mock.

use std::any::Any;
use std::fmt;
use std::ops::Range;

use thiserror::Error;

use crate::descriptors::*;
use crate::gpu_types::*;

/// Kind of command scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Copy,
    Compute,
    Render,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Copy => write!(f, "copy"),
            Scope::Compute => write!(f, "compute"),
            Scope::Render => write!(f, "render"),
        }
    }
}

/// Misuse of a command stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("cannot begin a {requested} scope while a {active} scope is open")]
    AlreadyOpen { active: Scope, requested: Scope },

    #[error("cannot end a {requested} scope (open scope: {active:?})")]
    NotOpen {
        requested: Scope,
        active: Option<Scope>,
    },

    #[error("{operation} cannot be recorded with open scope {active:?}")]
    WrongScope {
        operation: &'static str,
        active: Option<Scope>,
    },

    #[error("{operation} requires a bound pipeline")]
    NoPipeline { operation: &'static str },

    #[error("command stream finished with an open {0} scope")]
    Unterminated(Scope),

    #[error("command stream was not acquired from this context")]
    ForeignStream,

    #[error("copy {role} range {offset}..{end} exceeds buffer size {capacity}", end = .offset + .size)]
    CopyOutOfBounds {
        role: &'static str,
        offset: u64,
        size: u64,
        capacity: u64,
    },
}

/// Scope state machine shared by command stream implementations.
///
/// At most one scope is open at a time; every recorded operation declares which
/// scopes it may appear in.
#[derive(Debug, Default, Clone)]
pub struct ScopeTracker {
    active: Option<Scope>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<Scope> {
        self.active
    }

    pub fn begin(&mut self, scope: Scope) -> Result<(), ScopeError> {
        if let Some(active) = self.active {
            return Err(ScopeError::AlreadyOpen {
                active,
                requested: scope,
            });
        }
        self.active = Some(scope);
        Ok(())
    }

    pub fn end(&mut self, scope: Scope) -> Result<(), ScopeError> {
        if self.active != Some(scope) {
            return Err(ScopeError::NotOpen {
                requested: scope,
                active: self.active,
            });
        }
        self.active = None;
        Ok(())
    }

    /// Require that one of `allowed` is the open scope.
    pub fn require(&self, operation: &'static str, allowed: &[Scope]) -> Result<Scope, ScopeError> {
        match self.active {
            Some(active) if allowed.contains(&active) => Ok(active),
            active => Err(ScopeError::WrongScope { operation, active }),
        }
    }

    /// Require that no scope is open.
    pub fn require_none(&self, operation: &'static str) -> Result<(), ScopeError> {
        match self.active {
            None => Ok(()),
            active => Err(ScopeError::WrongScope { operation, active }),
        }
    }

    /// Check that the stream is complete before submission.
    pub fn finish(&self) -> Result<(), ScopeError> {
        match self.active {
            Some(scope) => Err(ScopeError::Unterminated(scope)),
            None => Ok(()),
        }
    }
}

/// Validate one side of a buffer-to-buffer copy.
pub fn check_copy_range(
    role: &'static str,
    buffer: &GpuBuffer,
    offset: u64,
    size: u64,
) -> Result<(), ScopeError> {
    match offset.checked_add(size) {
        Some(end) if end <= buffer.size() => Ok(()),
        _ => Err(ScopeError::CopyOutOfBounds {
            role,
            offset,
            size,
            capacity: buffer.size(),
        }),
    }
}

/// Records GPU work for a single submission.
///
/// Every method returns [`ScopeError`] when used outside the scope it belongs to.
/// Bindings made inside a scope are forgotten when the scope ends.
pub trait CommandStream: Send {
    fn begin_copy_scope(&mut self) -> Result<(), ScopeError>;
    fn end_copy_scope(&mut self) -> Result<(), ScopeError>;

    /// Copy `size` bytes between buffers. Copy scope only.
    fn copy_buffer_to_buffer(
        &mut self,
        src: &GpuBuffer,
        src_offset: u64,
        dst: &GpuBuffer,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), ScopeError>;

    fn begin_compute_scope(&mut self, label: &str) -> Result<(), ScopeError>;
    fn end_compute_scope(&mut self) -> Result<(), ScopeError>;
    fn bind_compute_pipeline(&mut self, pipeline: &GpuComputePipeline) -> Result<(), ScopeError>;
    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<(), ScopeError>;

    fn begin_render_scope(&mut self, target: &RenderTargetDesc<'_>) -> Result<(), ScopeError>;
    fn end_render_scope(&mut self) -> Result<(), ScopeError>;
    fn bind_render_pipeline(&mut self, pipeline: &GpuRenderPipeline) -> Result<(), ScopeError>;
    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &GpuBuffer) -> Result<(), ScopeError>;
    fn bind_index_buffer(
        &mut self,
        buffer: &GpuBuffer,
        format: wgpu::IndexFormat,
    ) -> Result<(), ScopeError>;

    /// Bind a uniform buffer at `binding` of group 0. Compute or render scope.
    fn bind_uniform_buffer(&mut self, binding: u32, buffer: &GpuBuffer) -> Result<(), ScopeError>;

    /// Bind a storage buffer at `binding` of group 0. Compute or render scope.
    fn bind_storage_buffer(
        &mut self,
        binding: u32,
        buffer: &GpuBuffer,
        read_only: bool,
    ) -> Result<(), ScopeError>;

    fn bind_texture(&mut self, binding: u32, texture: &GpuTexture) -> Result<(), ScopeError>;
    fn bind_sampler(&mut self, binding: u32, sampler: &GpuSampler) -> Result<(), ScopeError>;

    /// Declare a dependency between two accesses of `buffer`.
    ///
    /// Recorded between scopes. Backends that track hazards themselves may treat it
    /// as a marker only.
    fn buffer_barrier(
        &mut self,
        buffer: &GpuBuffer,
        from: BufferAccess,
        to: BufferAccess,
    ) -> Result<(), ScopeError>;

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) -> Result<(), ScopeError>;
    fn draw_indexed(
        &mut self,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    ) -> Result<(), ScopeError>;

    /// Recover the concrete stream inside the context that created it.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Trait abstracting GPU resource creation and submission.
///
/// # Borrow Checking Pattern
///
/// Methods take `&self` and return owned wrapper types, so a context can be shared
/// behind an `Arc` and mock implementations can use interior mutability.
///
/// # Example
///
/// ```rust,no_run
/// use spritebatch_test_utils::{BufferDesc, BufferUsage, CommandStream, RenderContext};
///
/// fn upload(ctx: &dyn RenderContext) {
///     let staging = ctx.create_staging_region("upload", 16);
///     let vertices = ctx.create_buffer(&BufferDesc {
///         label: Some("vertices"),
///         size: 16,
///         usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
///     });
///     ctx.write_buffer(&staging, 0, &[0u8; 16]);
///
///     let mut stream = ctx.acquire_command_stream("upload");
///     stream.begin_copy_scope().unwrap();
///     stream.copy_buffer_to_buffer(&staging, 0, &vertices, 0, 16).unwrap();
///     stream.end_copy_scope().unwrap();
///     ctx.submit(stream).unwrap();
/// }
/// ```
pub trait RenderContext: Send + Sync {
    /// Create a GPU buffer.
    fn create_buffer(&self, desc: &BufferDesc<'_>) -> GpuBuffer;

    /// Create a host-writable region used as a copy source.
    fn create_staging_region(&self, label: &str, size: u64) -> GpuBuffer {
        self.create_buffer(&BufferDesc {
            label: Some(label),
            size,
            usage: BufferUsage::STAGING | BufferUsage::COPY_SRC,
        })
    }

    /// Write host data into a buffer.
    ///
    /// The write becomes visible to every submission made after this call.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]);

    fn create_texture(&self, desc: &TextureDesc<'_>) -> GpuTexture;

    /// Replace the full contents of a texture with tightly packed texel rows.
    fn write_texture(&self, texture: &GpuTexture, data: &[u8]);

    fn create_sampler(&self, desc: &SamplerDesc<'_>) -> GpuSampler;

    fn create_render_pipeline(&self, desc: &RenderPipelineDesc<'_>) -> GpuRenderPipeline;

    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc<'_>) -> GpuComputePipeline;

    /// Whether compute pipelines and storage buffers can be used.
    fn supports_compute(&self) -> bool;

    fn acquire_command_stream(&self, label: &str) -> Box<dyn CommandStream>;

    /// Submit a finished stream, returning its submission index.
    fn submit(&self, stream: Box<dyn CommandStream>) -> Result<u64, ScopeError>;

    /// Block until all submitted work has completed.
    fn wait_idle(&self);
}
