//! Error types for the sprite batch and the wgpu backend.

use spritebatch_test_utils::ScopeError;
use thiserror::Error;

/// Errors reported by the sprite batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// The instance store already holds `capacity` sprites.
    #[error("sprite capacity of {capacity} exceeded")]
    CapacityExceeded { capacity: usize },

    /// A staging write would run past the end of its region.
    #[error("staging write of {requested} elements exceeds region capacity {capacity}")]
    OutOfBounds { requested: usize, capacity: usize },

    /// A staging slot was reused while the GPU may still be reading it.
    #[error(
        "staging slot {slot} reused at frame {current} but last written at frame {last_written}"
    )]
    SynchronizationViolation {
        slot: usize,
        last_written: u64,
        current: u64,
    },

    #[error(transparent)]
    Scope(#[from] ScopeError),

    /// The requested feature is not available on this device.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

/// Errors creating or reading back from the wgpu backend.
#[derive(Debug, Error)]
pub enum GraphicsError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("buffer mapping failed: {0}")]
    MapFailed(#[from] wgpu::BufferAsyncError),

    #[error("unsupported texture format for readback: {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),
}
