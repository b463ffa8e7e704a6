//! Graphics interface and test utilities for spritebatch.
//!
//! The sprite batch never talks to a graphics API directly. It goes through the
//! object-safe [`RenderContext`] and [`CommandStream`] traits defined here, with
//! resources held in owned wrapper types that are either real `wgpu` objects or
//! mocks.
//!
//! - [`RenderContext`] - resource factory, host writes, submission
//! - [`CommandStream`] - scoped copy/compute/render recording
//! - `MockRenderContext` - recording and executing fake GPU (requires `mock` feature)
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use spritebatch_test_utils::{BufferDesc, BufferUsage, MockRenderContext, RenderContext};
//!
//! let mock = MockRenderContext::new();
//! let buffer = mock.create_buffer(&BufferDesc {
//!     label: Some("test_buffer"),
//!     size: 1024,
//!     usage: BufferUsage::VERTEX,
//! });
//!
//! mock.write_buffer(&buffer, 0, &[1, 2, 3, 4]);
//! assert_eq!(mock.count_buffer_creates(), 1);
//! assert_eq!(&mock.buffer_contents(&buffer)[..4], &[1, 2, 3, 4]);
//! # }
//! ```
//!
//! # Design
//!
//! Wrapper types carry no lifetimes; real resources are reference counted by
//! `wgpu` and mocks are plain ids. Mock state lives behind `parking_lot` mutexes so
//! every trait method can take `&self`.

pub mod descriptors;
pub mod gpu_types;
#[cfg(feature = "mock")]
pub mod mock_render;
pub mod render_context;

pub use descriptors::*;
pub use gpu_types::*;
#[cfg(feature = "mock")]
pub use mock_render::*;
pub use render_context::*;
