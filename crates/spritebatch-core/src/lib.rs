//! Spritebatch Core
//!
//! Shared utilities for the spritebatch crates: logging setup, puffin profiling,
//! math helpers and process-level configuration.

pub mod config;
pub mod logging;
pub mod math;
pub mod profiling;
