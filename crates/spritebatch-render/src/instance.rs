//! Sprite instance records and the per-frame instance store.

use bytemuck::{Pod, Zeroable};
use spritebatch_core::math::{Vec2, Vec3, Vec4};
use static_assertions::const_assert_eq;

use crate::atlas::SpriteUv;
use crate::config::CapacityPolicy;
use crate::error::BatchError;

/// One sprite to draw this frame.
///
/// The quad covers the unit square scaled by `size`, rotated by `rotation` radians
/// counter-clockwise about its local origin (corner 0) and then translated to
/// `position`. `position.z` is passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteInstance {
    pub position: Vec3,
    pub rotation: f32,
    pub size: Vec2,
    pub uv_origin: Vec2,
    pub uv_extent: Vec2,
    /// Linear RGBA multiplied with the sampled texel.
    pub color: Vec4,
}

impl Default for SpriteInstance {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: 0.0,
            size: Vec2::ONE,
            uv_origin: Vec2::ZERO,
            uv_extent: Vec2::ONE,
            color: Vec4::ONE,
        }
    }
}

impl SpriteInstance {
    /// Untextured white sprite sampling the full texture.
    pub fn new(position: Vec3, size: Vec2) -> Self {
        Self {
            position,
            size,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn with_uv(mut self, origin: Vec2, extent: Vec2) -> Self {
        self.uv_origin = origin;
        self.uv_extent = extent;
        self
    }

    /// Sample the given atlas region.
    pub fn with_region(self, uv: SpriteUv) -> Self {
        self.with_uv(uv.origin, uv.extent)
    }

    pub fn to_gpu(&self) -> GpuSpriteInstance {
        GpuSpriteInstance {
            position: self.position.to_array(),
            rotation: self.rotation,
            size: self.size.to_array(),
            uv_origin: self.uv_origin.to_array(),
            uv_extent: self.uv_extent.to_array(),
            _pad: [0.0; 2],
            color: self.color.to_array(),
        }
    }
}

/// GPU layout of [`SpriteInstance`], matching `struct SpriteInstance` in the WGSL
/// shaders (std430, 64 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSpriteInstance {
    pub position: [f32; 3],
    pub rotation: f32,
    pub size: [f32; 2],
    pub uv_origin: [f32; 2],
    pub uv_extent: [f32; 2],
    pub _pad: [f32; 2],
    pub color: [f32; 4],
}

const_assert_eq!(std::mem::size_of::<GpuSpriteInstance>(), 64);

impl GpuSpriteInstance {
    /// Size of the instance in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

impl From<&SpriteInstance> for GpuSpriteInstance {
    fn from(instance: &SpriteInstance) -> Self {
        instance.to_gpu()
    }
}

/// Bounded, ordered store of the sprites submitted this frame.
///
/// Index order is draw order. The store never holds more than `capacity` records;
/// what happens to the excess is decided by the [`CapacityPolicy`].
#[derive(Debug)]
pub struct InstanceStore {
    instances: Vec<SpriteInstance>,
    capacity: usize,
    policy: CapacityPolicy,
    truncated: usize,
    warned: bool,
}

impl InstanceStore {
    pub fn new(capacity: usize, policy: CapacityPolicy) -> Self {
        Self {
            instances: Vec::with_capacity(capacity),
            capacity,
            policy,
            truncated: 0,
            warned: false,
        }
    }

    /// Forget all records. Storage is kept for the next frame.
    pub fn reset(&mut self) {
        self.instances.clear();
        self.truncated = 0;
        self.warned = false;
    }

    /// Append a record, returning its index.
    ///
    /// Fails with [`BatchError::CapacityExceeded`] when the store is full regardless
    /// of the capacity policy.
    pub fn append(&mut self, instance: SpriteInstance) -> Result<usize, BatchError> {
        if self.instances.len() >= self.capacity {
            return Err(BatchError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.instances.push(instance);
        Ok(self.instances.len() - 1)
    }

    /// Append a record, applying the capacity policy when full.
    ///
    /// Returns `Ok(None)` when the record was dropped by [`CapacityPolicy::Truncate`].
    pub fn push(&mut self, instance: SpriteInstance) -> Result<Option<usize>, BatchError> {
        match self.append(instance) {
            Ok(index) => Ok(Some(index)),
            Err(err) => match self.policy {
                CapacityPolicy::FailFast => Err(err),
                CapacityPolicy::Truncate => {
                    self.truncated += 1;
                    if !self.warned {
                        self.warned = true;
                        tracing::warn!(
                            "Sprite capacity of {} exceeded, dropping sprites for the rest of the frame",
                            self.capacity
                        );
                    }
                    Ok(None)
                }
            },
        }
    }

    /// Push every record in order, returning how many were stored.
    pub fn extend<I>(&mut self, instances: I) -> Result<usize, BatchError>
    where
        I: IntoIterator<Item = SpriteInstance>,
    {
        let mut stored = 0;
        for instance in instances {
            if self.push(instance)?.is_some() {
                stored += 1;
            }
        }
        Ok(stored)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> CapacityPolicy {
        self.policy
    }

    /// Records dropped since the last reset.
    pub fn truncated(&self) -> usize {
        self.truncated
    }

    pub fn as_slice(&self) -> &[SpriteInstance] {
        &self.instances
    }
}
