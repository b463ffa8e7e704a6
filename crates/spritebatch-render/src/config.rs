//! Sprite batch configuration.

/// Default maximum number of sprites per frame.
pub const MAX_SPRITE_COUNT: usize = 8192;

/// Default number of staging regions cycled per ring.
pub const DEFAULT_RING_DEPTH: usize = 3;

/// Threads per workgroup of the expansion kernel. Must match `expand_sprites.wgsl`.
pub const EXPANSION_WORKGROUP_SIZE: u32 = 64;

/// What happens when more sprites are pushed than the batch holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapacityPolicy {
    /// Return [`BatchError::CapacityExceeded`](crate::BatchError::CapacityExceeded).
    FailFast,
    /// Drop the sprite, count it and warn once per frame.
    Truncate,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            CapacityPolicy::FailFast
        } else {
            CapacityPolicy::Truncate
        }
    }
}

/// How sprite instances become quad geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExpansionKind {
    /// Expand on the CPU into the vertex staging ring.
    Host,
    /// Expand with a compute kernel into a device vertex buffer.
    Compute,
    /// Derive vertices from instances in the vertex shader.
    Pull,
    /// Compute when the device supports it, host otherwise.
    #[default]
    Auto,
}

impl std::fmt::Display for ExpansionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpansionKind::Host => write!(f, "Host"),
            ExpansionKind::Compute => write!(f, "Compute"),
            ExpansionKind::Pull => write!(f, "Pull"),
            ExpansionKind::Auto => write!(f, "Auto"),
        }
    }
}

/// Configuration for a [`SpriteBatch`](crate::SpriteBatch).
///
/// # Example
///
/// ```
/// use spritebatch_render::{CapacityPolicy, ExpansionKind, SpriteBatchConfig};
///
/// let config = SpriteBatchConfig::default()
///     .with_max_sprites(1024)
///     .with_expansion(ExpansionKind::Pull)
///     .with_capacity_policy(CapacityPolicy::Truncate);
/// assert_eq!(config.max_sprites, 1024);
/// ```
#[derive(Debug, Clone)]
pub struct SpriteBatchConfig {
    /// Maximum live sprites per frame.
    pub max_sprites: usize,
    /// Staging regions per ring, at least 1.
    pub ring_depth: usize,
    pub capacity_policy: CapacityPolicy,
    pub expansion: ExpansionKind,
    /// Color format of the render target the batch draws into.
    pub color_format: wgpu::TextureFormat,
    /// Alpha blending of the sprite pipelines.
    pub blend: Option<wgpu::BlendState>,
    /// Prefix for GPU resource labels.
    pub label: String,
}

impl Default for SpriteBatchConfig {
    fn default() -> Self {
        Self {
            max_sprites: MAX_SPRITE_COUNT,
            ring_depth: DEFAULT_RING_DEPTH,
            capacity_policy: CapacityPolicy::default(),
            expansion: ExpansionKind::default(),
            color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            label: "sprite_batch".to_string(),
        }
    }
}

impl SpriteBatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_sprites(mut self, max_sprites: usize) -> Self {
        self.max_sprites = max_sprites;
        self
    }

    pub fn with_ring_depth(mut self, depth: usize) -> Self {
        self.ring_depth = depth;
        self
    }

    pub fn with_capacity_policy(mut self, policy: CapacityPolicy) -> Self {
        self.capacity_policy = policy;
        self
    }

    pub fn with_expansion(mut self, expansion: ExpansionKind) -> Self {
        self.expansion = expansion;
        self
    }

    pub fn with_color_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.color_format = format;
        self
    }

    pub fn with_blend(mut self, blend: Option<wgpu::BlendState>) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Resolve [`ExpansionKind::Auto`] against the device.
    pub fn resolve_expansion(&self, supports_compute: bool) -> ExpansionKind {
        match self.expansion {
            ExpansionKind::Auto if supports_compute => ExpansionKind::Compute,
            ExpansionKind::Auto => ExpansionKind::Host,
            kind => kind,
        }
    }
}
