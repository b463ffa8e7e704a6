//! Headless wgpu graphics context.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use crate::error::GraphicsError;

/// A wgpu instance, adapter, device and queue shared by everything that renders.
///
/// Implements [`RenderContext`](spritebatch_test_utils::RenderContext), so a
/// [`SpriteBatch`](crate::SpriteBatch) can run on it directly.
///
/// ```rust,no_run
/// use spritebatch_render::GraphicsContext;
///
/// let ctx = GraphicsContext::new_owned_sync().expect("no GPU available");
/// let ctx2 = ctx.clone(); // Cheap clone (Arc)
/// ```
pub struct GraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Index handed out by the next `submit`.
    pub(crate) next_submission: AtomicU64,
}

impl GraphicsContext {
    pub async fn new_owned() -> Result<Arc<Self>, GraphicsError> {
        Self::new_owned_with_descriptor(GraphicsContextDescriptor::default()).await
    }

    /// Creates a new graphics context, blocking the current thread until it is ready.
    pub fn new_owned_sync() -> Result<Arc<Self>, GraphicsError> {
        pollster::block_on(Self::new_owned())
    }

    pub fn new_owned_sync_with_descriptor(
        descriptor: GraphicsContextDescriptor,
    ) -> Result<Arc<Self>, GraphicsError> {
        pollster::block_on(Self::new_owned_with_descriptor(descriptor))
    }

    pub async fn new_owned_with_descriptor(
        descriptor: GraphicsContextDescriptor,
    ) -> Result<Arc<Self>, GraphicsError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: descriptor.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: descriptor.power_preference,
                compatible_surface: None,
                force_fallback_adapter: descriptor.force_fallback_adapter,
            })
            .await
            .map_err(|_| GraphicsError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: descriptor.features,
                required_limits: descriptor.limits.clone(),
                label: descriptor.label,
                ..Default::default()
            })
            .await?;

        let info = adapter.get_info();
        tracing::info!(
            "Created graphics context on {} ({:?}), compute: {}",
            info.name,
            info.backend,
            Self::adapter_supports_compute(&adapter)
        );

        Ok(Arc::new(Self {
            instance,
            adapter,
            device,
            queue,
            next_submission: AtomicU64::new(0),
        }))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Get device info
    pub fn info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Get device limits
    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Whether the adapter can run compute shaders and bind storage buffers in the
    /// vertex stage.
    pub(crate) fn adapter_supports_compute(adapter: &wgpu::Adapter) -> bool {
        let flags = adapter.get_downlevel_capabilities().flags;
        flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
            && flags.contains(wgpu::DownlevelFlags::VERTEX_STORAGE)
    }
}

/// Descriptor for configuring graphics context creation.
pub struct GraphicsContextDescriptor {
    /// GPU backends to use
    pub backends: wgpu::Backends,
    /// Power preference for adapter selection
    pub power_preference: wgpu::PowerPreference,
    /// Whether to force fallback adapter
    pub force_fallback_adapter: bool,
    /// Raw wgpu features to require
    pub features: wgpu::Features,
    /// Required device limits
    pub limits: wgpu::Limits,
    /// Optional label for debugging
    pub label: Option<&'static str>,
}

impl Default for GraphicsContextDescriptor {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            features: wgpu::Features::empty(),
            limits: wgpu::Limits::downlevel_defaults(),
            label: None,
        }
    }
}

impl GraphicsContextDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    pub fn backends(mut self, backends: wgpu::Backends) -> Self {
        self.backends = backends;
        self
    }

    /// Use a software adapter when one is available.
    pub fn force_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }

    pub fn with_wgpu_features(mut self, features: wgpu::Features) -> Self {
        self.features = features;
        self
    }

    pub fn limits(mut self, limits: wgpu::Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}
