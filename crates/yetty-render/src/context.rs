//! GPU context management.
//!
//! [`GraphicsContext`] owns the WGPU instance, adapter, device and queue. It
//! is shared as `Arc<GraphicsContext>` across the renderer, the font system
//! and every widget plugin; widgets borrow it for the duration of a frame
//! and never keep an owning copy of the device or queue.
//!
//! # Lifecycle
//!
//! 1. Create with [`GraphicsContext::new_sync()`] (blocking) or
//!    [`GraphicsContext::new()`] (async).
//! 2. Create a [`crate::WindowSurface`] from it for each window.
//! 3. Drop after all surfaces and renderers are released.
//!
//! # Example
//!
//! ```rust,no_run
//! use yetty_render::GraphicsContext;
//!
//! let context = GraphicsContext::new_sync()
//!     .expect("Failed to create GPU context");
//!
//! // Clone for sharing (cheap Arc clone)
//! let context_clone = context.clone();
//!
//! // Use for resource creation
//! let shader = context.create_shader_module("demo", "fn noop() {}");
//! ```
//!
//! # Thread Safety
//!
//! `GraphicsContext` is `Send + Sync` and can be shared across threads via
//! `Arc`, but yetty itself keeps all per-frame work on one render thread;
//! the `Arc` exists for cheap sharing between subsystems, not for
//! parallelism.

use std::sync::Arc;

/// Errors that can occur in the render layer.
#[derive(Debug, Clone)]
pub enum GraphicsError {
    /// No suitable GPU adapter was found.
    NoAdapter,

    /// Failed to create a device.
    DeviceCreationFailed(String),

    /// Failed to create a surface from the window handle.
    SurfaceCreationFailed(String),

    /// The surface reported no supported configuration.
    SurfaceConfigurationFailed(String),

    /// Surface is lost and needs to be recreated.
    SurfaceLost,

    /// Surface texture is outdated (e.g. the window was resized).
    SurfaceOutdated,

    /// Not enough memory to acquire the surface texture.
    SurfaceOutOfMemory,

    /// Surface acquisition timed out.
    SurfaceTimeout,

    /// Surface acquisition failed for an unspecified reason.
    SurfaceOther,

    /// Shader source could not be read from disk.
    ShaderLoadFailed(String),

    /// A required GPU resource has not been created yet.
    ResourceUnavailable(String),
}

impl std::fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphicsError::NoAdapter => write!(f, "Failed to find a suitable GPU adapter"),
            GraphicsError::DeviceCreationFailed(msg) => {
                write!(f, "Failed to create device: {}", msg)
            }
            GraphicsError::SurfaceCreationFailed(msg) => {
                write!(f, "Failed to create surface: {}", msg)
            }
            GraphicsError::SurfaceConfigurationFailed(msg) => {
                write!(f, "Failed to configure surface: {}", msg)
            }
            GraphicsError::SurfaceLost => write!(f, "Surface lost"),
            GraphicsError::SurfaceOutdated => write!(f, "Surface outdated"),
            GraphicsError::SurfaceOutOfMemory => write!(f, "Out of memory acquiring surface"),
            GraphicsError::SurfaceTimeout => write!(f, "Timed out acquiring surface"),
            GraphicsError::SurfaceOther => write!(f, "Surface acquisition failed"),
            GraphicsError::ShaderLoadFailed(msg) => write!(f, "Failed to load shader: {}", msg),
            GraphicsError::ResourceUnavailable(what) => {
                write!(f, "GPU resource not ready: {}", what)
            }
        }
    }
}

impl std::error::Error for GraphicsError {}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, GraphicsError>;

/// The core GPU abstraction: instance, adapter, device and queue.
///
/// # Ownership Pattern
///
/// The context is the single owner of the device and queue. Renderers and
/// widgets receive `&GraphicsContext` (or clone the `Arc`) and create their
/// own pipelines and buffers through it; none of them ever own GPU
/// singletons themselves.
///
/// # Example
///
/// ```rust,no_run
/// use yetty_render::GraphicsContext;
///
/// let context = GraphicsContext::new_sync().expect("GPU context");
/// let device = context.device();
/// let queue = context.queue();
/// // device/queue borrows live only as long as the context
/// ```
pub struct GraphicsContext {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GraphicsContext {
    /// Create a new graphics context, blocking on adapter and device
    /// acquisition.
    pub fn new_sync() -> RenderResult<Arc<Self>> {
        pollster::block_on(Self::new())
    }

    /// Create a new graphics context.
    ///
    /// Requests a high-performance adapter and a device whose uncaptured
    /// errors are routed to `tracing::error!`. Both failures are fatal to
    /// the caller.
    pub async fn new() -> RenderResult<Arc<Self>> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GraphicsError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("yetty device"),
                ..Default::default()
            })
            .await
            .map_err(|e| GraphicsError::DeviceCreationFailed(e.to_string()))?;

        device.on_uncaptured_error(std::sync::Arc::new(|error| {
            tracing::error!("WebGPU error: {}", error);
        }));

        tracing::info!(adapter = %adapter.get_info().name, "Graphics context created");

        Ok(Arc::new(Self {
            instance,
            adapter,
            device,
            queue,
        }))
    }

    /// Get a reference to the wgpu device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get a reference to the wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Get a reference to the wgpu adapter.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Get a reference to the wgpu instance.
    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    /// Poll the device until queued async work completes.
    ///
    /// The core is single threaded: readbacks are resolved by spinning on
    /// the instance in 100 microsecond sleeps rather than awaiting. A stuck
    /// callback here is a fatal condition for the frame loop.
    pub fn poll_wait(&self) {
        loop {
            let status = self.device.poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            });
            match status {
                Ok(_) => break,
                Err(_) => {
                    std::thread::sleep(std::time::Duration::from_micros(100));
                }
            }
        }
    }

    /// Create a shader module from WGSL source.
    pub fn create_shader_module(&self, label: &str, source: &str) -> wgpu::ShaderModule {
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("adapter", &self.adapter.get_info().name)
            .finish()
    }
}
