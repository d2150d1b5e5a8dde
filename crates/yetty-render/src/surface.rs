//! Window surface management and per-frame texture acquisition.
//!
//! [`WindowSurface`] wraps a `wgpu::Surface` and implements the frame
//! contract of the WebGPU context: exactly one target view is acquired per
//! frame and cached until [`WindowSurface::present()`] releases it. A second
//! [`WindowSurface::acquire()`] within the same frame returns the cached
//! view. `present()` on a frame whose acquire failed is a no-op.

use crate::context::{GraphicsContext, GraphicsError, RenderResult};
use std::sync::Arc;
use winit::window::Window;

/// A configured presentation surface for one window.
///
/// # Example
///
/// ```ignore
/// use yetty_render::{GraphicsContext, WindowSurface};
///
/// let context = GraphicsContext::new_sync()?;
/// let mut surface = WindowSurface::new(context.clone(), window, 800, 600)?;
///
/// // Per frame:
/// let target = surface.acquire()?;     // cached for the rest of the frame
/// // ... encode passes against `target` ...
/// surface.present();                   // releases the cached view
/// ```
pub struct WindowSurface {
    context: Arc<GraphicsContext>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    frame: Option<AcquiredFrame>,
}

struct AcquiredFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

impl WindowSurface {
    /// Create and configure a surface for the given window.
    ///
    /// The surface format is the adapter's first preferred format (falling
    /// back to BGRA8 unorm), the present mode is `Immediate` when the
    /// adapter offers it (no vsync), and the alpha mode is automatic.
    pub fn new(
        context: Arc<GraphicsContext>,
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let surface = context
            .instance()
            .create_surface(window)
            .map_err(|e| GraphicsError::SurfaceCreationFailed(e.to_string()))?;

        let caps = surface.get_capabilities(context.adapter());
        let format = caps
            .formats
            .first()
            .copied()
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);
        let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Immediate) {
            wgpu::PresentMode::Immediate
        } else {
            wgpu::PresentMode::Fifo
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(context.device(), &config);

        tracing::info!(?format, ?present_mode, width, height, "Surface configured");

        Ok(Self {
            context,
            surface,
            config,
            frame: None,
        })
    }

    /// Reconfigure the surface for a new size.
    ///
    /// Resizing to the current size is a no-op; zero dimensions are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if width == self.config.width && height == self.config.height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(self.context.device(), &self.config);
        // Any cached frame belongs to the old configuration
        self.frame = None;
    }

    /// The configured surface format.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// The configured surface size in pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Acquire the frame's target view.
    ///
    /// Cached until [`present()`](Self::present); repeated calls within a
    /// frame return the same view. Any status other than (sub)optimal
    /// success yields an error and the frame should be skipped.
    pub fn acquire(&mut self) -> RenderResult<&wgpu::TextureView> {
        if self.frame.is_none() {
            let texture = match self.surface.get_current_texture() {
                Ok(t) => t,
                Err(wgpu::SurfaceError::Lost) => return Err(GraphicsError::SurfaceLost),
                Err(wgpu::SurfaceError::Outdated) => return Err(GraphicsError::SurfaceOutdated),
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    return Err(GraphicsError::SurfaceOutOfMemory);
                }
                Err(wgpu::SurfaceError::Timeout) => return Err(GraphicsError::SurfaceTimeout),
                Err(wgpu::SurfaceError::Other) => return Err(GraphicsError::SurfaceOther),
            };
            let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("surface target"),
                format: Some(self.config.format),
                ..Default::default()
            });
            self.frame = Some(AcquiredFrame { texture, view });
        }
        Ok(&self.frame.as_ref().unwrap().view)
    }

    /// Whether a target view is currently acquired.
    pub fn has_frame(&self) -> bool {
        self.frame.is_some()
    }

    /// Present the acquired frame and release the cached view.
    ///
    /// No-op when no frame was acquired (a skipped frame).
    pub fn present(&mut self) {
        if let Some(frame) = self.frame.take() {
            drop(frame.view);
            frame.texture.present();
        }
    }

    /// Recreate the surface configuration after a device loss.
    pub fn reconfigure(&mut self) {
        self.frame = None;
        self.surface.configure(self.context.device(), &self.config);
    }
}
