//! Image widget: decode payload bytes, draw a textured quad.

use image::RgbaImage;
use yetty_render::{BlitRenderer, TextureUploader};
use yetty_widget::{FrameEnv, Plugin, Widget, WidgetError, WidgetFrame, WidgetResult};

/// Displays a raster image in the widget rect.
pub struct ImagePlugin;

impl ImagePlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImagePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ImagePlugin {
    fn name(&self) -> &str {
        "image"
    }

    fn create_widget(&mut self, _widget_type: &str, _args: &str) -> WidgetResult<Box<dyn Widget>> {
        Ok(Box::new(ImageWidget::default()))
    }
}

#[derive(Default)]
struct ImageWidget {
    decoded: Option<RgbaImage>,
    gpu: Option<ImageGpu>,
}

struct ImageGpu {
    blit: BlitRenderer,
    bind_group: wgpu::BindGroup,
}

impl Widget for ImageWidget {
    fn init(&mut self, payload: &[u8]) -> WidgetResult<()> {
        let decoded = image::load_from_memory(payload)
            .map_err(|e| WidgetError::InvalidPayload(format!("image decode: {}", e)))?
            .to_rgba8();
        tracing::debug!(
            width = decoded.width(),
            height = decoded.height(),
            "image payload decoded"
        );
        self.decoded = Some(decoded);
        // New payload invalidates the uploaded texture
        self.gpu = None;
        Ok(())
    }

    fn dispose(&mut self) {
        self.gpu = None;
        self.decoded = None;
    }

    fn prepare_frame(&mut self, env: &mut FrameEnv, frame: &WidgetFrame) {
        if !frame.on {
            self.gpu = None;
            return;
        }
        if self.gpu.is_some() {
            return;
        }
        let Some(decoded) = &self.decoded else {
            return;
        };
        let uploader = TextureUploader::new(
            env.ctx,
            decoded.width(),
            decoded.height(),
            wgpu::TextureFormat::Rgba8Unorm,
        );
        uploader.upload(env.ctx, decoded.as_raw());
        let blit = BlitRenderer::new(env.ctx.clone(), env.target_format);
        // The bind group keeps the texture alive; the uploader can go.
        let bind_group = blit.create_bind_group(uploader.view());
        self.gpu = Some(ImageGpu { blit, bind_group });
    }

    fn render(&mut self, env: &mut FrameEnv, frame: &WidgetFrame, target: &wgpu::TextureView) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        gpu.blit.composite(
            target,
            &gpu.bind_group,
            frame.rect,
            env.screen_width as f32,
            env.screen_height as f32,
        );
    }
}
