//! Vector graphics widget: SVG payloads rasterized into a private texture
//! and composited over the widget rect.
//!
//! Rasterization happens on the CPU at the widget's pixel size and is
//! repeated when that size changes, so vector content stays sharp across
//! resizes.

use yetty_render::{BlitRenderer, TextureUploader};
use yetty_widget::{FrameEnv, Plugin, Widget, WidgetError, WidgetFrame, WidgetResult};

/// Renders SVG documents.
pub struct VectorPlugin;

impl VectorPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VectorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for VectorPlugin {
    fn name(&self) -> &str {
        "vector"
    }

    fn create_widget(&mut self, _widget_type: &str, _args: &str) -> WidgetResult<Box<dyn Widget>> {
        Ok(Box::new(VectorWidget::default()))
    }
}

#[derive(Default)]
struct VectorWidget {
    tree: Option<usvg::Tree>,
    rendered_size: (u32, u32),
    gpu: Option<VectorGpu>,
}

struct VectorGpu {
    blit: BlitRenderer,
    bind_group: wgpu::BindGroup,
}

impl VectorWidget {
    /// Rasterize the SVG at the given pixel size into straight-alpha RGBA8.
    fn rasterize(&self, width: u32, height: u32) -> Option<Vec<u8>> {
        let tree = self.tree.as_ref()?;
        let mut pixmap = tiny_skia::Pixmap::new(width, height)?;
        let size = tree.size();
        let transform = tiny_skia::Transform::from_scale(
            width as f32 / size.width(),
            height as f32 / size.height(),
        );
        resvg::render(tree, transform, &mut pixmap.as_mut());

        // Pixmap data is premultiplied; the blit pipeline blends straight
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for px in pixmap.pixels() {
            let c = px.demultiply();
            rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Some(rgba)
    }
}

impl Widget for VectorWidget {
    fn init(&mut self, payload: &[u8]) -> WidgetResult<()> {
        let tree = usvg::Tree::from_data(payload, &usvg::Options::default())
            .map_err(|e| WidgetError::InvalidPayload(format!("svg parse: {}", e)))?;
        self.tree = Some(tree);
        self.gpu = None;
        self.rendered_size = (0, 0);
        Ok(())
    }

    fn dispose(&mut self) {
        self.gpu = None;
        self.tree = None;
    }

    fn on_resize(&mut self, _width: u32, _height: u32) {
        // Forces re-rasterization at the new size
        self.gpu = None;
    }

    fn prepare_frame(&mut self, env: &mut FrameEnv, frame: &WidgetFrame) {
        if !frame.on {
            self.gpu = None;
            return;
        }
        let width = frame.rect.width.max(1.0) as u32;
        let height = frame.rect.height.max(1.0) as u32;
        if self.gpu.is_some() && self.rendered_size == (width, height) {
            return;
        }
        let Some(rgba) = self.rasterize(width, height) else {
            return;
        };
        let uploader =
            TextureUploader::new(env.ctx, width, height, wgpu::TextureFormat::Rgba8Unorm);
        uploader.upload(env.ctx, &rgba);
        let blit = BlitRenderer::new(env.ctx.clone(), env.target_format);
        let bind_group = blit.create_bind_group(uploader.view());
        self.gpu = Some(VectorGpu { blit, bind_group });
        self.rendered_size = (width, height);
        tracing::debug!(width, height, "svg rasterized");
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

#[cfg(test)]
mod tests {
    use super::*;

    const SVG: &[u8] =
        br#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10" fill="red"/></svg>"#;

    #[test]
    fn valid_svg_parses() {
        let mut w = VectorWidget::default();
        assert!(w.init(SVG).is_ok());
        assert!(w.tree.is_some());
    }

    #[test]
    fn invalid_svg_is_rejected() {
        let mut w = VectorWidget::default();
        assert!(w.init(b"<not svg").is_err());
    }

    #[test]
    fn rasterize_produces_straight_rgba() {
        let mut w = VectorWidget::default();
        w.init(SVG).unwrap();
        let rgba = w.rasterize(4, 4).unwrap();
        assert_eq!(rgba.len(), 4 * 4 * 4);
        // Solid red fill
        assert_eq!(&rgba[0..4], &[255, 0, 0, 255]);
    }
}
