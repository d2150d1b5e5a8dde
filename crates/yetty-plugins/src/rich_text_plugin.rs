//! Rich text widget: a scrollable text document rendered with the shared
//! MSDF pipeline.
//!
//! The payload is UTF-8 text laid out as one wrapped span. This widget is
//! also the host contract for externally extracted text (PDF pages): a
//! caller with exact glyph boxes feeds pre-positioned characters into the
//! same document instead of spans.

use yetty_render::Color;
use yetty_text::{RichText, RichTextRenderer, TextSpan};
use yetty_widget::{FrameEnv, Plugin, Widget, WidgetError, WidgetFrame, WidgetResult};

const MARGIN: f32 = 8.0;
const TEXT_SIZE: f32 = 18.0;

/// Renders scrollable rich text documents.
pub struct RichTextPlugin;

impl RichTextPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RichTextPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for RichTextPlugin {
    fn name(&self) -> &str {
        "richtext"
    }

    fn create_widget(&mut self, _widget_type: &str, _args: &str) -> WidgetResult<Box<dyn Widget>> {
        Ok(Box::new(RichTextWidget::new()))
    }
}

struct RichTextWidget {
    doc: RichText,
    renderer: Option<RichTextRenderer>,
}

impl RichTextWidget {
    fn new() -> Self {
        Self {
            doc: RichText::new("monospace"),
            renderer: None,
        }
    }
}

impl Widget for RichTextWidget {
    fn init(&mut self, payload: &[u8]) -> WidgetResult<()> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| WidgetError::InvalidPayload(format!("not UTF-8: {}", e)))?;
        self.doc.clear();
        self.doc.add_span(
            TextSpan::new(text, MARGIN, MARGIN + TEXT_SIZE, TEXT_SIZE)
                .with_color(Color::new(0.9, 0.9, 0.9, 1.0)),
        );
        Ok(())
    }

    fn dispose(&mut self) {
        self.renderer = None;
    }

    fn wants_mouse(&self) -> bool {
        true
    }

    fn on_mouse_scroll(&mut self, _dx: f32, dy: f32, _mods: u32) -> bool {
        self.doc.scroll(-dy * TEXT_SIZE);
        true
    }

    fn prepare_frame(&mut self, env: &mut FrameEnv, frame: &WidgetFrame) {
        if !frame.on {
            self.renderer = None;
            return;
        }

        // Wrap to the widget width, minus margins
        let wrap_width = (frame.rect.width - 2.0 * MARGIN).max(1.0);
        self.doc.set_wrap_width(wrap_width);
        self.doc.layout(env.fonts, frame.rect.width, frame.rect.height);

        // The atlas may have grown fallback glyphs or be CPU-only still;
        // make sure every batch's font is uploadable before render.
        let font_ids: Vec<_> = self.doc.batches().iter().filter_map(|b| b.font).collect();
        for id in font_ids {
            let font = env.fonts.font_mut(id);
            if font.texture_view().is_none() {
                if let Err(e) = font.create_texture(env.ctx.device(), env.ctx.queue()) {
                    tracing::error!("font atlas upload failed: {}", e);
                }
            }
            if font.has_pending_upload()
                && let Err(e) = font.upload_pending(env.ctx.device(), env.ctx.queue())
            {
                tracing::error!("pending glyph upload failed: {}", e);
            }
        }
    }

    fn render(&mut self, env: &mut FrameEnv, frame: &WidgetFrame, target: &wgpu::TextureView) {
        if self.renderer.is_none() {
            match RichTextRenderer::new(env.ctx.clone(), env.target_format, None) {
                Ok(renderer) => self.renderer = Some(renderer),
                Err(e) => {
                    tracing::error!("rich text renderer creation failed: {}", e);
                    return;
                }
            }
        }
        let renderer = self.renderer.as_mut().unwrap();
        if let Err(e) = renderer.render(
            env.fonts,
            &self.doc,
            frame.rect,
            env.screen_width as f32,
            env.screen_height as f32,
            Some(Color::new(0.12, 0.12, 0.14, 1.0)),
            target,
        ) {
            tracing::error!("rich text render failed: {}", e);
        }
    }
}
