//! Rich text layout: spans to positioned chars to per-font glyph batches.
//!
//! Layout is a pure function of the document and the current font manager
//! state; there is no incremental state machine. Missing fonts skip the
//! span, missing glyphs skip the character (atlas-level fallback is the
//! font system's job, not RichText's).

use crate::span::{TextChar, TextSpan};
use ahash::{HashMap, HashMapExt};
use bytemuck::{Pod, Zeroable};
use yetty_font::{FontId, FontManager};

/// One GPU glyph instance. Field-for-field the layout the rich text shader
/// reads from its storage buffer (13 packed floats).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlyphInstance {
    pub pos_x: f32,
    pub pos_y: f32,
    pub uv_min_x: f32,
    pub uv_min_y: f32,
    pub uv_max_x: f32,
    pub uv_max_y: f32,
    pub size_x: f32,
    pub size_y: f32,
    pub color_r: f32,
    pub color_g: f32,
    pub color_b: f32,
    pub color_a: f32,
    pub scale: f32,
}

/// Glyph instances grouped by the font whose atlas they sample.
#[derive(Debug, Default)]
pub struct FontBatch {
    pub font: Option<FontId>,
    pub glyphs: Vec<GlyphInstance>,
}

/// A rich text document: spans or pre-positioned chars, plus the laid-out
/// glyph batches derived from them.
///
/// # Example
///
/// ```ignore
/// use yetty_text::{RichText, TextSpan};
/// use yetty_font::Style;
///
/// let mut doc = RichText::new("monospace");
/// doc.add_span(TextSpan::new("Heading\n", 8.0, 24.0, 24.0).with_style(Style::Bold));
/// doc.add_span(TextSpan::new(body_text, 8.0, 56.0, 16.0).with_wrap(480.0));
///
/// doc.layout(&mut fonts, view_width, view_height);
/// for batch in doc.batches() {
///     // one instanced draw per font
/// }
/// ```
///
/// # Pre-positioned Mode
///
/// Callers that already know exact glyph boxes (PDF text extraction) feed
/// [`TextChar`]s with `pre_positioned` set instead of spans; layout then
/// only computes content bounds and builds the same per-font batches.
pub struct RichText {
    spans: Vec<TextSpan>,
    chars: Vec<TextChar>,
    use_chars_directly: bool,
    default_family: String,
    scroll_offset: f32,
    content_width: f32,
    content_height: f32,
    batches: Vec<FontBatch>,
    glyph_count: usize,
    layout_dirty: bool,
    last_view: (f32, f32),
}

impl RichText {
    pub fn new(default_family: impl Into<String>) -> Self {
        Self {
            spans: Vec::new(),
            chars: Vec::new(),
            use_chars_directly: false,
            default_family: default_family.into(),
            scroll_offset: 0.0,
            content_width: 0.0,
            content_height: 0.0,
            batches: Vec::new(),
            glyph_count: 0,
            layout_dirty: true,
            last_view: (0.0, 0.0),
        }
    }

    /// Drop all content.
    pub fn clear(&mut self) {
        self.spans.clear();
        self.chars.clear();
        self.use_chars_directly = false;
        self.batches.clear();
        self.glyph_count = 0;
        self.content_width = 0.0;
        self.content_height = 0.0;
        self.layout_dirty = true;
    }

    pub fn add_span(&mut self, span: TextSpan) {
        self.spans.push(span);
        self.use_chars_directly = false;
        self.layout_dirty = true;
    }

    pub fn add_spans(&mut self, spans: impl IntoIterator<Item = TextSpan>) {
        self.spans.extend(spans);
        self.use_chars_directly = false;
        self.layout_dirty = true;
    }

    /// Add pre-positioned characters; switches the document to
    /// char-passthrough mode.
    pub fn add_chars(&mut self, chars: impl IntoIterator<Item = TextChar>) {
        self.chars.extend(chars);
        self.use_chars_directly = true;
        self.layout_dirty = true;
    }

    /// Enable wrapping at `width` for every span. Dirty only when a span
    /// actually changes, so calling this every frame is cheap.
    pub fn set_wrap_width(&mut self, width: f32) {
        let mut changed = false;
        for span in &mut self.spans {
            if !span.wrap || (span.max_width - width).abs() > 0.5 {
                span.wrap = true;
                span.max_width = width;
                changed = true;
            }
        }
        if changed {
            self.layout_dirty = true;
        }
    }

    pub fn set_scroll_offset(&mut self, offset: f32) {
        self.scroll_offset = offset.max(0.0);
    }

    pub fn scroll(&mut self, delta: f32) {
        self.scroll_offset = (self.scroll_offset + delta).max(0.0);
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    /// Content bounds from the last layout.
    pub fn content_size(&self) -> (f32, f32) {
        (self.content_width, self.content_height)
    }

    pub fn batches(&self) -> &[FontBatch] {
        &self.batches
    }

    pub fn glyph_count(&self) -> usize {
        self.glyph_count
    }

    /// Force a re-layout on the next [`layout`](Self::layout) call.
    pub fn mark_dirty(&mut self) {
        self.layout_dirty = true;
    }

    /// Lay the document out for a view of the given size.
    ///
    /// A no-op when nothing changed since the last layout at this size.
    pub fn layout(&mut self, fonts: &mut FontManager, view_width: f32, view_height: f32) {
        if !self.layout_dirty && self.last_view == (view_width, view_height) {
            return;
        }

        if !self.use_chars_directly {
            self.layout_spans(fonts, view_width);
        } else {
            self.measure_chars();
        }
        self.build_glyph_instances(fonts);

        self.last_view = (view_width, view_height);
        self.layout_dirty = false;
        tracing::debug!(
            chars = self.chars.len(),
            glyphs = self.glyph_count,
            batches = self.batches.len(),
            "rich text laid out"
        );
    }

    fn resolve_font(
        &self,
        fonts: &mut FontManager,
        family: Option<&str>,
    ) -> Option<FontId> {
        let family = family.unwrap_or(&self.default_family);
        match fonts.get_or_load(family) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(family, "no font for span: {}", e);
                None
            }
        }
    }

    fn layout_spans(&mut self, fonts: &mut FontManager, view_width: f32) {
        self.chars.clear();
        self.content_width = 0.0;
        self.content_height = 0.0;

        // Spans are taken by value to appease the borrow checker; they are
        // restored unchanged afterwards.
        let spans = std::mem::take(&mut self.spans);
        for span in &spans {
            if span.text.is_empty() {
                continue;
            }
            let Some(font_id) = self.resolve_font(fonts, span.font_family.as_deref()) else {
                continue;
            };
            let font = fonts.font(font_id);

            let scale = span.size / font.font_size();
            let line_height = if span.line_height > 0.0 {
                span.line_height
            } else {
                font.line_height() * scale
            };
            let max_width = if span.wrap { span.max_width } else { view_width };
            let start_x = span.x;

            let mut cursor_x = span.x;
            let mut cursor_y = span.y;

            for ch in span.text.chars() {
                if ch == '\n' {
                    cursor_x = start_x;
                    cursor_y += line_height;
                    continue;
                }
                if ch == '\r' {
                    continue;
                }

                let Some(metrics) = font.glyph_exact(ch as u32, span.style) else {
                    tracing::debug!(codepoint = ch as u32, "glyph missing, char skipped");
                    continue;
                };
                let advance = metrics.advance * scale;

                if span.wrap && cursor_x + advance > start_x + max_width && cursor_x > start_x {
                    cursor_x = start_x;
                    cursor_y += line_height;
                }

                self.chars.push(TextChar {
                    codepoint: ch as u32,
                    x: cursor_x,
                    y: cursor_y,
                    size: span.size,
                    color: span.color,
                    style: span.style,
                    font_family: span.font_family.clone(),
                    pre_positioned: false,
                    target_width: 0.0,
                    target_height: 0.0,
                });

                cursor_x += advance;
                self.content_width = self.content_width.max(cursor_x);
            }
            self.content_height = self.content_height.max(cursor_y + line_height);
        }
        self.spans = spans;
    }

    fn measure_chars(&mut self) {
        self.content_width = 0.0;
        self.content_height = 0.0;
        for ch in &self.chars {
            self.content_width = self.content_width.max(ch.x + ch.size);
            self.content_height = self.content_height.max(ch.y + ch.size);
        }
    }

    fn build_glyph_instances(&mut self, fonts: &mut FontManager) {
        self.batches.clear();
        self.glyph_count = 0;
        let mut batch_of: HashMap<FontId, usize> = HashMap::new();
        let mut skipped_no_font = 0usize;
        let mut skipped_no_glyph = 0usize;

        let chars = std::mem::take(&mut self.chars);
        for ch in &chars {
            if ch.codepoint == '\n' as u32 || ch.codepoint == '\r' as u32 {
                continue;
            }
            let Some(font_id) = self.resolve_font(fonts, ch.font_family.as_deref()) else {
                skipped_no_font += 1;
                continue;
            };
            let font = fonts.font(font_id);
            let Some(metrics) = font.glyph_exact(ch.codepoint, ch.style) else {
                skipped_no_glyph += 1;
                continue;
            };

            let font_scale = ch.size / font.font_size();
            let (glyph_w, glyph_h) =
                if ch.pre_positioned && ch.target_width > 0.1 && ch.target_height > 0.1 {
                    (ch.target_width, ch.target_height)
                } else {
                    (metrics.size.x * font_scale, metrics.size.y * font_scale)
                };
            if glyph_w < 0.1 || glyph_h < 0.1 {
                continue; // spaces and sub-pixel glyphs
            }

            let (glyph_x, glyph_y) = if ch.pre_positioned {
                (ch.x, ch.y)
            } else {
                (
                    ch.x + metrics.bearing.x * font_scale,
                    ch.y - metrics.bearing.y * font_scale,
                )
            };

            let instance = GlyphInstance {
                pos_x: glyph_x,
                pos_y: glyph_y,
                uv_min_x: metrics.uv_min.x,
                uv_min_y: metrics.uv_min.y,
                uv_max_x: metrics.uv_max.x,
                uv_max_y: metrics.uv_max.y,
                size_x: glyph_w,
                size_y: glyph_h,
                color_r: ch.color.r,
                color_g: ch.color.g,
                color_b: ch.color.b,
                color_a: ch.color.a,
                scale: font_scale,
            };

            let idx = *batch_of.entry(font_id).or_insert_with(|| {
                self.batches.push(FontBatch {
                    font: Some(font_id),
                    glyphs: Vec::new(),
                });
                self.batches.len() - 1
            });
            self.batches[idx].glyphs.push(instance);
            self.glyph_count += 1;
        }
        self.chars = chars;

        if skipped_no_font + skipped_no_glyph > 0 {
            tracing::debug!(
                skipped_no_font,
                skipped_no_glyph,
                "chars skipped during instance build"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use yetty_font::{Font, FontManagerOptions, GlyphMetrics, Style};

    /// A manager with one synthetic font whose glyphs have fixed metrics.
    fn test_fonts() -> FontManager {
        let mut mgr = FontManager::new_isolated(FontManagerOptions::default());
        let mut font = Font::empty(32.0, 2.0, 256, 256);
        for ch in ['a', 'b', 'c', 'w', '?'] {
            font.insert_glyph(
                ch as u32,
                Style::Regular,
                GlyphMetrics {
                    uv_min: Vec2::new(0.1, 0.1),
                    uv_max: Vec2::new(0.2, 0.2),
                    size: Vec2::new(18.0, 24.0),
                    bearing: Vec2::new(1.0, 22.0),
                    advance: 16.0,
                },
            );
        }
        mgr.install("Test Mono", font);
        mgr
    }

    #[test]
    fn newline_resets_x_and_advances_y() {
        let mut fonts = test_fonts();
        let mut doc = RichText::new("Test Mono");
        doc.add_span(TextSpan::new("ab\nc", 10.0, 40.0, 32.0));
        doc.layout(&mut fonts, 800.0, 600.0);

        let batch = &doc.batches()[0];
        assert_eq!(batch.glyphs.len(), 3);
        // 'c' starts back at x=10 (plus bearing), one line below
        let font = fonts.font(batch.font.unwrap());
        let lh = font.line_height();
        let a = &batch.glyphs[0];
        let c = &batch.glyphs[2];
        assert!((c.pos_x - a.pos_x).abs() < 1e-3);
        assert!((c.pos_y - (a.pos_y + lh)).abs() < 1e-3);
    }

    #[test]
    fn wrap_breaks_before_overflowing_char() {
        let mut fonts = test_fonts();
        let mut doc = RichText::new("Test Mono");
        // advance = 16 at size 32; wrap width 40 fits two chars per line
        let span = TextSpan::new("abcw", 0.0, 30.0, 32.0).with_wrap(40.0);
        doc.add_span(span);
        doc.layout(&mut fonts, 800.0, 600.0);

        let glyphs = &doc.batches()[0].glyphs;
        assert_eq!(glyphs.len(), 4);
        assert!(glyphs[2].pos_y > glyphs[1].pos_y, "third char wrapped");
        assert!((glyphs[2].pos_x - glyphs[0].pos_x).abs() < 1e-3);
    }

    #[test]
    fn missing_glyph_is_skipped_not_substituted() {
        let mut fonts = test_fonts();
        let mut doc = RichText::new("Test Mono");
        doc.add_span(TextSpan::new("a\u{4E2D}b", 0.0, 30.0, 32.0));
        doc.layout(&mut fonts, 800.0, 600.0);

        // The CJK char has no glyph and must not appear as '?'
        assert_eq!(doc.glyph_count(), 2);
    }

    #[test]
    fn unknown_family_falls_back_and_layout_proceeds() {
        let mut fonts = test_fonts();
        let mut doc = RichText::new("Test Mono");
        let span = TextSpan::new("ab", 0.0, 30.0, 32.0).with_family("Helvetica");
        doc.add_span(span);
        doc.layout(&mut fonts, 800.0, 600.0);
        assert_eq!(doc.glyph_count(), 2);
    }

    #[test]
    fn pre_positioned_chars_use_exact_boxes() {
        let mut fonts = test_fonts();
        let mut doc = RichText::new("Test Mono");
        doc.add_chars([TextChar::pre_positioned('a' as u32, 5.0, 7.0, 11.0, 13.0)]);
        doc.layout(&mut fonts, 800.0, 600.0);

        let g = &doc.batches()[0].glyphs[0];
        assert_eq!((g.pos_x, g.pos_y), (5.0, 7.0));
        assert_eq!((g.size_x, g.size_y), (11.0, 13.0));
    }

    #[test]
    fn sub_pixel_glyphs_are_dropped() {
        let mut fonts = test_fonts();
        let mut doc = RichText::new("Test Mono");
        doc.add_span(TextSpan::new("a", 0.0, 30.0, 0.05));
        doc.layout(&mut fonts, 800.0, 600.0);
        assert_eq!(doc.glyph_count(), 0);
    }

    #[test]
    fn scroll_offset_clamps_at_zero() {
        let mut doc = RichText::new("Test Mono");
        doc.scroll(-10.0);
        assert_eq!(doc.scroll_offset(), 0.0);
        doc.scroll(25.0);
        assert_eq!(doc.scroll_offset(), 25.0);
    }
}
