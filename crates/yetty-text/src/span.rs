//! Rich text input records.

use yetty_font::Style;
use yetty_render::Color;

/// A styled run of text positioned in widget-local pixels.
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub text: String,
    /// Left edge of the span's first line.
    pub x: f32,
    /// Baseline of the span's first line.
    pub y: f32,
    /// Rendered size in pixels (glyphs are scaled from the atlas size).
    pub size: f32,
    pub color: Color,
    pub style: Style,
    /// Font family; `None` inherits the document default.
    pub font_family: Option<String>,
    /// Wrap width; only meaningful when `wrap` is set.
    pub max_width: f32,
    /// Line advance; `0` derives it from the font.
    pub line_height: f32,
    pub wrap: bool,
}

impl TextSpan {
    /// A plain white span at the given position.
    pub fn new(text: impl Into<String>, x: f32, y: f32, size: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            size,
            color: Color::WHITE,
            style: Style::Regular,
            font_family: None,
            max_width: 0.0,
            line_height: 0.0,
            wrap: false,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn with_wrap(mut self, max_width: f32) -> Self {
        self.wrap = true;
        self.max_width = max_width;
        self
    }
}

/// A single positioned character.
///
/// Spans decay to these during layout; callers with externally computed
/// glyph boxes (PDF charboxes) add them directly with `pre_positioned`
/// set, in which case `(x, y)` is the glyph quad's top-left corner instead
/// of a baseline pen position.
#[derive(Debug, Clone)]
pub struct TextChar {
    pub codepoint: u32,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: Color,
    pub style: Style,
    pub font_family: Option<String>,
    pub pre_positioned: bool,
    /// Exact quad width; `0` derives it from glyph metrics.
    pub target_width: f32,
    /// Exact quad height; `0` derives it from glyph metrics.
    pub target_height: f32,
}

impl TextChar {
    /// A baseline-positioned character.
    pub fn new(codepoint: u32, x: f32, y: f32, size: f32) -> Self {
        Self {
            codepoint,
            x,
            y,
            size,
            color: Color::WHITE,
            style: Style::Regular,
            font_family: None,
            pre_positioned: false,
            target_width: 0.0,
            target_height: 0.0,
        }
    }

    /// A pre-positioned character with an exact target box.
    pub fn pre_positioned(codepoint: u32, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            codepoint,
            x,
            y,
            size: height,
            color: Color::WHITE,
            style: Style::Regular,
            font_family: None,
            pre_positioned: true,
            target_width: width,
            target_height: height,
        }
    }
}
