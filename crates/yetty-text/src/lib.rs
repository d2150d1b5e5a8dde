//! Yetty Text - rich text over the shared MSDF atlas
//!
//! A [`RichText`] document is an ordered list of styled spans (or
//! pre-positioned characters, for callers that computed exact glyph boxes
//! themselves, e.g. PDF text extraction). Layout turns spans into
//! positioned characters, then groups GPU glyph instances into per-font
//! batches that [`RichTextRenderer`] draws with one instanced quad draw per
//! font.

mod layout;
mod renderer;
mod span;

pub use layout::{FontBatch, GlyphInstance, RichText};
pub use renderer::RichTextRenderer;
pub use span::{TextChar, TextSpan};
