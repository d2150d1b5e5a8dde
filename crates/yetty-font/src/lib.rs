//! Yetty Font - MSDF glyph atlas and font management
//!
//! This crate rasterizes font outlines into a multi-channel signed distance
//! field atlas and exposes the compact glyph-index scheme the terminal
//! renderer consumes:
//! - [`Font`]: atlas bitmap, per-style metric maps, packed GPU metadata
//! - Shelf packing with dynamic atlas growth
//! - Runtime fallback loading of missing glyphs from system fonts
//! - Atlas persistence (LZ4 dump or PNG, plus a JSON metrics sidecar)
//! - [`FontManager`]: family/style resolution with a fallback chain

mod atlas_io;
mod error;
mod fallback;
mod font;
mod manager;
mod msdf;
mod packer;

pub use error::{FontError, FontResult};
pub use font::{Font, FontSource, GlyphMetadataGpu, GlyphMetrics, Style};
pub use manager::{FontId, FontManager, FontManagerOptions};
pub use packer::ShelfPacker;
