//! Yetty Grid - the terminal screen model and its renderer
//!
//! This crate provides:
//! - [`Grid`]: four parallel per-cell arrays (glyph index, fg, bg, attrs)
//! - [`Damage`]: the changed-subrectangle set driving partial GPU updates
//! - [`GridRenderer`]: one fullscreen draw sampling the MSDF atlas
//! - [`EmojiAtlas`]: color-bitmap glyphs for cells with the emoji hint

mod damage;
mod emoji;
mod grid;
mod renderer;

pub use damage::{Damage, DamageRect};
pub use emoji::{EmojiAtlas, EmojiMetadataGpu};
pub use grid::{CellAttrs, Grid, GLYPH_DECORATOR, GLYPH_EMPTY};
pub use renderer::{Cursor, GridRenderer};
