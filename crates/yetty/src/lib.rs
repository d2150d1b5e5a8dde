//! Yetty - a GPU-accelerated terminal rendering core
//!
//! The distinguishing trait of this terminal is the ability to embed rich,
//! dynamic widgets (images, shader toys, vector graphics, rich text) into
//! the scrolling cell grid via escape sequences. This facade crate wires
//! the subsystem crates into a per-frame [`Engine`]:
//!
//! - [`yetty_render`]: WebGPU context and surface lifecycle
//! - [`yetty_font`]: MSDF glyph atlas and font management
//! - [`yetty_grid`]: the cell grid and its fullscreen renderer
//! - [`yetty_text`]: rich text layout over the shared atlas
//! - [`yetty_widget`]: widget model, plugin host, escape routing
//! - [`yetty_plugins`]: the built-in widget renderers

mod engine;

pub use engine::{Engine, EngineError};

pub use yetty_core as core;
pub use yetty_font as font;
pub use yetty_grid as grid;
pub use yetty_plugins as plugins;
pub use yetty_render as render;
pub use yetty_text as text;
pub use yetty_widget as widget;
