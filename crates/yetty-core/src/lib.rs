//! Yetty Core
//!
//! Shared utilities for the yetty terminal emulator:
//! - Geometry primitives (cell and pixel rectangles)
//! - Runtime configuration consumed by the rendering core
//! - Structured logging initialization

pub mod config;
pub mod geometry;
pub mod logging;
pub mod math;

pub use config::Config;
pub use geometry::{CellRect, PixelRect, Rect};
