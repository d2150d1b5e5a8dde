//! Yetty Widget - embedded widget layers for the terminal
//!
//! This crate provides:
//! - The [`Widget`] trait and per-instance [`WidgetEntry`] state
//! - [`PluginHost`]: built-in and dynamically loaded plugin resolution
//! - [`WidgetManager`]: escape-sequence routing, widget lifecycle, input
//!   dispatch and the per-frame render walk
//! - [`base94`]: the printable payload encoding used on the wire

pub mod base94;
mod error;
mod host;
mod manager;
mod plugin;
mod widget;

pub use error::{WidgetError, WidgetResult};
pub use host::{PluginHost, BUILTIN_ENTRY_SYMBOL};
pub use manager::{WidgetManager, OSC_VENDOR_ID};
pub use plugin::Plugin;
pub use widget::{FrameEnv, PositionMode, Widget, WidgetEntry, WidgetFrame};
