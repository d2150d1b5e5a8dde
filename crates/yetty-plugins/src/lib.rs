//! Yetty Plugins - the built-in widget renderers
//!
//! Every plugin follows the same pipeline pattern as the terminal grid:
//! one bind group layout, per-frame uniform upload, a 6-vertex quad draw
//! (instanced where needed), drawing into the shared surface target with a
//! load-preserving pass or compositing a privately rendered texture.

mod image_plugin;
mod rich_text_plugin;
mod scripted;
mod sdf_primitives;
mod shader_toy;
mod vector;

pub use image_plugin::ImagePlugin;
pub use rich_text_plugin::RichTextPlugin;
pub use scripted::{ScriptRuntime, ScriptedPlugin};
pub use sdf_primitives::{parse_primitives, SdfPrimitivesPlugin, MAX_PRIMITIVES};
pub use shader_toy::ShaderToyPlugin;
pub use vector::VectorPlugin;

use yetty_widget::PluginHost;

/// Register every built-in plugin on the host.
///
/// The scripted plugin is not registered here; it needs an embedder-provided
/// runtime (see [`ScriptedPlugin`]).
pub fn register_builtin_plugins(host: &mut PluginHost) {
    host.register_builtin("image", || Ok(Box::new(ImagePlugin::new())));
    host.register_builtin("shadertoy", || Ok(Box::new(ShaderToyPlugin::new())));
    host.register_builtin("sdf", || Ok(Box::new(SdfPrimitivesPlugin::new())));
    host.register_builtin("vector", || Ok(Box::new(VectorPlugin::new())));
    host.register_builtin("richtext", || Ok(Box::new(RichTextPlugin::new())));
}
