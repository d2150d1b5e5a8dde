//! The plugin contract.
//!
//! A plugin represents a widget *type* ("image", "shadertoy") and owns
//! whatever resources its widgets share (a parser, a rasterizer, one UI
//! context). Plugins are lazily initialized the first time a widget of
//! their kind is created.

use crate::error::WidgetResult;
use crate::widget::Widget;
use std::sync::Arc;
use yetty_render::GraphicsContext;

/// A loaded widget plugin.
pub trait Plugin {
    /// The short name widgets address this plugin by.
    fn name(&self) -> &str;

    /// Widget types this plugin can create; empty means it has a single
    /// default type selected by the empty string.
    fn widget_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Initialize shared resources. `ctx` may be `None` when the plugin is
    /// resolved before the GPU exists; such plugins acquire GPU resources
    /// on first render instead.
    fn init(&mut self, _ctx: Option<&Arc<GraphicsContext>>) -> WidgetResult<()> {
        Ok(())
    }

    /// Construct a widget. The manager calls `Widget::init` with the
    /// payload afterwards.
    ///
    /// `widget_type` is empty for the plugin's default type; `args` carries
    /// plugin-specific options from the escape sequence.
    fn create_widget(&mut self, widget_type: &str, args: &str) -> WidgetResult<Box<dyn Widget>>;

    /// Release shared resources. Live widgets are disposed before this.
    fn dispose(&mut self) {}
}
