/// Errors that can occur in the widget and plugin layer.
#[derive(Debug)]
pub enum WidgetError {
    /// No plugin with the requested name was found or could be loaded.
    PluginNotFound(String),

    /// Shared library loading failed.
    PluginLoadFailed { path: String, reason: String },

    /// A plugin's `init` rejected the context.
    PluginInitFailed { plugin: String, reason: String },

    /// Widget construction or (re-)initialization failed.
    WidgetInitFailed(String),

    /// A payload could not be parsed by the widget.
    InvalidPayload(String),

    /// GPU work inside a widget failed.
    RenderFailed(String),
}

impl std::fmt::Display for WidgetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidgetError::PluginNotFound(name) => write!(f, "Plugin not found: {}", name),
            WidgetError::PluginLoadFailed { path, reason } => {
                write!(f, "Failed to load plugin {}: {}", path, reason)
            }
            WidgetError::PluginInitFailed { plugin, reason } => {
                write!(f, "Plugin '{}' failed to initialize: {}", plugin, reason)
            }
            WidgetError::WidgetInitFailed(msg) => write!(f, "Widget init failed: {}", msg),
            WidgetError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            WidgetError::RenderFailed(msg) => write!(f, "Widget render failed: {}", msg),
        }
    }
}

impl std::error::Error for WidgetError {}

/// Result type for widget operations.
pub type WidgetResult<T> = Result<T, WidgetError>;
