//! Plugin discovery and lazy loading.
//!
//! Resolution order for a plugin name:
//! 1. Already loaded: return the cached instance.
//! 2. Registered built-in: instantiate via its factory.
//! 3. Search each configured path for `<name>.{so,dylib,dll}` and load it
//!    through the shared-library entry point.
//!
//! Dynamic loading sits behind the `dynamic-plugins` feature; restricted
//! platforms still get built-ins through the factory table.

use crate::error::{WidgetError, WidgetResult};
use crate::plugin::Plugin;
use ahash::{HashMap, HashMapExt};
use std::path::PathBuf;
use std::sync::Arc;
use yetty_render::GraphicsContext;

/// The entry symbol a plugin shared library must export:
/// `extern "C" fn() -> *mut Box<dyn Plugin>`.
pub const BUILTIN_ENTRY_SYMBOL: &[u8] = b"yetty_plugin_create";

#[cfg(feature = "dynamic-plugins")]
type PluginCreateFn = unsafe extern "C" fn() -> *mut Box<dyn Plugin>;

type BuiltinFactory = fn() -> WidgetResult<Box<dyn Plugin>>;

/// Resolves plugin names to live plugin instances.
pub struct PluginHost {
    search_paths: Vec<PathBuf>,
    builtins: HashMap<String, BuiltinFactory>,
    loaded: HashMap<String, Box<dyn Plugin>>,
    ctx: Option<Arc<GraphicsContext>>,
    // Libraries must outlive the plugins created from them.
    #[cfg(feature = "dynamic-plugins")]
    libraries: Vec<libloading::Library>,
}

impl PluginHost {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            builtins: HashMap::new(),
            loaded: HashMap::new(),
            ctx: None,
            #[cfg(feature = "dynamic-plugins")]
            libraries: Vec::new(),
        }
    }

    /// Provide the GPU context handed to plugins at init time.
    pub fn set_context(&mut self, ctx: Arc<GraphicsContext>) {
        self.ctx = Some(ctx);
    }

    /// Register a built-in plugin factory (not created until first use).
    pub fn register_builtin(&mut self, name: impl Into<String>, factory: BuiltinFactory) {
        let name = name.into();
        tracing::info!(plugin = %name, "registered built-in plugin");
        self.builtins.insert(name, factory);
    }

    /// Whether a name resolves without attempting a filesystem load.
    pub fn is_known(&self, name: &str) -> bool {
        self.loaded.contains_key(name) || self.builtins.contains_key(name)
    }

    /// Names of all loaded and registered plugins.
    pub fn available(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builtins.keys().cloned().collect();
        for name in self.loaded.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.sort();
        names
    }

    /// Resolve a plugin, loading and initializing it on first use.
    pub fn get_or_load(&mut self, name: &str) -> WidgetResult<&mut Box<dyn Plugin>> {
        if !self.loaded.contains_key(name) {
            let mut plugin = self.instantiate(name)?;
            plugin
                .init(self.ctx.as_ref())
                .map_err(|e| WidgetError::PluginInitFailed {
                    plugin: name.to_owned(),
                    reason: e.to_string(),
                })?;
            tracing::info!(plugin = name, "plugin loaded");
            self.loaded.insert(name.to_owned(), plugin);
        }
        Ok(self.loaded.get_mut(name).unwrap())
    }

    /// Dispose every loaded plugin.
    pub fn dispose_all(&mut self) {
        for (name, plugin) in self.loaded.iter_mut() {
            tracing::debug!(plugin = %name, "disposing plugin");
            plugin.dispose();
        }
        self.loaded.clear();
    }

    fn instantiate(&mut self, name: &str) -> WidgetResult<Box<dyn Plugin>> {
        if let Some(factory) = self.builtins.get(name) {
            return factory();
        }
        self.load_dynamic(name)
    }

    #[cfg(feature = "dynamic-plugins")]
    fn load_dynamic(&mut self, name: &str) -> WidgetResult<Box<dyn Plugin>> {
        for dir in &self.search_paths {
            for ext in ["so", "dylib", "dll"] {
                let path = dir.join(format!("{}.{}", name, ext));
                if !path.is_file() {
                    continue;
                }
                tracing::info!(plugin = name, path = %path.display(), "loading plugin library");
                // SAFETY: loading an arbitrary shared library runs its
                // constructors; the operator controls the search paths.
                let library = unsafe { libloading::Library::new(&path) }.map_err(|e| {
                    WidgetError::PluginLoadFailed {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                let plugin = unsafe {
                    let create: libloading::Symbol<PluginCreateFn> = library
                        .get(BUILTIN_ENTRY_SYMBOL)
                        .map_err(|e| WidgetError::PluginLoadFailed {
                            path: path.display().to_string(),
                            reason: format!("missing entry symbol: {}", e),
                        })?;
                    *Box::from_raw(create())
                };
                self.libraries.push(library);
                return Ok(plugin);
            }
        }
        Err(WidgetError::PluginNotFound(name.to_owned()))
    }

    #[cfg(not(feature = "dynamic-plugins"))]
    fn load_dynamic(&mut self, name: &str) -> WidgetResult<Box<dyn Plugin>> {
        Err(WidgetError::PluginNotFound(name.to_owned()))
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

/// Export the entry point a plugin shared library needs.
///
/// ```ignore
/// struct MyPlugin;
/// impl Plugin for MyPlugin { /* ... */ }
///
/// yetty_widget::declare_plugin!(MyPlugin, MyPlugin::default);
/// ```
///
/// The produced `yetty_plugin_create` symbol matches what
/// [`PluginHost`] resolves when it loads `<name>.{so,dylib,dll}`.
#[macro_export]
macro_rules! declare_plugin {
    ($plugin_type:ty, $constructor:path) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn yetty_plugin_create() -> *mut Box<dyn $crate::Plugin> {
            let constructor: fn() -> $plugin_type = $constructor;
            let boxed: Box<Box<dyn $crate::Plugin>> = Box::new(Box::new(constructor()));
            Box::into_raw(boxed)
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::{FrameEnv, Widget, WidgetFrame};

    struct DummyWidget;
    impl Widget for DummyWidget {
        fn init(&mut self, _payload: &[u8]) -> WidgetResult<()> {
            Ok(())
        }
        fn render(&mut self, _env: &mut FrameEnv, _f: &WidgetFrame, _t: &wgpu::TextureView) {}
    }

    struct DummyPlugin {
        initialized: bool,
    }
    impl Plugin for DummyPlugin {
        fn name(&self) -> &str {
            "dummy"
        }
        fn init(&mut self, _ctx: Option<&Arc<GraphicsContext>>) -> WidgetResult<()> {
            self.initialized = true;
            Ok(())
        }
        fn create_widget(&mut self, _t: &str, _args: &str) -> WidgetResult<Box<dyn Widget>> {
            Ok(Box::new(DummyWidget))
        }
    }

    fn dummy_factory() -> WidgetResult<Box<dyn Plugin>> {
        Ok(Box::new(DummyPlugin { initialized: false }))
    }

    #[test]
    fn builtin_resolution_is_lazy_and_cached() {
        let mut host = PluginHost::new(vec![]);
        host.register_builtin("dummy", dummy_factory);
        assert!(host.is_known("dummy"));

        let first = host.get_or_load("dummy").unwrap();
        let name = first.name().to_owned();
        assert_eq!(name, "dummy");

        // Second resolution hits the cache (same instance, still one entry)
        host.get_or_load("dummy").unwrap();
        assert_eq!(host.available(), vec!["dummy".to_owned()]);
    }

    #[test]
    fn unknown_plugin_errors() {
        let mut host = PluginHost::new(vec![]);
        match host.get_or_load("nope") {
            Err(WidgetError::PluginNotFound(name)) => assert_eq!(name, "nope"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}
