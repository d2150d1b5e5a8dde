//! Shader asset loading.
//!
//! Shader WGSL sources are compiled into the binary but can be overridden
//! with on-disk files for iteration without a rebuild.

use crate::context::{GraphicsError, RenderResult};
use std::path::Path;

/// Load a shader source, preferring an on-disk override over the built-in
/// default.
pub fn load_shader_source(
    override_path: Option<&Path>,
    builtin: &'static str,
) -> RenderResult<String> {
    match override_path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            GraphicsError::ShaderLoadFailed(format!("{}: {}", path.display(), e))
        }),
        None => Ok(builtin.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_is_used_without_override() {
        let src = load_shader_source(None, "fn f() {}").unwrap();
        assert_eq!(src, "fn f() {}");
    }

    #[test]
    fn missing_override_is_an_error() {
        let err = load_shader_source(Some(Path::new("/nonexistent/shader.wgsl")), "x");
        assert!(err.is_err());
    }
}
