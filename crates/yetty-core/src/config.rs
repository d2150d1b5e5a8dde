//! Runtime configuration consumed by the rendering core.
//!
//! Only the shapes the core actually reads live here; parsing a user-facing
//! configuration file is the embedding application's job.

use std::path::PathBuf;

/// Configuration for the rendering and widget subsystems.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the regular terminal font. Bold/italic variants are
    /// auto-discovered from this path's naming convention.
    pub font_path: Option<PathBuf>,
    /// Intrinsic rasterization size of the MSDF atlas, in pixels.
    pub font_size: f32,
    /// MSDF range in pixels (the band around each edge over which the
    /// distance field is defined).
    pub msdf_range: f32,
    /// Width of the glyph atlas texture. Must be a power of two.
    pub atlas_width: u32,
    /// Directories searched for dynamic widget plugins.
    pub plugin_search_paths: Vec<PathBuf>,
    /// Optional directory for cached atlas dumps. `None` disables caching.
    pub atlas_cache_dir: Option<PathBuf>,
    /// Optional override for the terminal grid shader source file.
    pub grid_shader_path: Option<PathBuf>,
    /// Optional override for the rich text shader source file.
    pub rich_text_shader_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 32.0,
            msdf_range: 2.0,
            atlas_width: 8192,
            plugin_search_paths: Vec::new(),
            atlas_cache_dir: None,
            grid_shader_path: None,
            rich_text_shader_path: None,
        }
    }
}

impl Config {
    /// Validate the configuration, normalizing out-of-range values.
    ///
    /// The atlas width is clamped to a power of two and the MSDF range to
    /// the usable 1..=8 pixel band.
    pub fn normalized(mut self) -> Self {
        if !self.atlas_width.is_power_of_two() {
            self.atlas_width = self.atlas_width.next_power_of_two();
        }
        self.msdf_range = self.msdf_range.clamp(1.0, 8.0);
        if self.font_size <= 0.0 {
            self.font_size = 32.0;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rounds_atlas_width_up() {
        let cfg = Config {
            atlas_width: 5000,
            ..Config::default()
        };
        assert_eq!(cfg.normalized().atlas_width, 8192);
    }

    #[test]
    fn normalize_clamps_range() {
        let cfg = Config {
            msdf_range: 0.25,
            ..Config::default()
        };
        assert_eq!(cfg.normalized().msdf_range, 1.0);
    }
}
