//! Font management: family resolution, caching and the fallback chain.
//!
//! Fonts are owned by the manager and addressed by a copyable [`FontId`];
//! renderers keep ids plus a resource-version snapshot instead of owning
//! handles, so cache invalidation needs no shared-ownership cycles.
//!
//! # Example
//!
//! ```rust,no_run
//! use yetty_font::{FontManager, FontManagerOptions};
//!
//! let mut fonts = FontManager::new(FontManagerOptions::default());
//!
//! // First use generates (or restores) the MSDF atlas
//! let id = fonts.get_or_load("monospace").expect("no monospace font installed");
//!
//! // Renderers hold the copyable id, not the font
//! let line_height = fonts.font(id).line_height();
//! ```
//!
//! # Fallback Resolution
//!
//! A family that is not installed walks a list of well-known monospace and
//! sans-serif families before giving up; when even those are missing the
//! already-loaded default font is returned, so text layout can always
//! proceed.

use crate::error::{FontError, FontResult};
use crate::font::{Font, FontSource};
use ahash::{HashMap, HashMapExt};
use std::path::PathBuf;

/// Well-known families tried when a requested family is not installed.
const FALLBACK_FAMILIES: &[&str] = &[
    "monospace",
    "DejaVu Sans Mono",
    "Liberation Mono",
    "JetBrains Mono",
    "Consolas",
    "Menlo",
    "DejaVu Sans",
];

/// Stable handle to a font owned by the [`FontManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontId(u32);

/// Options controlling atlas generation.
#[derive(Debug, Clone)]
pub struct FontManagerOptions {
    pub font_size: f32,
    pub msdf_range: f32,
    pub atlas_width: u32,
    /// Directory for cached atlas dumps; `None` disables the cache.
    pub atlas_cache_dir: Option<PathBuf>,
}

impl Default for FontManagerOptions {
    fn default() -> Self {
        Self {
            font_size: 32.0,
            msdf_range: 2.0,
            atlas_width: 8192,
            atlas_cache_dir: None,
        }
    }
}

/// Loads and caches fonts by family name.
///
/// # Example
///
/// ```rust,no_run
/// use yetty_font::{FontManager, FontManagerOptions};
/// use std::path::PathBuf;
///
/// let mut fonts = FontManager::new(FontManagerOptions {
///     font_size: 32.0,
///     msdf_range: 2.0,
///     atlas_width: 8192,
///     atlas_cache_dir: Some(PathBuf::from("/tmp/yetty-atlas")),
/// });
/// let terminal = fonts
///     .load_from_path("terminal", PathBuf::from("/usr/share/fonts/Mono-Regular.ttf"))
///     .expect("font generation");
/// assert_eq!(fonts.default_font(), Some(terminal));
/// ```
pub struct FontManager {
    options: FontManagerOptions,
    db: fontdb::Database,
    fonts: Vec<Font>,
    by_family: HashMap<String, FontId>,
    default_font: Option<FontId>,
}

impl FontManager {
    /// Create a manager backed by the system font database.
    pub fn new(options: FontManagerOptions) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        tracing::info!(faces = db.len(), "font database loaded");
        Self {
            options,
            db,
            fonts: Vec::new(),
            by_family: HashMap::new(),
            default_font: None,
        }
    }

    /// Create a manager without touching the system database (tests).
    pub fn new_isolated(options: FontManagerOptions) -> Self {
        Self {
            options,
            db: fontdb::Database::new(),
            fonts: Vec::new(),
            by_family: HashMap::new(),
            default_font: None,
        }
    }

    /// Load a font file and register it under `family`. The first loaded
    /// font becomes the default.
    pub fn load_from_path(&mut self, family: &str, path: PathBuf) -> FontResult<FontId> {
        if let Some(&id) = self.by_family.get(family) {
            return Ok(id);
        }
        let font = self.generate_or_restore(family, &path)?;
        Ok(self.install(family, font))
    }

    /// Resolve `family` to a loaded font, generating the atlas on first
    /// use. Unknown families walk the fallback chain; an error means not
    /// even the fallbacks are installed.
    pub fn get_or_load(&mut self, family: &str) -> FontResult<FontId> {
        if let Some(&id) = self.by_family.get(family) {
            return Ok(id);
        }
        if let Some(path) = self.resolve_family_path(family) {
            let font = self.generate_or_restore(family, &path)?;
            return Ok(self.install(family, font));
        }

        tracing::warn!(family, "family not installed, walking fallback chain");
        for fallback in FALLBACK_FAMILIES {
            if let Some(&id) = self.by_family.get(*fallback) {
                return Ok(id);
            }
            if let Some(path) = self.resolve_family_path(fallback) {
                let font = self.generate_or_restore(fallback, &path)?;
                let id = self.install(fallback, font);
                return Ok(id);
            }
        }
        if let Some(id) = self.default_font {
            return Ok(id);
        }
        Err(FontError::NoFontForFamily(family.to_owned()))
    }

    /// The default (terminal) font.
    pub fn default_font(&self) -> Option<FontId> {
        self.default_font
    }

    /// The backing system font database.
    pub fn database(&self) -> &fontdb::Database {
        &self.db
    }

    /// Borrow a font.
    ///
    /// # Panics
    ///
    /// Panics on a stale id; ids are never recycled, so this indicates a
    /// logic error.
    pub fn font(&self, id: FontId) -> &Font {
        &self.fonts[id.0 as usize]
    }

    /// Mutably borrow a font (fallback loading, GPU uploads).
    pub fn font_mut(&mut self, id: FontId) -> &mut Font {
        &mut self.fonts[id.0 as usize]
    }

    /// Register an already-built font (atlas restored externally, tests).
    pub fn install(&mut self, family: &str, font: Font) -> FontId {
        let id = FontId(self.fonts.len() as u32);
        self.fonts.push(font);
        self.by_family.insert(family.to_owned(), id);
        self.default_font.get_or_insert(id);
        tracing::info!(family, ?id, "font installed");
        id
    }

    fn resolve_family_path(&self, family: &str) -> Option<PathBuf> {
        let query_family = match family {
            "monospace" => fontdb::Family::Monospace,
            "sans-serif" => fontdb::Family::SansSerif,
            "serif" => fontdb::Family::Serif,
            other => fontdb::Family::Name(other),
        };
        let id = self.db.query(&fontdb::Query {
            families: &[query_family],
            weight: fontdb::Weight::NORMAL,
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        })?;
        let info = self.db.face(id)?;
        match &info.source {
            fontdb::Source::File(path) => Some(path.clone()),
            _ => None,
        }
    }

    fn generate_or_restore(&self, family: &str, path: &PathBuf) -> FontResult<Font> {
        if let Some(cache_dir) = &self.options.atlas_cache_dir {
            let stem = format!(
                "{}-{}",
                family.replace([' ', '/'], "_"),
                self.options.font_size as u32
            );
            let atlas_path = cache_dir.join(format!("{}.atlas", stem));
            let metrics_path = cache_dir.join(format!("{}.json", stem));
            if atlas_path.is_file() && metrics_path.is_file() {
                match Font::load_atlas(&atlas_path, &metrics_path) {
                    Ok(font) => {
                        tracing::info!(family, "atlas restored from cache");
                        return Ok(font);
                    }
                    Err(e) => {
                        tracing::warn!(family, "atlas cache unusable: {}", e);
                    }
                }
            }
            let font = Font::generate(
                FontSource::Path(path.clone()),
                self.options.font_size,
                self.options.msdf_range,
                self.options.atlas_width,
            )?;
            if std::fs::create_dir_all(cache_dir).is_ok()
                && let Err(e) = font.save_atlas(&atlas_path, &metrics_path)
            {
                tracing::warn!(family, "atlas cache write failed: {}", e);
            }
            return Ok(font);
        }

        Font::generate(
            FontSource::Path(path.clone()),
            self.options.font_size,
            self.options.msdf_range,
            self.options.atlas_width,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_sets_default_and_resolves_by_family() {
        let mut mgr = FontManager::new_isolated(FontManagerOptions::default());
        let font = Font::empty(32.0, 2.0, 64, 64);
        let id = mgr.install("Test Mono", font);

        assert_eq!(mgr.default_font(), Some(id));
        assert_eq!(mgr.get_or_load("Test Mono").unwrap(), id);
    }

    #[test]
    fn unknown_family_falls_back_to_default() {
        let mut mgr = FontManager::new_isolated(FontManagerOptions::default());
        let id = mgr.install("Test Mono", Font::empty(32.0, 2.0, 64, 64));

        // "Helvetica" is not installed and the isolated database is empty,
        // so resolution lands on the already-loaded default.
        assert_eq!(mgr.get_or_load("Helvetica").unwrap(), id);
    }

    #[test]
    fn empty_manager_reports_missing_family() {
        let mut mgr = FontManager::new_isolated(FontManagerOptions::default());
        match mgr.get_or_load("Helvetica") {
            Err(FontError::NoFontForFamily(f)) => assert_eq!(f, "Helvetica"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}
