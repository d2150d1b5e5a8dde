/// Errors that can occur in the font system.
#[derive(Debug, Clone)]
pub enum FontError {
    /// Font file could not be read.
    FontFileNotFound(std::path::PathBuf),

    /// Font data could not be parsed.
    InvalidFontData(String),

    /// A glyph outline could not be loaded.
    GlyphLoadFailed { codepoint: u32, reason: String },

    /// The atlas has no room left for a glyph.
    AtlasFull {
        codepoint: u32,
        atlas_width: u32,
        atlas_height: u32,
    },

    /// Atlas or metrics file could not be read or written.
    AtlasIoError(String),

    /// Atlas file is malformed.
    InvalidAtlasFile(String),

    /// GPU resource creation failed.
    GpuResourceError(String),

    /// No font matched the requested family.
    NoFontForFamily(String),
}

impl std::fmt::Display for FontError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontError::FontFileNotFound(path) => {
                write!(f, "Font file not found: {}", path.display())
            }
            FontError::InvalidFontData(msg) => write!(f, "Invalid font data: {}", msg),
            FontError::GlyphLoadFailed { codepoint, reason } => {
                write!(f, "Failed to load glyph U+{:04X}: {}", codepoint, reason)
            }
            FontError::AtlasFull {
                codepoint,
                atlas_width,
                atlas_height,
            } => write!(
                f,
                "Atlas full ({}x{}), cannot add glyph U+{:04X}",
                atlas_width, atlas_height, codepoint
            ),
            FontError::AtlasIoError(msg) => write!(f, "Atlas I/O error: {}", msg),
            FontError::InvalidAtlasFile(msg) => write!(f, "Invalid atlas file: {}", msg),
            FontError::GpuResourceError(msg) => write!(f, "GPU resource error: {}", msg),
            FontError::NoFontForFamily(family) => {
                write!(f, "No font found for family '{}'", family)
            }
        }
    }
}

impl std::error::Error for FontError {}

impl From<std::io::Error> for FontError {
    fn from(err: std::io::Error) -> Self {
        FontError::AtlasIoError(err.to_string())
    }
}

/// Result type for font operations.
pub type FontResult<T> = Result<T, FontError>;
