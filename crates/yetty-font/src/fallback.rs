//! System font discovery for fallback glyph loading.
//!
//! When the primary font misses a codepoint, the system font database is
//! queried for scalable outline faces that contain it. Color-bitmap emoji
//! families are excluded; they have no outlines to rasterize into the MSDF
//! atlas.

use std::path::PathBuf;
use ttf_parser::Face;

/// Maximum number of candidate fonts returned per codepoint.
const MAX_CANDIDATES: usize = 10;

/// Families that never contribute MSDF-capable outlines.
fn is_excluded_family(family: &str) -> bool {
    family.contains("Color") || family.contains("Emoji")
}

/// Find system fonts containing `codepoint`, best candidates first.
///
/// Returns `(path, face_index)` pairs for file-backed faces only.
pub(crate) fn find_fonts_for_codepoint(
    db: &fontdb::Database,
    codepoint: u32,
) -> Vec<(PathBuf, u32)> {
    let Some(ch) = char::from_u32(codepoint) else {
        return Vec::new();
    };

    let mut found: Vec<(PathBuf, u32)> = Vec::new();
    for info in db.faces() {
        if found.len() >= MAX_CANDIDATES {
            break;
        }
        if info
            .families
            .iter()
            .any(|(family, _)| is_excluded_family(family))
        {
            continue;
        }
        let fontdb::Source::File(ref path) = info.source else {
            continue;
        };
        if found.iter().any(|(p, _)| p == path) {
            continue;
        }

        let has_outline = db
            .with_face_data(info.id, |data, face_index| {
                let Ok(face) = Face::parse(data, face_index) else {
                    return false;
                };
                match face.glyph_index(ch) {
                    // A glyph without a bounding box has no outline
                    // (color-bitmap strikes, blank glyphs)
                    Some(gid) => face.glyph_bounding_box(gid).is_some(),
                    None => false,
                }
            })
            .unwrap_or(false);

        if has_outline {
            found.push((path.clone(), info.index));
        }
    }

    tracing::debug!(
        candidates = found.len(),
        "fallback font search for U+{:04X}",
        codepoint
    );
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluded_families() {
        assert!(is_excluded_family("Noto Color Emoji"));
        assert!(is_excluded_family("Apple Color Emoji"));
        assert!(!is_excluded_family("DejaVu Sans"));
    }

    #[test]
    fn empty_database_finds_nothing() {
        let db = fontdb::Database::new();
        assert!(find_fonts_for_codepoint(&db, 'A' as u32).is_empty());
    }
}
