//! Atlas persistence.
//!
//! Two on-disk formats, selected by file extension:
//! - `.png`: the atlas bitmap as a standard PNG.
//! - anything else: the LZ4 dump, a little-endian header
//!   `{magic, width, height, uncompressed, compressed}` followed by the
//!   LZ4-compressed row-major RGBA8 bitmap.
//!
//! Metrics travel in a JSON sidecar with the four per-style glyph maps
//! keyed by decimal codepoint.

use crate::error::{FontError, FontResult};
use crate::font::{Font, GlyphMetrics, Style};
use crate::packer::ShelfPacker;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// `"LZ4"` tag in little-endian.
const ATLAS_MAGIC: u32 = 0x344A_5A4C;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricsFile {
    atlas_width: u32,
    atlas_height: u32,
    font_size: f32,
    line_height: f32,
    pixel_range: f32,
    glyphs: BTreeMap<String, GlyphEntry>,
    bold_glyphs: BTreeMap<String, GlyphEntry>,
    italic_glyphs: BTreeMap<String, GlyphEntry>,
    bold_italic_glyphs: BTreeMap<String, GlyphEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GlyphEntry {
    uv_min: [f32; 2],
    uv_max: [f32; 2],
    size: [f32; 2],
    bearing: [f32; 2],
    advance: f32,
}

impl From<&GlyphMetrics> for GlyphEntry {
    fn from(m: &GlyphMetrics) -> Self {
        Self {
            uv_min: m.uv_min.into(),
            uv_max: m.uv_max.into(),
            size: m.size.into(),
            bearing: m.bearing.into(),
            advance: m.advance,
        }
    }
}

impl From<&GlyphEntry> for GlyphMetrics {
    fn from(e: &GlyphEntry) -> Self {
        Self {
            uv_min: Vec2::from(e.uv_min),
            uv_max: Vec2::from(e.uv_max),
            size: Vec2::from(e.size),
            bearing: Vec2::from(e.bearing),
            advance: e.advance,
        }
    }
}

fn map_to_entries(map: &ahash::HashMap<u32, GlyphMetrics>) -> BTreeMap<String, GlyphEntry> {
    map.iter()
        .map(|(cp, m)| (cp.to_string(), GlyphEntry::from(m)))
        .collect()
}

fn entries_to_map(
    entries: &BTreeMap<String, GlyphEntry>,
) -> FontResult<ahash::HashMap<u32, GlyphMetrics>> {
    let mut map = ahash::HashMap::default();
    for (key, entry) in entries {
        let cp: u32 = key
            .parse()
            .map_err(|_| FontError::InvalidAtlasFile(format!("bad codepoint key '{}'", key)))?;
        map.insert(cp, GlyphMetrics::from(entry));
    }
    Ok(map)
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

impl Font {
    /// Save the atlas bitmap and metrics sidecar.
    pub fn save_atlas(&self, atlas_path: &Path, metrics_path: &Path) -> FontResult<()> {
        if self.atlas_data.is_empty() {
            return Err(FontError::AtlasIoError("no atlas data to save".into()));
        }

        if is_png(atlas_path) {
            image::save_buffer(
                atlas_path,
                &self.atlas_data,
                self.atlas_width,
                self.atlas_height,
                image::ColorType::Rgba8,
            )
            .map_err(|e| FontError::AtlasIoError(e.to_string()))?;
        } else {
            let compressed = lz4_flex::compress(&self.atlas_data);
            let mut out =
                Vec::with_capacity(20 + compressed.len());
            out.extend_from_slice(&ATLAS_MAGIC.to_le_bytes());
            out.extend_from_slice(&self.atlas_width.to_le_bytes());
            out.extend_from_slice(&self.atlas_height.to_le_bytes());
            out.extend_from_slice(&(self.atlas_data.len() as u32).to_le_bytes());
            out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
            out.extend_from_slice(&compressed);
            std::fs::write(atlas_path, out)?;
            tracing::debug!(
                raw = self.atlas_data.len(),
                compressed = compressed.len(),
                "atlas compressed"
            );
        }

        let metrics = MetricsFile {
            atlas_width: self.atlas_width,
            atlas_height: self.atlas_height,
            font_size: self.font_size,
            line_height: self.line_height,
            pixel_range: self.pixel_range,
            glyphs: map_to_entries(&self.variants[Style::Regular.index()]),
            bold_glyphs: map_to_entries(&self.variants[Style::Bold.index()]),
            italic_glyphs: map_to_entries(&self.variants[Style::Italic.index()]),
            bold_italic_glyphs: map_to_entries(&self.variants[Style::BoldItalic.index()]),
        };
        let json = serde_json::to_string_pretty(&metrics)
            .map_err(|e| FontError::AtlasIoError(e.to_string()))?;
        std::fs::write(metrics_path, json)?;

        tracing::info!(
            atlas = %atlas_path.display(),
            metrics = %metrics_path.display(),
            "atlas saved"
        );
        Ok(())
    }

    /// Restore a font from an atlas dump (or PNG) and its metrics sidecar.
    ///
    /// The shelf packer resumes on a fresh shelf below every stored glyph,
    /// so fallback loading keeps working without overwriting packed pixels.
    pub fn load_atlas(atlas_path: &Path, metrics_path: &Path) -> FontResult<Self> {
        let json = std::fs::read_to_string(metrics_path)?;
        let metrics: MetricsFile = serde_json::from_str(&json)
            .map_err(|e| FontError::InvalidAtlasFile(e.to_string()))?;

        let atlas_data = if is_png(atlas_path) {
            let img = image::open(atlas_path)
                .map_err(|e| FontError::AtlasIoError(e.to_string()))?
                .to_rgba8();
            if img.dimensions() != (metrics.atlas_width, metrics.atlas_height) {
                return Err(FontError::InvalidAtlasFile(format!(
                    "PNG is {}x{} but metrics say {}x{}",
                    img.width(),
                    img.height(),
                    metrics.atlas_width,
                    metrics.atlas_height
                )));
            }
            img.into_raw()
        } else {
            read_lz4_dump(atlas_path, &metrics)?
        };

        let mut font = Font::empty(
            metrics.font_size,
            metrics.pixel_range,
            metrics.atlas_width,
            metrics.atlas_height,
        );
        font.line_height = metrics.line_height;
        font.atlas_data = atlas_data;
        font.variants[Style::Regular.index()] = entries_to_map(&metrics.glyphs)?;
        font.variants[Style::Bold.index()] = entries_to_map(&metrics.bold_glyphs)?;
        font.variants[Style::Italic.index()] = entries_to_map(&metrics.italic_glyphs)?;
        font.variants[Style::BoldItalic.index()] = entries_to_map(&metrics.bold_italic_glyphs)?;
        font.build_glyph_index_map();

        // Resume packing below the lowest stored glyph row.
        let mut max_row = 0u32;
        for map in &font.variants {
            for m in map.values() {
                max_row = max_row.max((m.uv_max.y * metrics.atlas_height as f32).ceil() as u32);
            }
        }
        let mut packer = ShelfPacker::new(metrics.atlas_width, metrics.atlas_height);
        packer.restore(0, max_row + 2, 0);
        font.packer = packer;

        tracing::info!(
            atlas = %atlas_path.display(),
            glyphs = font.glyph_count(),
            "atlas loaded"
        );
        Ok(font)
    }
}

fn read_lz4_dump(path: &Path, metrics: &MetricsFile) -> FontResult<Vec<u8>> {
    let raw = std::fs::read(path)?;
    if raw.len() < 20 {
        return Err(FontError::InvalidAtlasFile("truncated header".into()));
    }
    let field = |i: usize| u32::from_le_bytes(raw[i * 4..i * 4 + 4].try_into().unwrap());
    let magic = field(0);
    if magic != ATLAS_MAGIC {
        return Err(FontError::InvalidAtlasFile(format!(
            "bad magic 0x{:08X}",
            magic
        )));
    }
    let width = field(1);
    let height = field(2);
    let uncompressed = field(3) as usize;
    let compressed = field(4) as usize;

    if width != metrics.atlas_width || height != metrics.atlas_height {
        return Err(FontError::InvalidAtlasFile(format!(
            "dump is {}x{} but metrics say {}x{}",
            width, height, metrics.atlas_width, metrics.atlas_height
        )));
    }
    if raw.len() < 20 + compressed {
        return Err(FontError::InvalidAtlasFile("truncated payload".into()));
    }
    if uncompressed != (width * height * 4) as usize {
        return Err(FontError::InvalidAtlasFile(
            "uncompressed size does not match dimensions".into(),
        ));
    }

    let data = lz4_flex::decompress(&raw[20..20 + compressed], uncompressed)
        .map_err(|e| FontError::InvalidAtlasFile(e.to_string()))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated_font() -> Font {
        let mut font = Font::empty(32.0, 2.0, 64, 64);
        // Deterministic non-trivial bitmap
        for (i, b) in font.atlas_data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        font.variants[Style::Regular.index()].insert(
            'A' as u32,
            GlyphMetrics {
                uv_min: Vec2::new(0.0, 0.0),
                uv_max: Vec2::new(0.25, 0.5),
                size: Vec2::new(16.0, 32.0),
                bearing: Vec2::new(-2.0, 30.0),
                advance: 18.0,
            },
        );
        font.variants[Style::Bold.index()].insert(
            'A' as u32,
            GlyphMetrics {
                uv_min: Vec2::new(0.25, 0.0),
                uv_max: Vec2::new(0.5, 0.5),
                size: Vec2::new(16.0, 32.0),
                bearing: Vec2::new(-2.0, 30.0),
                advance: 18.5,
            },
        );
        font.build_glyph_index_map();
        font
    }

    #[test]
    fn lz4_round_trip_preserves_bitmap_and_maps() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = dir.path().join("atlas.lz4");
        let metrics = dir.path().join("atlas.json");

        let font = populated_font();
        font.save_atlas(&atlas, &metrics).unwrap();
        let loaded = Font::load_atlas(&atlas, &metrics).unwrap();

        assert_eq!(loaded.atlas_data, font.atlas_data);
        assert_eq!(loaded.font_size(), font.font_size());
        assert_eq!(loaded.pixel_range(), font.pixel_range());
        for style in Style::ALL {
            let a: std::collections::BTreeSet<_> =
                font.variants[style.index()].keys().collect();
            let b: std::collections::BTreeSet<_> =
                loaded.variants[style.index()].keys().collect();
            assert_eq!(a, b);
        }
        let orig = font.variants[Style::Bold.index()][&('A' as u32)];
        let round = loaded.variants[Style::Bold.index()][&('A' as u32)];
        assert_eq!(orig, round);
    }

    #[test]
    fn png_round_trip_preserves_bitmap() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = dir.path().join("atlas.png");
        let metrics = dir.path().join("atlas.json");

        let font = populated_font();
        font.save_atlas(&atlas, &metrics).unwrap();
        let loaded = Font::load_atlas(&atlas, &metrics).unwrap();
        assert_eq!(loaded.atlas_data, font.atlas_data);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = dir.path().join("atlas.lz4");
        let metrics = dir.path().join("atlas.json");

        let font = populated_font();
        font.save_atlas(&atlas, &metrics).unwrap();

        let mut bytes = std::fs::read(&atlas).unwrap();
        bytes[0] ^= 0xFF;
        std::fs::write(&atlas, bytes).unwrap();

        match Font::load_atlas(&atlas, &metrics) {
            Err(FontError::InvalidAtlasFile(_)) => {}
            other => panic!("expected InvalidAtlasFile, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn loaded_font_resumes_packing_below_existing_glyphs() {
        let dir = tempfile::tempdir().unwrap();
        let atlas = dir.path().join("atlas.lz4");
        let metrics = dir.path().join("atlas.json");

        let font = populated_font();
        font.save_atlas(&atlas, &metrics).unwrap();
        let mut loaded = Font::load_atlas(&atlas, &metrics).unwrap();

        // uv_max.y = 0.5 over 64 rows -> glyphs end at row 32
        let (_, y) = loaded.packer.pack(8, 8).unwrap();
        assert!(y >= 32);
    }
}
