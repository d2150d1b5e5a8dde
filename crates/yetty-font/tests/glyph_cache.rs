//! Glyph cache invariants exercised through the public API.

use glam::Vec2;
use yetty_font::{Font, GlyphMetrics, Style};

fn metrics(px: f32) -> GlyphMetrics {
    GlyphMetrics {
        uv_min: Vec2::new(px / 256.0, 0.0),
        uv_max: Vec2::new((px + 16.0) / 256.0, 32.0 / 256.0),
        size: Vec2::new(16.0, 32.0),
        bearing: Vec2::new(-2.0, 30.0),
        advance: 18.0,
    }
}

#[test]
fn inserted_glyphs_resolve_by_index_and_metrics() {
    let mut font = Font::empty(32.0, 2.0, 256, 256);
    let a = font.insert_glyph('A' as u32, Style::Regular, metrics(0.0));
    let b = font.insert_glyph('B' as u32, Style::Regular, metrics(20.0));
    let a_bold = font.insert_glyph('A' as u32, Style::Bold, metrics(40.0));

    // Indices are distinct, non-zero and stable
    assert_ne!(a, 0);
    assert_ne!(a, b);
    assert_ne!(a, a_bold);

    assert_eq!(font.glyph_index('A' as u32, Style::Regular), a);
    assert_eq!(font.glyph_index('B' as u32, Style::Regular), b);
    assert_eq!(font.glyph_index('A' as u32, Style::Bold), a_bold);
    // Italic falls back to the regular entry
    assert_eq!(font.glyph_index('A' as u32, Style::Italic), a);

    // Metrics lookups agree with what was inserted
    let m = font.glyph_exact('A' as u32, Style::Bold).unwrap();
    assert_eq!(m.advance, 18.0);
    assert_eq!(m.uv_min, Vec2::new(40.0 / 256.0, 0.0));
}

#[test]
fn save_load_preserves_key_sets_and_values() {
    let dir = tempfile::tempdir().unwrap();
    let atlas = dir.path().join("cache.atlas");
    let sidecar = dir.path().join("cache.json");

    let mut font = Font::empty(32.0, 2.0, 128, 128);
    for (i, ch) in "abcXYZ".chars().enumerate() {
        font.insert_glyph(ch as u32, Style::Regular, metrics(i as f32));
    }
    font.insert_glyph('X' as u32, Style::BoldItalic, metrics(99.0));
    font.save_atlas(&atlas, &sidecar).unwrap();

    let loaded = Font::load_atlas(&atlas, &sidecar).unwrap();
    assert_eq!(loaded.font_size(), 32.0);
    assert_eq!(loaded.pixel_range(), 2.0);
    assert_eq!(loaded.atlas_size(), (128, 128));

    for ch in "abcXYZ".chars() {
        let orig = font.glyph_exact(ch as u32, Style::Regular).unwrap();
        let round = loaded.glyph_exact(ch as u32, Style::Regular).unwrap();
        assert_eq!(orig, round, "metrics for '{}' survived the round trip", ch);
    }
    let bold_italic = loaded.glyph_exact('X' as u32, Style::BoldItalic).unwrap();
    assert_eq!(bold_italic.uv_min, Vec2::new(99.0 / 256.0, 0.0));
}

#[test]
fn glyph_count_includes_the_sentinel() {
    let mut font = Font::empty(32.0, 2.0, 64, 64);
    assert_eq!(font.glyph_count(), 1);
    font.insert_glyph('A' as u32, Style::Regular, metrics(0.0));
    assert_eq!(font.glyph_count(), 2);
}
