//! Single-glyph MSDF rasterization.
//!
//! Outlines are loaded from a `ttf-parser` face, transformed from font units
//! into atlas pixels (Y flipped so image row 0 is the glyph top), colored
//! with the classical multi-channel edge coloring and rasterized with
//! `fdsm`. The caller owns packing and atlas writes.

use fdsm::bezier::scanline::FillRule;
use fdsm::generate::generate_msdf;
use fdsm::render::correct_sign_msdf;
use fdsm::shape::Shape;
use fdsm::transform::Transform;
use image::RgbImage;
use nalgebra::{Affine2, Matrix3};
use ttf_parser::Face;

/// Measured outline of one glyph, in font units.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GlyphOutline {
    pub glyph_id: ttf_parser::GlyphId,
    /// Tight outline bounds: left, bottom, right, top.
    pub bounds: (f64, f64, f64, f64),
    /// Horizontal advance in font units.
    pub advance: f64,
    /// Whether the glyph has drawable contours (space does not).
    pub has_outline: bool,
}

/// Look up and measure a glyph. `None` when the face has no mapping for the
/// codepoint.
pub(crate) fn measure_glyph(face: &Face, codepoint: u32) -> Option<GlyphOutline> {
    let ch = char::from_u32(codepoint)?;
    let glyph_id = face.glyph_index(ch)?;
    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0) as f64;

    match face.glyph_bounding_box(glyph_id) {
        Some(bbox) => Some(GlyphOutline {
            glyph_id,
            bounds: (
                bbox.x_min as f64,
                bbox.y_min as f64,
                bbox.x_max as f64,
                bbox.y_max as f64,
            ),
            advance,
            has_outline: true,
        }),
        None => Some(GlyphOutline {
            glyph_id,
            bounds: (0.0, 0.0, 0.0, 0.0),
            advance,
            has_outline: false,
        }),
    }
}

/// Atlas box for an outline at the given scale: `ceil(size * scale)` plus
/// `padding` on every side.
pub(crate) fn atlas_box(outline: &GlyphOutline, scale: f64, padding: u32) -> (u32, u32) {
    if !outline.has_outline {
        return (0, 0);
    }
    let (l, b, r, t) = outline.bounds;
    let w = ((r - l) * scale).ceil() as u32 + padding * 2;
    let h = ((t - b) * scale).ceil() as u32 + padding * 2;
    (w, h)
}

/// Rasterize a glyph into a `width`x`height` MSDF image.
///
/// The transform places the outline's left/top corner `padding` pixels from
/// the image edge and bakes in the font-space-Y-up to image-space-Y-down
/// flip, so rows come out top-first.
pub(crate) fn rasterize_msdf(
    face: &Face,
    outline: &GlyphOutline,
    scale: f64,
    range: f64,
    width: u32,
    height: u32,
) -> RgbImage {
    let padding = range.ceil();
    let (l, _b, _r, t) = outline.bounds;

    let mut shape: Shape<_> =
        fdsm_ttf_parser::load_shape_from_face(face, outline.glyph_id).unwrap_or_default();
    let transform = Affine2::from_matrix_unchecked(Matrix3::new(
        scale,
        0.0,
        padding - l * scale,
        0.0,
        -scale,
        padding + t * scale,
        0.0,
        0.0,
        1.0,
    ));
    shape.transform(&transform);

    let colored = Shape::edge_coloring_simple(shape, 0.03, 0);
    let prepared = colored.prepare();

    let mut msdf = RgbImage::new(width, height);
    generate_msdf(&prepared, range, &mut msdf);
    correct_sign_msdf(&mut msdf, &prepared, FillRule::Nonzero);
    msdf
}

/// Copy an MSDF image into the RGBA8 atlas bitmap at the given origin.
/// Alpha is forced opaque; pixels outside the atlas are dropped.
pub(crate) fn blit_into_atlas(
    msdf: &RgbImage,
    atlas: &mut [u8],
    atlas_width: u32,
    atlas_height: u32,
    origin_x: u32,
    origin_y: u32,
) {
    let (w, h) = msdf.dimensions();
    let src = msdf.as_raw();
    for y in 0..h {
        let ay = origin_y + y;
        if ay >= atlas_height {
            break;
        }
        for x in 0..w {
            let ax = origin_x + x;
            if ax >= atlas_width {
                break;
            }
            let s = ((y * w + x) * 3) as usize;
            let d = ((ay * atlas_width + ax) * 4) as usize;
            atlas[d] = src[s];
            atlas[d + 1] = src[s + 1];
            atlas[d + 2] = src[s + 2];
            atlas[d + 3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atlas_box_is_zero_for_outline_less_glyphs() {
        let outline = GlyphOutline {
            glyph_id: ttf_parser::GlyphId(0),
            bounds: (0.0, 0.0, 0.0, 0.0),
            advance: 500.0,
            has_outline: false,
        };
        assert_eq!(atlas_box(&outline, 0.05, 2), (0, 0));
    }

    #[test]
    fn atlas_box_adds_padding_on_both_sides() {
        let outline = GlyphOutline {
            glyph_id: ttf_parser::GlyphId(1),
            bounds: (0.0, 0.0, 1000.0, 2000.0),
            advance: 1000.0,
            has_outline: true,
        };
        // scale 0.016 -> 16x32 plus 2*2 padding
        assert_eq!(atlas_box(&outline, 0.016, 2), (20, 36));
    }

    #[test]
    fn blit_clips_at_atlas_edges() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        let mut atlas = vec![0u8; 8 * 8 * 4];
        blit_into_atlas(&img, &mut atlas, 8, 8, 6, 6);
        // (6,6) written, (8,8) clipped
        let idx = (6 * 8 + 6) * 4;
        assert_eq!(&atlas[idx..idx + 4], &[10, 20, 30, 255]);
        // only rows 6..8 and cols 6..8 touched
        let outside = (5 * 8 + 5) * 4;
        assert_eq!(&atlas[outside..outside + 4], &[0, 0, 0, 0]);
    }
}
