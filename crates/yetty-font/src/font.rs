//! MSDF font atlas and glyph cache.
//!
//! A [`Font`] owns the atlas bitmap, the shelf packer that filled it, four
//! style-keyed metric maps, and the packed metadata table addressed by the
//! 16-bit glyph indices the terminal grid stores per cell. Index 0 is the
//! empty-glyph sentinel.
//!
//! Glyphs are immutable once packed: atlas pixels backing an entry are never
//! overwritten, and growing the atlas only extends its height (existing
//! entries keep their absolute pixel positions; normalized UVs are rescaled
//! in place).
//!
//! The GPU side consists of the atlas texture, a linear clamping sampler and
//! a read-only storage buffer of [`GlyphMetadataGpu`]. A resource version
//! counter is bumped whenever those are recreated; consumers compare
//! versions to know when to rebuild bind groups.

use crate::error::{FontError, FontResult};
use crate::fallback;
use crate::msdf::{self, GlyphOutline};
use crate::packer::ShelfPacker;
use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use ttf_parser::Face;

/// Font style variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Style {
    #[default]
    Regular = 0,
    Bold = 1,
    Italic = 2,
    BoldItalic = 3,
}

impl Style {
    pub const ALL: [Style; 4] = [Style::Regular, Style::Bold, Style::Italic, Style::BoldItalic];

    /// Style from the bold/italic attribute bits.
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => Style::BoldItalic,
            (true, false) => Style::Bold,
            (false, true) => Style::Italic,
            (false, false) => Style::Regular,
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// CPU-side metrics for one packed glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphMetrics {
    /// Top-left atlas UV.
    pub uv_min: Vec2,
    /// Bottom-right atlas UV.
    pub uv_max: Vec2,
    /// Atlas box size in pixels (padding included).
    pub size: Vec2,
    /// Offset from the pen position to the glyph quad: x is the left edge
    /// offset, y the distance from the baseline up to the quad top.
    pub bearing: Vec2,
    /// Horizontal advance in pixels at the atlas' intrinsic size.
    pub advance: f32,
}

/// Packed glyph metadata as uploaded to the GPU storage buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GlyphMetadataGpu {
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
    pub size: [f32; 2],
    pub bearing: [f32; 2],
    pub advance: f32,
    pub _pad: f32,
}

impl From<&GlyphMetrics> for GlyphMetadataGpu {
    fn from(m: &GlyphMetrics) -> Self {
        Self {
            uv_min: m.uv_min.into(),
            uv_max: m.uv_max.into(),
            size: m.size.into(),
            bearing: m.bearing.into(),
            advance: m.advance,
            _pad: 0.0,
        }
    }
}

/// Where a font's bytes come from.
#[derive(Debug, Clone)]
pub enum FontSource {
    /// A file on disk. Bold/italic variants are auto-discovered from the
    /// path's naming convention.
    Path(PathBuf),
    /// In-memory font data (no variant discovery).
    Bytes(Arc<Vec<u8>>),
}

/// One glyph staged for packing during batch generation.
struct StagedGlyph {
    codepoint: u32,
    style: Style,
    scale: f64,
    outline: GlyphOutline,
    box_w: u32,
    box_h: u32,
    atlas_x: u32,
    atlas_y: u32,
    packed: bool,
}

/// An MSDF font atlas with per-style glyph maps and GPU resources.
///
/// # Example
///
/// ```ignore
/// use yetty_font::{Font, FontSource, Style};
///
/// let mut font = Font::generate(
///     FontSource::Path("/usr/share/fonts/Mono-Regular.ttf".into()),
///     32.0,   // pixel size
///     2.0,    // MSDF range
///     8192,   // atlas width
/// )?;
///
/// // Upload once a device exists
/// font.create_texture(device, queue)?;
/// font.create_glyph_metadata_buffer(device)?;
///
/// // A miss triggers fallback loading; upload the additions next frame
/// let index = font.glyph_index('\u{1F600}' as u32, Style::Regular);
/// if font.has_pending_upload() {
///     font.upload_pending(device, queue)?;
/// }
/// ```
///
/// # Resource Versions
///
/// [`resource_version`](Font::resource_version) increments whenever the
/// atlas texture or metadata buffer is recreated. Renderers snapshot the
/// version when they build a bind group and rebuild it when the snapshot
/// diverges; there is no other invalidation channel.
pub struct Font {
    pub(crate) font_size: f32,
    pub(crate) pixel_range: f32,
    pub(crate) line_height: f32,
    pub(crate) ascent: f32,
    pub(crate) atlas_width: u32,
    pub(crate) atlas_height: u32,
    pub(crate) atlas_data: Vec<u8>,
    pub(crate) packer: ShelfPacker,

    /// Metric maps indexed by [`Style`].
    pub(crate) variants: [HashMap<u32, GlyphMetrics>; 4],
    /// Codepoint to u16 index maps, parallel to `variants`.
    pub(crate) index_maps: [HashMap<u32, u16>; 4],
    /// Packed metadata table; entry 0 is the empty sentinel.
    pub(crate) metadata: Vec<GlyphMetadataGpu>,

    resource_version: u64,

    // Face bytes kept alive for fallback loading; indexed by Style.
    faces: [Option<Arc<Vec<u8>>>; 4],
    // Append-only cache of fallback faces, keyed by path.
    fallback_faces: HashMap<PathBuf, Arc<Vec<u8>>>,
    fallback_db: Option<fontdb::Database>,
    failed_codepoints: HashSet<u32>,
    pending_upload: HashSet<u32>,
    needs_texture_recreate: bool,

    texture: Option<wgpu::Texture>,
    texture_view: Option<wgpu::TextureView>,
    sampler: Option<wgpu::Sampler>,
    metadata_buffer: Option<wgpu::Buffer>,
}

impl Font {
    //-------------------------------------------------------------------------
    // Generation
    //-------------------------------------------------------------------------

    /// Generate an MSDF atlas for the font at `pixel_size`.
    ///
    /// Iterates the base charset (extended for Nerd Fonts), rasterizes every
    /// glyph the face contains, and shelf-packs the result. Outline failures
    /// skip the offending codepoint only.
    pub fn generate(
        source: FontSource,
        pixel_size: f32,
        range: f32,
        atlas_width: u32,
    ) -> FontResult<Self> {
        let (regular, variant_paths, nerd) = match &source {
            FontSource::Path(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|_| FontError::FontFileNotFound(path.clone()))?;
                let path_str = path.to_string_lossy();
                let nerd = path_str.contains("NerdFont")
                    || path_str.contains("Nerd Font")
                    || path_str.contains("nerd-font");
                (Arc::new(bytes), discover_variant_paths(path), nerd)
            }
            FontSource::Bytes(bytes) => (bytes.clone(), [None, None, None], false),
        };

        let mut faces: [Option<Arc<Vec<u8>>>; 4] = [Some(regular.clone()), None, None, None];
        for (i, variant) in variant_paths.iter().enumerate() {
            if let Some(path) = variant {
                match std::fs::read(path) {
                    Ok(bytes) => {
                        tracing::info!(variant = ?Style::ALL[i + 1], path = %path.display(), "loaded font variant");
                        faces[i + 1] = Some(Arc::new(bytes));
                    }
                    Err(e) => tracing::warn!(path = %path.display(), "variant unreadable: {}", e),
                }
            }
        }

        let mut font = Self::empty(pixel_size, range, atlas_width, 512);
        font.faces = faces;

        let regular_face = Face::parse(&regular, 0)
            .map_err(|e| FontError::InvalidFontData(e.to_string()))?;
        let units_per_em = regular_face.units_per_em() as f64;
        let scale = pixel_size as f64 / units_per_em;
        font.line_height = ((regular_face.ascender() as f64 - regular_face.descender() as f64
            + regular_face.line_gap() as f64)
            * scale) as f32;
        font.ascent = (regular_face.ascender() as f64 * scale) as f32;

        let charset = base_charset(nerd);
        tracing::info!(codepoints = charset.len(), nerd, "charset assembled");

        // Stage every glyph from every loaded variant.
        let padding = range.ceil() as u32;
        let mut staged: Vec<StagedGlyph> = Vec::new();
        for style in Style::ALL {
            let Some(bytes) = font.faces[style.index()].clone() else {
                continue;
            };
            let face = match Face::parse(&bytes, 0) {
                Ok(f) => f,
                Err(e) => {
                    tracing::warn!(?style, "unparsable variant face: {}", e);
                    continue;
                }
            };
            let variant_scale = pixel_size as f64 / face.units_per_em() as f64;
            for &cp in &charset {
                let Some(outline) = msdf::measure_glyph(&face, cp) else {
                    continue;
                };
                let (box_w, box_h) = msdf::atlas_box(&outline, variant_scale, padding);
                staged.push(StagedGlyph {
                    codepoint: cp,
                    style,
                    scale: variant_scale,
                    outline,
                    box_w,
                    box_h,
                    atlas_x: 0,
                    atlas_y: 0,
                    packed: false,
                });
            }
        }

        // Estimate the atlas height from the total glyph area with 30%
        // packing slack, rounded up to 512 rows.
        let mut total_area: u64 = 0;
        let mut max_glyph_height: u32 = 0;
        for g in &staged {
            total_area += (g.box_w as u64) * (g.box_h as u64);
            max_glyph_height = max_glyph_height.max(g.box_h);
        }
        let mut height = ((total_area * 13 / 10) / atlas_width as u64) as u32;
        height = height.max(max_glyph_height + 64);
        height = height.div_ceil(512) * 512;
        font.atlas_height = height;
        font.atlas_data = vec![0; (atlas_width * height * 4) as usize];
        font.packer = ShelfPacker::new(atlas_width, height);
        tracing::info!(
            width = atlas_width,
            height,
            glyphs = staged.len(),
            area = total_area,
            "atlas sized"
        );

        // Tallest first packs shelves tighter.
        staged.sort_by(|a, b| b.box_h.cmp(&a.box_h));
        for g in &mut staged {
            if g.box_w == 0 || g.box_h == 0 {
                g.packed = true;
                continue;
            }
            match font.packer.pack(g.box_w, g.box_h) {
                Some((x, y)) => {
                    g.atlas_x = x;
                    g.atlas_y = y;
                    g.packed = true;
                }
                None => {
                    tracing::warn!("atlas full, glyph U+{:04X} skipped", g.codepoint);
                }
            }
        }

        // Rasterize, one face parse per style.
        for style in Style::ALL {
            let Some(bytes) = font.faces[style.index()].clone() else {
                continue;
            };
            let Ok(face) = Face::parse(&bytes, 0) else {
                continue;
            };
            for g in staged.iter().filter(|g| g.style == style && g.packed) {
                if g.outline.has_outline {
                    let img = msdf::rasterize_msdf(
                        &face,
                        &g.outline,
                        g.scale,
                        range as f64,
                        g.box_w,
                        g.box_h,
                    );
                    msdf::blit_into_atlas(
                        &img,
                        &mut font.atlas_data,
                        font.atlas_width,
                        font.atlas_height,
                        g.atlas_x,
                        g.atlas_y,
                    );
                }
                let metrics = font.make_metrics(g, padding);
                font.variants[style.index()].insert(g.codepoint, metrics);
            }
        }

        font.build_glyph_index_map();
        tracing::info!(
            regular = font.variants[0].len(),
            bold = font.variants[1].len(),
            italic = font.variants[2].len(),
            bold_italic = font.variants[3].len(),
            "atlas generated"
        );
        Ok(font)
    }

    fn make_metrics(&self, g: &StagedGlyph, padding: u32) -> GlyphMetrics {
        let (l, _b, _r, t) = g.outline.bounds;
        let (uv_min, uv_max) = if g.box_w > 0 && g.box_h > 0 {
            (
                Vec2::new(
                    g.atlas_x as f32 / self.atlas_width as f32,
                    g.atlas_y as f32 / self.atlas_height as f32,
                ),
                Vec2::new(
                    (g.atlas_x + g.box_w) as f32 / self.atlas_width as f32,
                    (g.atlas_y + g.box_h) as f32 / self.atlas_height as f32,
                ),
            )
        } else {
            (Vec2::ZERO, Vec2::ZERO)
        };
        GlyphMetrics {
            uv_min,
            uv_max,
            size: Vec2::new(g.box_w as f32, g.box_h as f32),
            bearing: Vec2::new(
                (l * g.scale - padding as f64) as f32,
                (t * g.scale + padding as f64) as f32,
            ),
            advance: (g.outline.advance * g.scale) as f32,
        }
    }

    /// Construct an empty font shell with a blank atlas. Atlas restoration
    /// and callers that pack glyphs themselves fill it in afterwards.
    pub fn empty(pixel_size: f32, range: f32, atlas_width: u32, atlas_height: u32) -> Self {
        Self {
            font_size: pixel_size,
            pixel_range: range,
            line_height: pixel_size * 1.2,
            ascent: pixel_size * 0.8,
            atlas_width,
            atlas_height,
            atlas_data: vec![0; (atlas_width * atlas_height * 4) as usize],
            packer: ShelfPacker::new(atlas_width, atlas_height),
            variants: [
                HashMap::new(),
                HashMap::new(),
                HashMap::new(),
                HashMap::new(),
            ],
            index_maps: [
                HashMap::new(),
                HashMap::new(),
                HashMap::new(),
                HashMap::new(),
            ],
            metadata: vec![GlyphMetadataGpu::default()],
            resource_version: 0,
            faces: [None, None, None, None],
            fallback_faces: HashMap::new(),
            fallback_db: None,
            failed_codepoints: HashSet::new(),
            pending_upload: HashSet::new(),
            needs_texture_recreate: false,
            texture: None,
            texture_view: None,
            sampler: None,
            metadata_buffer: None,
        }
    }

    //-------------------------------------------------------------------------
    // Index map
    //-------------------------------------------------------------------------

    /// Rebuild the codepoint-to-index maps and the packed metadata table.
    ///
    /// Entry 0 stays the empty sentinel; variant glyphs get their own
    /// entries even when they duplicate a regular glyph's codepoint.
    pub(crate) fn build_glyph_index_map(&mut self) {
        for map in &mut self.index_maps {
            map.clear();
        }
        self.metadata.clear();
        self.metadata.push(GlyphMetadataGpu::default());

        for style in Style::ALL {
            let mut codepoints: Vec<u32> =
                self.variants[style.index()].keys().copied().collect();
            codepoints.sort_unstable();
            for cp in codepoints {
                let index = self.metadata.len() as u16;
                self.index_maps[style.index()].insert(cp, index);
                let metrics = &self.variants[style.index()][&cp];
                self.metadata.push(metrics.into());
            }
        }

        tracing::debug!(entries = self.metadata.len(), "glyph index map rebuilt");
    }

    /// Look up the 16-bit glyph index for a codepoint and style.
    ///
    /// Falls back from the variant map to Regular, then attempts a fallback
    /// font load, then `'?'`, then the empty sentinel.
    pub fn glyph_index(&mut self, codepoint: u32, style: Style) -> u16 {
        if style != Style::Regular
            && let Some(&index) = self.index_maps[style.index()].get(&codepoint)
        {
            return index;
        }
        if let Some(&index) = self.index_maps[Style::Regular.index()].get(&codepoint) {
            return index;
        }

        if self.load_missing_glyph(codepoint)
            && let Some(&index) = self.index_maps[Style::Regular.index()].get(&codepoint)
        {
            return index;
        }

        self.index_maps[Style::Regular.index()]
            .get(&('?' as u32))
            .copied()
            .unwrap_or(0)
    }

    /// Look up metrics without triggering fallback loading. Substitutes
    /// `'?'` when the codepoint is unknown.
    pub fn glyph(&self, codepoint: u32, style: Style) -> Option<&GlyphMetrics> {
        if style != Style::Regular
            && let Some(m) = self.variants[style.index()].get(&codepoint)
        {
            return Some(m);
        }
        self.variants[Style::Regular.index()]
            .get(&codepoint)
            .or_else(|| self.variants[Style::Regular.index()].get(&('?' as u32)))
    }

    /// Metrics lookup with no `'?'` substitution (RichText wants to skip).
    pub fn glyph_exact(&self, codepoint: u32, style: Style) -> Option<&GlyphMetrics> {
        if style != Style::Regular
            && let Some(m) = self.variants[style.index()].get(&codepoint)
        {
            return Some(m);
        }
        self.variants[Style::Regular.index()].get(&codepoint)
    }

    /// Insert externally computed metrics for a glyph, appending it to the
    /// packed table. Used by callers that fill atlases themselves (and by
    /// tests); batch generation goes through [`Font::generate`].
    pub fn insert_glyph(&mut self, codepoint: u32, style: Style, metrics: GlyphMetrics) -> u16 {
        self.variants[style.index()].insert(codepoint, metrics);
        let index = self.metadata.len() as u16;
        self.index_maps[style.index()].insert(codepoint, index);
        self.metadata.push((&metrics).into());
        self.pending_upload.insert(codepoint);
        index
    }

    //-------------------------------------------------------------------------
    // Fallback loading
    //-------------------------------------------------------------------------

    /// Try to load a missing glyph from a system fallback font into the
    /// existing atlas. Failed codepoints are remembered and never retried.
    pub fn load_missing_glyph(&mut self, codepoint: u32) -> bool {
        if self.variants[Style::Regular.index()].contains_key(&codepoint) {
            return true;
        }
        if self.failed_codepoints.contains(&codepoint) {
            return false;
        }

        if self.fallback_db.is_none() {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            tracing::info!(faces = db.len(), "system font database loaded");
            self.fallback_db = Some(db);
        }

        let candidates =
            fallback::find_fonts_for_codepoint(self.fallback_db.as_ref().unwrap(), codepoint);
        if candidates.is_empty() {
            self.failed_codepoints.insert(codepoint);
            return false;
        }

        for (path, face_index) in candidates {
            match self.load_glyph_from_font(&path, face_index, codepoint) {
                Ok(()) => {
                    tracing::debug!(
                        path = %path.display(),
                        "fallback glyph U+{:04X} loaded",
                        codepoint
                    );
                    return true;
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), "fallback candidate failed: {}", e);
                }
            }
        }

        self.failed_codepoints.insert(codepoint);
        false
    }

    fn load_glyph_from_font(
        &mut self,
        path: &Path,
        face_index: u32,
        codepoint: u32,
    ) -> FontResult<()> {
        let bytes = match self.fallback_faces.get(path) {
            Some(bytes) => bytes.clone(),
            None => {
                let bytes = Arc::new(
                    std::fs::read(path)
                        .map_err(|_| FontError::FontFileNotFound(path.to_path_buf()))?,
                );
                self.fallback_faces.insert(path.to_path_buf(), bytes.clone());
                bytes
            }
        };

        let face = Face::parse(&bytes, face_index)
            .map_err(|e| FontError::InvalidFontData(e.to_string()))?;
        let outline = msdf::measure_glyph(&face, codepoint).ok_or(FontError::GlyphLoadFailed {
            codepoint,
            reason: "not in face".into(),
        })?;
        if !outline.has_outline {
            return Err(FontError::GlyphLoadFailed {
                codepoint,
                reason: "no outline data".into(),
            });
        }

        let mut scale = self.font_size as f64 / face.units_per_em() as f64;
        // Oversized symbol/emoji outlines are shrunk to roughly a cell:
        // half the atlas font size is the typical monospace cell height.
        let (_, b, _, t) = outline.bounds;
        let raw_height = (t - b) * scale;
        let target_height = self.font_size as f64 * 0.5;
        if raw_height > target_height && target_height > 0.0 {
            scale *= target_height / raw_height;
        }

        let padding = self.pixel_range.ceil() as u32;
        let (box_w, box_h) = msdf::atlas_box(&outline, scale, padding);

        let (atlas_x, atlas_y) = match self.packer.pack(box_w, box_h) {
            Some(origin) => origin,
            None => {
                let new_height = self.packer.grown_height_for(box_h);
                self.grow_atlas(new_height)?;
                self.packer.pack(box_w, box_h).ok_or(FontError::AtlasFull {
                    codepoint,
                    atlas_width: self.atlas_width,
                    atlas_height: self.atlas_height,
                })?
            }
        };

        let img = msdf::rasterize_msdf(
            &face,
            &outline,
            scale,
            self.pixel_range as f64,
            box_w,
            box_h,
        );
        msdf::blit_into_atlas(
            &img,
            &mut self.atlas_data,
            self.atlas_width,
            self.atlas_height,
            atlas_x,
            atlas_y,
        );

        let staged = StagedGlyph {
            codepoint,
            style: Style::Regular,
            scale,
            outline,
            box_w,
            box_h,
            atlas_x,
            atlas_y,
            packed: true,
        };
        let metrics = self.make_metrics(&staged, padding);
        self.variants[Style::Regular.index()].insert(codepoint, metrics);

        // Append to the packed table without disturbing existing indices.
        let index = self.metadata.len() as u16;
        self.index_maps[Style::Regular.index()].insert(codepoint, index);
        self.metadata.push((&metrics).into());
        self.pending_upload.insert(codepoint);
        Ok(())
    }

    /// Grow the atlas to `new_height` rows, extending the CPU bitmap and
    /// rescaling every stored UV so existing entries stay valid.
    fn grow_atlas(&mut self, new_height: u32) -> FontResult<()> {
        let old_height = self.atlas_height;
        if new_height <= old_height {
            return Ok(());
        }
        tracing::info!(old_height, new_height, "growing atlas");

        self.atlas_data
            .resize((self.atlas_width * new_height * 4) as usize, 0);
        self.atlas_height = new_height;
        self.packer.grow(new_height);

        let ratio = old_height as f32 / new_height as f32;
        for map in &mut self.variants {
            for metrics in map.values_mut() {
                metrics.uv_min.y *= ratio;
                metrics.uv_max.y *= ratio;
            }
        }
        for gpu in &mut self.metadata {
            gpu.uv_min[1] *= ratio;
            gpu.uv_max[1] *= ratio;
        }

        self.needs_texture_recreate = true;
        Ok(())
    }

    //-------------------------------------------------------------------------
    // GPU resources
    //-------------------------------------------------------------------------

    /// Upload the packed metadata table as a read-only storage buffer.
    /// Bumps the resource version.
    pub fn create_glyph_metadata_buffer(&mut self, device: &wgpu::Device) -> FontResult<()> {
        use wgpu::util::DeviceExt;
        if self.metadata.is_empty() {
            return Err(FontError::GpuResourceError("empty metadata table".into()));
        }
        self.metadata_buffer = Some(device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("glyph metadata"),
                contents: bytemuck::cast_slice(&self.metadata),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            },
        ));
        self.resource_version += 1;
        tracing::debug!(
            entries = self.metadata.len(),
            version = self.resource_version,
            "glyph metadata buffer created"
        );
        Ok(())
    }

    /// Upload the atlas bitmap as an RGBA8 texture with a linear
    /// clamp-to-edge sampler.
    pub fn create_texture(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> FontResult<()> {
        if self.atlas_data.is_empty() {
            return Err(FontError::GpuResourceError("empty atlas bitmap".into()));
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("font atlas"),
            size: wgpu::Extent3d {
                width: self.atlas_width,
                height: self.atlas_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.atlas_data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.atlas_width * 4),
                rows_per_image: Some(self.atlas_height),
            },
            wgpu::Extent3d {
                width: self.atlas_width,
                height: self.atlas_height,
                depth_or_array_layers: 1,
            },
        );

        self.texture_view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);
        if self.sampler.is_none() {
            self.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("font sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }));
        }
        self.needs_texture_recreate = false;
        Ok(())
    }

    /// Upload any glyphs added since the last call.
    ///
    /// Re-uploads the atlas (recreating the texture when it grew) and
    /// recreates the metadata buffer, bumping the resource version exactly
    /// once.
    pub fn upload_pending(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> FontResult<()> {
        if self.pending_upload.is_empty() {
            return Ok(());
        }

        if self.needs_texture_recreate || self.texture.is_none() {
            self.create_texture(device, queue)?;
        } else if let Some(texture) = &self.texture {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &self.atlas_data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.atlas_width * 4),
                    rows_per_image: Some(self.atlas_height),
                },
                wgpu::Extent3d {
                    width: self.atlas_width,
                    height: self.atlas_height,
                    depth_or_array_layers: 1,
                },
            );
        }

        self.create_glyph_metadata_buffer(device)?;
        tracing::info!(glyphs = self.pending_upload.len(), "pending glyphs uploaded");
        self.pending_upload.clear();
        Ok(())
    }

    /// Whether glyphs await a GPU upload.
    pub fn has_pending_upload(&self) -> bool {
        !self.pending_upload.is_empty()
    }

    //-------------------------------------------------------------------------
    // Accessors
    //-------------------------------------------------------------------------

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Distance from the baseline to the top of the em box, in atlas pixels.
    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    pub fn pixel_range(&self) -> f32 {
        self.pixel_range
    }

    pub fn atlas_size(&self) -> (u32, u32) {
        (self.atlas_width, self.atlas_height)
    }

    /// Number of entries in the packed metadata table (sentinel included).
    pub fn glyph_count(&self) -> u32 {
        self.metadata.len() as u32
    }

    /// Monotonic counter bumped when GPU resources are recreated.
    pub fn resource_version(&self) -> u64 {
        self.resource_version
    }

    pub fn texture_view(&self) -> Option<&wgpu::TextureView> {
        self.texture_view.as_ref()
    }

    pub fn sampler(&self) -> Option<&wgpu::Sampler> {
        self.sampler.as_ref()
    }

    pub fn metadata_buffer(&self) -> Option<&wgpu::Buffer> {
        self.metadata_buffer.as_ref()
    }
}

/// Discover bold/italic/bold-italic variant files from the regular font's
/// path naming convention (`*-Regular.ttf` and friends).
fn discover_variant_paths(regular: &Path) -> [Option<PathBuf>; 3] {
    let Some(name) = regular.file_name().and_then(|n| n.to_str()) else {
        return [None, None, None];
    };
    if !name.contains("Regular") {
        return [None, None, None];
    }
    let mut out = [None, None, None];
    for (i, variant) in ["Bold", "Italic", "BoldItalic"].iter().enumerate() {
        let candidate = regular.with_file_name(name.replace("Regular", variant));
        if candidate.is_file() {
            out[i] = Some(candidate);
        }
    }
    out
}

/// The codepoints rasterized at generation time.
///
/// Non-Nerd fonts get ASCII plus the Latin Extended and General Punctuation
/// blocks; Nerd fonts add the symbol, box-drawing and icon ranges they ship.
fn base_charset(nerd: bool) -> Vec<u32> {
    let mut ranges: Vec<(u32, u32)> = vec![
        (0x0020, 0x007E), // ASCII printable
        (0x0100, 0x017F), // Latin Extended-A
        (0x0180, 0x024F), // Latin Extended-B
        (0x2000, 0x206F), // General Punctuation
    ];
    if nerd {
        ranges.extend_from_slice(&[
            (0x2190, 0x21FF),   // Arrows
            (0x2200, 0x22FF),   // Mathematical Operators
            (0x23FB, 0x23FE),   // IEC Power Symbols
            (0x2500, 0x257F),   // Box Drawing
            (0x2580, 0x259F),   // Block Elements
            (0x25A0, 0x25FF),   // Geometric Shapes
            (0x2600, 0x26FF),   // Miscellaneous Symbols
            (0x2700, 0x27BF),   // Dingbats
            (0x2800, 0x28FF),   // Braille Patterns
            (0x2B58, 0x2B58),   // IEC Power (alt)
            (0xE000, 0xE00A),   // Pomicons
            (0xE0A0, 0xE0D4),   // Powerline
            (0xE200, 0xE2A9),   // Font Awesome Extension
            (0xE300, 0xE3E3),   // Weather Icons
            (0xE5FA, 0xE6B5),   // Seti-UI + Custom
            (0xE700, 0xE7C5),   // Devicons
            (0xEA60, 0xEBEB),   // Codicons
            (0xF000, 0xF2E0),   // Font Awesome
            (0xF300, 0xF372),   // Font Logos
            (0xF400, 0xF532),   // Octicons
            (0xF0001, 0xF1AF0), // Material Design Icons
        ]);
    }
    let mut charset = Vec::new();
    for (start, end) in ranges {
        charset.extend(start..=end);
    }
    charset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_font() -> Font {
        Font::empty(32.0, 2.0, 256, 512)
    }

    fn metrics(seed: f32) -> GlyphMetrics {
        GlyphMetrics {
            uv_min: Vec2::new(seed, seed),
            uv_max: Vec2::new(seed + 0.1, seed + 0.1),
            size: Vec2::new(10.0, 12.0),
            bearing: Vec2::new(-2.0, 14.0),
            advance: 16.0 + seed,
        }
    }

    #[test]
    fn index_map_bijection_with_metadata() {
        let mut font = test_font();
        font.variants[Style::Regular.index()].insert('A' as u32, metrics(0.1));
        font.variants[Style::Regular.index()].insert('B' as u32, metrics(0.2));
        font.variants[Style::Bold.index()].insert('A' as u32, metrics(0.3));
        font.build_glyph_index_map();

        // Sentinel + 3 entries
        assert_eq!(font.metadata.len(), 4);

        for style in [Style::Regular, Style::Bold] {
            for (&cp, m) in &font.variants[style.index()] {
                let index = font.index_maps[style.index()][&cp];
                assert_ne!(index, 0);
                let gpu = &font.metadata[index as usize];
                assert_eq!(gpu.advance, m.advance);
                assert_eq!(gpu.uv_min, <[f32; 2]>::from(m.uv_min));
            }
        }
    }

    #[test]
    fn variant_lookup_falls_back_to_regular() {
        let mut font = test_font();
        font.variants[Style::Regular.index()].insert('A' as u32, metrics(0.1));
        font.build_glyph_index_map();

        let regular = font.index_maps[Style::Regular.index()][&('A' as u32)];
        assert_eq!(font.glyph_index('A' as u32, Style::Bold), regular);
        assert_eq!(font.glyph_index('A' as u32, Style::BoldItalic), regular);
    }

    #[test]
    fn unknown_codepoint_resolves_to_question_mark() {
        let mut font = test_font();
        font.variants[Style::Regular.index()].insert('?' as u32, metrics(0.4));
        font.build_glyph_index_map();
        // Mark as failed so the fallback path is not exercised in tests
        font.failed_codepoints.insert(0x10FF00);

        let question = font.index_maps[Style::Regular.index()][&('?' as u32)];
        assert_eq!(font.glyph_index(0x10FF00, Style::Regular), question);
    }

    #[test]
    fn unknown_codepoint_without_question_mark_is_sentinel() {
        let mut font = test_font();
        font.build_glyph_index_map();
        font.failed_codepoints.insert(0x10FF00);
        assert_eq!(font.glyph_index(0x10FF00, Style::Regular), 0);
    }

    #[test]
    fn grow_rescales_uvs_and_keeps_pixel_positions() {
        let mut font = test_font();
        let m = GlyphMetrics {
            uv_min: Vec2::new(0.0, 0.25),
            uv_max: Vec2::new(0.1, 0.5),
            ..metrics(0.0)
        };
        font.variants[Style::Regular.index()].insert('A' as u32, m);
        font.build_glyph_index_map();

        let old_height = font.atlas_height;
        let pixel_y_before = m.uv_min.y * old_height as f32;
        font.grow_atlas(old_height * 2).unwrap();

        let grown = font.variants[Style::Regular.index()][&('A' as u32)];
        let pixel_y_after = grown.uv_min.y * font.atlas_height as f32;
        assert!((pixel_y_before - pixel_y_after).abs() < 1e-3);
        assert_eq!(
            font.atlas_data.len(),
            (font.atlas_width * font.atlas_height * 4) as usize
        );
    }

    #[test]
    fn style_from_flags() {
        assert_eq!(Style::from_flags(false, false), Style::Regular);
        assert_eq!(Style::from_flags(true, false), Style::Bold);
        assert_eq!(Style::from_flags(false, true), Style::Italic);
        assert_eq!(Style::from_flags(true, true), Style::BoldItalic);
    }

    #[test]
    fn charset_extends_for_nerd_fonts() {
        let base = base_charset(false);
        let nerd = base_charset(true);
        assert!(base.contains(&('A' as u32)));
        assert!(!base.contains(&0x2500));
        assert!(nerd.contains(&0x2500));
        assert!(nerd.len() > base.len());
    }

    #[test]
    fn variant_discovery_requires_regular_in_name() {
        let paths = discover_variant_paths(Path::new("/tmp/SomeFont.ttf"));
        assert_eq!(paths, [None, None, None]);
    }
}
