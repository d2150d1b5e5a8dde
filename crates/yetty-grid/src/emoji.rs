//! Color emoji atlas.
//!
//! Emoji are color bitmaps, not outlines, so they bypass the MSDF pipeline:
//! raster strikes are decoded from an emoji font and shelf-packed into a
//! plain RGBA8 atlas. Cells with the emoji attribute bit store an index
//! into this atlas' metadata table instead of an MSDF glyph index.

use ahash::{HashMap, HashMapExt};
use bytemuck::{Pod, Zeroable};
use ttf_parser::{Face, RasterImageFormat};
use wgpu::util::DeviceExt;
use yetty_font::ShelfPacker;

/// Per-emoji metadata as uploaded to the GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct EmojiMetadataGpu {
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

/// Shelf-packed atlas of color emoji bitmaps.
pub struct EmojiAtlas {
    atlas_size: u32,
    glyph_px: u32,
    bitmap: Vec<u8>,
    packer: ShelfPacker,
    map: HashMap<u32, u16>,
    metadata: Vec<EmojiMetadataGpu>,
    dirty: bool,

    texture: Option<wgpu::Texture>,
    texture_view: Option<wgpu::TextureView>,
    sampler: Option<wgpu::Sampler>,
    metadata_buffer: Option<wgpu::Buffer>,
}

impl EmojiAtlas {
    /// Create an empty atlas. `glyph_px` is the raster strike size
    /// requested from emoji fonts.
    pub fn new(glyph_px: u32, atlas_size: u32) -> Self {
        Self {
            atlas_size,
            glyph_px,
            bitmap: vec![0; (atlas_size * atlas_size * 4) as usize],
            packer: ShelfPacker::new(atlas_size, atlas_size),
            map: HashMap::new(),
            metadata: vec![EmojiMetadataGpu::default()],
            dirty: true,
            texture: None,
            texture_view: None,
            sampler: None,
            metadata_buffer: None,
        }
    }

    /// Index of a previously added emoji.
    pub fn glyph_index(&self, codepoint: u32) -> Option<u16> {
        self.map.get(&codepoint).copied()
    }

    /// Number of metadata entries (sentinel included).
    pub fn glyph_count(&self) -> u32 {
        self.metadata.len() as u32
    }

    /// Decode a raster strike from `face` and pack it. Returns the new (or
    /// existing) index, or `None` when the face has no usable image or the
    /// atlas is full.
    pub fn add_from_face(&mut self, face: &Face, codepoint: u32) -> Option<u16> {
        if let Some(&index) = self.map.get(&codepoint) {
            return Some(index);
        }
        let ch = char::from_u32(codepoint)?;
        let gid = face.glyph_index(ch)?;
        let raster = face.glyph_raster_image(gid, self.glyph_px as u16)?;
        if raster.format != RasterImageFormat::PNG {
            return None;
        }
        let decoded = image::load_from_memory(raster.data).ok()?.to_rgba8();
        let (w, h) = decoded.dimensions();

        let (x, y) = match self.packer.pack(w, h) {
            Some(origin) => origin,
            None => {
                tracing::warn!("emoji atlas full, U+{:04X} dropped", codepoint);
                return None;
            }
        };

        let src = decoded.as_raw();
        for row in 0..h {
            let dst = (((y + row) * self.atlas_size + x) * 4) as usize;
            let s = (row * w * 4) as usize;
            self.bitmap[dst..dst + (w * 4) as usize].copy_from_slice(&src[s..s + (w * 4) as usize]);
        }

        let index = self.metadata.len() as u16;
        self.metadata.push(EmojiMetadataGpu {
            uv_min: [
                x as f32 / self.atlas_size as f32,
                y as f32 / self.atlas_size as f32,
            ],
            uv_max: [
                (x + w) as f32 / self.atlas_size as f32,
                (y + h) as f32 / self.atlas_size as f32,
            ],
        });
        self.map.insert(codepoint, index);
        self.dirty = true;
        Some(index)
    }

    /// Look up an emoji index, loading the raster strike from the system
    /// emoji font on first use.
    pub fn ensure_glyph(&mut self, db: &fontdb::Database, codepoint: u32) -> Option<u16> {
        if let Some(index) = self.glyph_index(codepoint) {
            return Some(index);
        }
        let info = db.faces().find(|info| {
            info.families
                .iter()
                .any(|(family, _)| family.contains("Emoji"))
        })?;
        let id = info.id;
        db.with_face_data(id, |data, face_index| {
            let face = Face::parse(data, face_index).ok()?;
            self.add_from_face(&face, codepoint)
        })
        .flatten()
    }

    /// Load the common emoticon block from the system emoji font, if one
    /// is installed. Missing fonts just leave the atlas empty.
    pub fn load_common_emojis(&mut self, db: &fontdb::Database) {
        let Some(info) = db.faces().find(|info| {
            info.families
                .iter()
                .any(|(family, _)| family.contains("Emoji"))
        }) else {
            tracing::info!("no emoji font installed, emoji rendering disabled");
            return;
        };
        let id = info.id;
        let loaded = db.with_face_data(id, |data, face_index| {
            let Ok(face) = Face::parse(data, face_index) else {
                return 0u32;
            };
            let mut count = 0;
            for cp in 0x1F600..=0x1F64F {
                if self.add_from_face(&face, cp).is_some() {
                    count += 1;
                }
            }
            count
        });
        tracing::info!(loaded = loaded.unwrap_or(0), "common emojis packed");
    }

    /// Create or refresh the GPU resources. Always leaves a valid texture,
    /// sampler and metadata buffer behind, even for an empty atlas.
    pub fn ensure_gpu(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if !self.dirty && self.texture.is_some() {
            return;
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("emoji atlas"),
            size: wgpu::Extent3d {
                width: self.atlas_size,
                height: self.atlas_size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.bitmap,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.atlas_size * 4),
                rows_per_image: Some(self.atlas_size),
            },
            wgpu::Extent3d {
                width: self.atlas_size,
                height: self.atlas_size,
                depth_or_array_layers: 1,
            },
        );
        self.texture_view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);

        if self.sampler.is_none() {
            self.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("emoji sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }));
        }

        self.metadata_buffer = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("emoji metadata"),
            contents: bytemuck::cast_slice(&self.metadata),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        }));
        self.dirty = false;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_atlas_has_sentinel_entry() {
        let atlas = EmojiAtlas::new(64, 256);
        assert_eq!(atlas.glyph_count(), 1);
        assert_eq!(atlas.glyph_index(0x1F600), None);
    }

    #[test]
    fn load_from_empty_database_is_harmless() {
        let mut atlas = EmojiAtlas::new(64, 256);
        let db = fontdb::Database::new();
        atlas.load_common_emojis(&db);
        assert_eq!(atlas.glyph_count(), 1);
    }
}
