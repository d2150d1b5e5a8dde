//! The cell-grid text renderer.
//!
//! One fullscreen draw per frame: the fragment shader derives the cell from
//! its pixel position, fetches the cell's glyph index, colors and
//! attributes from four cell-sized textures, and samples the MSDF atlas (or
//! the emoji atlas) to produce coverage.
//!
//! Cell textures are recreated when the grid dimensions change; the bind
//! group is additionally recreated when the font's resource version moves.
//! `Damage::Full` re-uploads every cell texture, a rect list uploads only
//! the damaged subregions.

use crate::damage::{extract_region, Damage, DamageRect};
use crate::emoji::EmojiAtlas;
use crate::grid::Grid;
use bytemuck::{Pod, Zeroable};
use std::path::Path;
use std::sync::Arc;
use yetty_core::math::ortho_pixel;
use yetty_font::Font;
use yetty_render::{load_shader_source, GraphicsContext, GraphicsError, RenderResult};

/// Cursor state passed into [`GridRenderer::render`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Cursor {
    pub col: i32,
    pub row: i32,
    pub visible: bool,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Uniforms {
    projection: [[f32; 4]; 4],
    screen_size: [f32; 2],
    cell_size: [f32; 2],
    grid_size: [f32; 2],
    cursor_pos: [f32; 2],
    pixel_range: f32,
    scale: f32,
    baseline: f32,
    cursor_visible: f32,
}

struct CellTextures {
    glyph: wgpu::Texture,
    glyph_view: wgpu::TextureView,
    fg: wgpu::Texture,
    fg_view: wgpu::TextureView,
    bg: wgpu::Texture,
    bg_view: wgpu::TextureView,
    attrs: wgpu::Texture,
    attrs_view: wgpu::TextureView,
    cols: u32,
    rows: u32,
}

/// Renders the terminal grid with a single fullscreen draw.
///
/// # Example
///
/// ```ignore
/// use yetty_grid::{Cursor, Damage, EmojiAtlas, Grid, GridRenderer};
///
/// let mut renderer = GridRenderer::new(context.clone(), surface_format, None)?;
/// renderer.resize(width, height);
/// renderer.set_cell_size(9.0, 18.0);
///
/// // Per frame:
/// renderer.render(&font, &mut emoji, &grid, &damage, cursor, &target_view)?;
/// ```
pub struct GridRenderer {
    context: Arc<GraphicsContext>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    quad_vertex_buffer: wgpu::Buffer,
    cells: Option<CellTextures>,
    bind_group: Option<wgpu::BindGroup>,
    font_version: u64,
    screen_size: (u32, u32),
    cell_size: (f32, f32),
    clear_color: wgpu::Color,
}

impl GridRenderer {
    /// Create the renderer for the given target format. `shader_override`
    /// replaces the built-in WGSL when set.
    pub fn new(
        context: Arc<GraphicsContext>,
        target_format: wgpu::TextureFormat,
        shader_override: Option<&Path>,
    ) -> RenderResult<Self> {
        let source = load_shader_source(
            shader_override,
            include_str!("shaders/terminal_grid.wgsl"),
        )?;
        let device = context.device();
        let shader = context.create_shader_module("terminal grid", &source);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grid uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Fullscreen quad, two triangles
        #[rustfmt::skip]
        let quad: [f32; 12] = [
            -1.0, -1.0,
             1.0, -1.0,
            -1.0,  1.0,
            -1.0,  1.0,
             1.0, -1.0,
             1.0,  1.0,
        ];
        use wgpu::util::DeviceExt;
        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grid quad"),
            contents: bytemuck::cast_slice(&quad),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let bind_group_layout = Self::create_bind_group_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grid pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("grid pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 8,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            context,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            quad_vertex_buffer,
            cells: None,
            bind_group: None,
            font_version: u64::MAX,
            screen_size: (0, 0),
            cell_size: (9.0, 18.0),
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.1,
                a: 1.0,
            },
        })
    }

    fn create_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let uniform = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let float_texture = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let uint_texture = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Uint,
            },
            count: None,
        };
        let sampler = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let storage = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grid bind group layout"),
            entries: &[
                uniform(0),
                float_texture(1), // font atlas
                sampler(2),       // font sampler
                storage(3),       // glyph metadata
                uint_texture(4),  // cell glyph indices
                float_texture(5), // cell fg
                float_texture(6), // cell bg
                uint_texture(7),  // cell attrs
                float_texture(8), // emoji atlas
                sampler(9),       // emoji sampler
                storage(10),      // emoji metadata
            ],
        })
    }

    /// Update the screen size in pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.screen_size = (width, height);
    }

    /// Update the cell size in pixels.
    pub fn set_cell_size(&mut self, width: f32, height: f32) {
        self.cell_size = (width, height);
    }

    pub fn cell_size(&self) -> (f32, f32) {
        self.cell_size
    }

    /// Render the grid into `target`.
    pub fn render(
        &mut self,
        font: &Font,
        emoji: &mut EmojiAtlas,
        grid: &Grid,
        damage: &Damage,
        cursor: Cursor,
        target: &wgpu::TextureView,
    ) -> RenderResult<()> {
        let (cols, rows) = (grid.cols(), grid.rows());
        if cols == 0 || rows == 0 {
            return Ok(());
        }
        let device = self.context.device();
        let queue = self.context.queue();

        emoji.ensure_gpu(device, queue);

        let needs_textures = self
            .cells
            .as_ref()
            .is_none_or(|c| c.cols != cols || c.rows != rows);
        if needs_textures {
            tracing::info!(cols, rows, "creating cell textures");
            self.cells = Some(Self::create_cell_textures(device, cols, rows));
            self.upload_full(grid);
            self.bind_group = None;
        } else if self.font_version != font.resource_version() {
            self.bind_group = None;
        }

        if !needs_textures {
            match damage {
                Damage::Full => self.upload_full(grid),
                Damage::Rects(rects) => {
                    for rect in rects {
                        self.upload_region(grid, rect);
                    }
                }
            }
        }

        if self.bind_group.is_none() {
            self.bind_group = Some(self.create_bind_group(font, emoji)?);
            self.font_version = font.resource_version();
        }

        let scale = self.cell_size.1 / font.line_height().max(1.0);
        let uniforms = Uniforms {
            projection: ortho_pixel(self.screen_size.0 as f32, self.screen_size.1 as f32)
                .to_cols_array_2d(),
            screen_size: [self.screen_size.0 as f32, self.screen_size.1 as f32],
            cell_size: [self.cell_size.0, self.cell_size.1],
            grid_size: [cols as f32, rows as f32],
            cursor_pos: [cursor.col as f32, cursor.row as f32],
            pixel_range: font.pixel_range(),
            scale,
            baseline: font.ascent() * scale,
            cursor_visible: if cursor.visible { 1.0 } else { 0.0 },
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("grid encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("grid pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, self.bind_group.as_ref().unwrap(), &[]);
            pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
            pass.draw(0..6, 0..1);
        }
        queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn create_cell_textures(device: &wgpu::Device, cols: u32, rows: u32) -> CellTextures {
        let make = |label: &str, format: wgpu::TextureFormat| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: cols,
                    height: rows,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        };
        let (glyph, glyph_view) = make("cell glyphs", wgpu::TextureFormat::R16Uint);
        let (fg, fg_view) = make("cell fg colors", wgpu::TextureFormat::Rgba8Unorm);
        let (bg, bg_view) = make("cell bg colors", wgpu::TextureFormat::Rgba8Unorm);
        let (attrs, attrs_view) = make("cell attrs", wgpu::TextureFormat::R8Uint);
        CellTextures {
            glyph,
            glyph_view,
            fg,
            fg_view,
            bg,
            bg_view,
            attrs,
            attrs_view,
            cols,
            rows,
        }
    }

    fn create_bind_group(
        &self,
        font: &Font,
        emoji: &EmojiAtlas,
    ) -> RenderResult<wgpu::BindGroup> {
        let cells = self
            .cells
            .as_ref()
            .ok_or_else(|| GraphicsError::ResourceUnavailable("cell textures".into()))?;
        let font_view = font
            .texture_view()
            .ok_or_else(|| GraphicsError::ResourceUnavailable("font atlas texture".into()))?;
        let font_sampler = font
            .sampler()
            .ok_or_else(|| GraphicsError::ResourceUnavailable("font sampler".into()))?;
        let metadata = font
            .metadata_buffer()
            .ok_or_else(|| GraphicsError::ResourceUnavailable("glyph metadata buffer".into()))?;
        let emoji_view = emoji
            .texture_view()
            .ok_or_else(|| GraphicsError::ResourceUnavailable("emoji atlas texture".into()))?;
        let emoji_sampler = emoji
            .sampler()
            .ok_or_else(|| GraphicsError::ResourceUnavailable("emoji sampler".into()))?;
        let emoji_metadata = emoji
            .metadata_buffer()
            .ok_or_else(|| GraphicsError::ResourceUnavailable("emoji metadata buffer".into()))?;

        Ok(self
            .context
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("grid bind group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(font_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(font_sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: metadata.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(&cells.glyph_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::TextureView(&cells.fg_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::TextureView(&cells.bg_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: wgpu::BindingResource::TextureView(&cells.attrs_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 8,
                        resource: wgpu::BindingResource::TextureView(emoji_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 9,
                        resource: wgpu::BindingResource::Sampler(emoji_sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 10,
                        resource: emoji_metadata.as_entire_binding(),
                    },
                ],
            }))
    }

    fn upload_full(&self, grid: &Grid) {
        let Some(cells) = self.cells.as_ref() else {
            return;
        };
        let queue = self.context.queue();
        let (cols, rows) = (grid.cols(), grid.rows());
        let extent = wgpu::Extent3d {
            width: cols,
            height: rows,
            depth_or_array_layers: 1,
        };
        let write = |texture: &wgpu::Texture, data: &[u8], bytes_per_texel: u32| {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(cols * bytes_per_texel),
                    rows_per_image: Some(rows),
                },
                extent,
            );
        };
        write(&cells.glyph, bytemuck::cast_slice(grid.glyph_data()), 2);
        write(&cells.fg, grid.fg_data(), 4);
        write(&cells.bg, grid.bg_data(), 4);
        write(&cells.attrs, grid.attrs_data(), 1);
    }

    fn upload_region(&self, grid: &Grid, rect: &DamageRect) {
        let Some(cells) = self.cells.as_ref() else {
            return;
        };
        let mut rect = *rect;
        rect.end_col = rect.end_col.min(grid.cols());
        rect.end_row = rect.end_row.min(grid.rows());
        if rect.is_empty() {
            return;
        }

        let queue = self.context.queue();
        let (w, h) = (rect.width(), rect.height());
        let extent = wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        };
        let origin = wgpu::Origin3d {
            x: rect.start_col,
            y: rect.start_row,
            z: 0,
        };
        let write = |texture: &wgpu::Texture, data: &[u8], bytes_per_texel: u32| {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(w * bytes_per_texel),
                    rows_per_image: Some(h),
                },
                extent,
            );
        };

        let glyphs = extract_region(grid.glyph_data(), grid.cols(), &rect, 1);
        write(&cells.glyph, bytemuck::cast_slice(&glyphs), 2);
        let fg = extract_region(grid.fg_data(), grid.cols(), &rect, 4);
        write(&cells.fg, &fg, 4);
        let bg = extract_region(grid.bg_data(), grid.cols(), &rect, 4);
        write(&cells.bg, &bg, 4);
        let attrs = extract_region(grid.attrs_data(), grid.cols(), &rect, 1);
        write(&cells.attrs, &attrs, 1);
    }
}
