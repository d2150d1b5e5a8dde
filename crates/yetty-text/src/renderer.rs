//! GPU rendering of laid-out rich text.
//!
//! One instanced 6-vertex draw per font batch. Instances live in per-font
//! storage buffers that grow by doubling; bind groups are cached by
//! `(FontId, resource version)` and rebuilt when the font's atlas or the
//! instance buffer is recreated. Drawing is scissored to the widget rect
//! clamped to the screen.

use crate::layout::RichText;
use ahash::{HashMap, HashMapExt};
use bytemuck::{Pod, Zeroable};
use std::path::Path;
use std::sync::Arc;
use yetty_core::geometry::PixelRect;
use yetty_font::{FontId, FontManager};
use yetty_render::{
    load_shader_source, rect_to_ndc, Color, GraphicsContext, GraphicsError, RenderResult,
};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Uniforms {
    rect: [f32; 4],
    screen_size: [f32; 2],
    scroll_offset: f32,
    pixel_range: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BgUniforms {
    rect: [f32; 4],
    color: [f32; 4],
}

struct FontBuffer {
    buffer: wgpu::Buffer,
    capacity: usize,
}

/// Renders [`RichText`] documents.
pub struct RichTextRenderer {
    context: Arc<GraphicsContext>,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    bg_pipeline: wgpu::RenderPipeline,
    bg_bind_group: wgpu::BindGroup,
    bg_uniform_buffer: wgpu::Buffer,
    instance_buffers: HashMap<FontId, FontBuffer>,
    bind_groups: HashMap<(FontId, u64), wgpu::BindGroup>,
}

impl RichTextRenderer {
    /// Create the renderer for the given target format. `shader_override`
    /// replaces the built-in WGSL when set.
    pub fn new(
        context: Arc<GraphicsContext>,
        target_format: wgpu::TextureFormat,
        shader_override: Option<&Path>,
    ) -> RenderResult<Self> {
        let source =
            load_shader_source(shader_override, include_str!("shaders/rich_text.wgsl"))?;
        let device = context.device();
        let shader = context.create_shader_module("rich text", &source);

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rich text uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("rich text bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("rich text pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("rich text pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
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

        // Background quad pipeline
        let bg_shader = context.create_shader_module(
            "rich text background",
            include_str!("shaders/rich_text_bg.wgsl"),
        );
        let bg_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rich text bg uniforms"),
            size: std::mem::size_of::<BgUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bg_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("rich text bg layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let bg_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rich text bg bind group"),
            layout: &bg_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: bg_uniform_buffer.as_entire_binding(),
            }],
        });
        let bg_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("rich text bg pipeline layout"),
            bind_group_layouts: &[&bg_layout],
            push_constant_ranges: &[],
        });
        let bg_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("rich text bg pipeline"),
            layout: Some(&bg_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &bg_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &bg_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
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
            bg_pipeline,
            bg_bind_group,
            bg_uniform_buffer,
            instance_buffers: HashMap::new(),
            bind_groups: HashMap::new(),
        })
    }

    /// Draw a laid-out document into `rect` of the target.
    ///
    /// Fonts whose GPU resources are missing are skipped with a log, per
    /// the skip-one-unit failure policy.
    pub fn render(
        &mut self,
        fonts: &FontManager,
        doc: &RichText,
        rect: PixelRect,
        screen_width: f32,
        screen_height: f32,
        background: Option<Color>,
        target: &wgpu::TextureView,
    ) -> RenderResult<()> {
        let Some(scissor) = rect.clamped_to(screen_width, screen_height) else {
            return Ok(());
        };
        let queue = self.context.queue().clone();
        let device = self.context.device().clone();

        let ndc_rect = rect_to_ndc(rect, screen_width, screen_height);
        let pixel_range = doc
            .batches()
            .iter()
            .filter_map(|b| b.font)
            .map(|id| fonts.font(id).pixel_range())
            .next()
            .unwrap_or(2.0);
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms {
                rect: ndc_rect,
                screen_size: [screen_width, screen_height],
                scroll_offset: doc.scroll_offset(),
                pixel_range,
            }),
        );
        if let Some(bg) = background {
            queue.write_buffer(
                &self.bg_uniform_buffer,
                0,
                bytemuck::bytes_of(&BgUniforms {
                    rect: ndc_rect,
                    color: [bg.r, bg.g, bg.b, bg.a],
                }),
            );
        }

        // Upload every batch before encoding; per-font buffers keep the
        // writes from trampling each other within the submission.
        let mut draws: Vec<(FontId, u32)> = Vec::new();
        for batch in doc.batches() {
            let Some(font_id) = batch.font else { continue };
            if batch.glyphs.is_empty() {
                continue;
            }
            let font = fonts.font(font_id);
            if font.texture_view().is_none() || font.sampler().is_none() {
                tracing::warn!(?font_id, "font has no GPU atlas, batch skipped");
                continue;
            }

            let needed = batch.glyphs.len();
            let grown = self.ensure_instance_capacity(font_id, needed);
            if grown {
                // Stale bind groups reference the old buffer
                self.bind_groups.retain(|(id, _), _| *id != font_id);
            }
            let buffer = &self.instance_buffers[&font_id].buffer;
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&batch.glyphs));

            let key = (font_id, font.resource_version());
            if !self.bind_groups.contains_key(&key) {
                let bind_group = self.create_bind_group(font_id, fonts)?;
                // Drop entries for older resource versions of this font
                self.bind_groups.retain(|(id, _), _| *id != font_id);
                self.bind_groups.insert(key, bind_group);
            }
            draws.push((font_id, needed as u32));
        }

        if draws.is_empty() && background.is_none() {
            return Ok(());
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("rich text encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rich text pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_scissor_rect(
                scissor.x as u32,
                scissor.y as u32,
                scissor.width as u32,
                scissor.height as u32,
            );

            if background.is_some() {
                pass.set_pipeline(&self.bg_pipeline);
                pass.set_bind_group(0, &self.bg_bind_group, &[]);
                pass.draw(0..6, 0..1);
            }

            pass.set_pipeline(&self.pipeline);
            for (font_id, count) in &draws {
                let version = fonts.font(*font_id).resource_version();
                let bind_group = &self.bind_groups[&(*font_id, version)];
                pass.set_bind_group(0, bind_group, &[]);
                pass.draw(0..6, 0..*count);
            }
        }
        queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Grow the per-font instance buffer by doubling. Returns whether the
    /// buffer was (re)created.
    fn ensure_instance_capacity(&mut self, font_id: FontId, needed: usize) -> bool {
        let instance_size = std::mem::size_of::<crate::layout::GlyphInstance>();
        let current = self.instance_buffers.get(&font_id).map(|b| b.capacity);
        if current.is_some_and(|c| c >= needed) {
            return false;
        }
        let mut capacity = current.unwrap_or(256).max(256);
        while capacity < needed {
            capacity *= 2;
        }
        tracing::debug!(?font_id, capacity, "instance buffer grown");
        let buffer = self.context.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("rich text instances"),
            size: (capacity * instance_size) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.instance_buffers
            .insert(font_id, FontBuffer { buffer, capacity });
        true
    }

    fn create_bind_group(
        &self,
        font_id: FontId,
        fonts: &FontManager,
    ) -> RenderResult<wgpu::BindGroup> {
        let font = fonts.font(font_id);
        let view = font
            .texture_view()
            .ok_or_else(|| GraphicsError::ResourceUnavailable("font atlas texture".into()))?;
        let sampler = font
            .sampler()
            .ok_or_else(|| GraphicsError::ResourceUnavailable("font sampler".into()))?;
        let instances = &self.instance_buffers[&font_id].buffer;

        Ok(self
            .context
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("rich text bind group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: instances.as_entire_binding(),
                    },
                ],
            }))
    }
}
