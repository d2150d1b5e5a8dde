//! Texture compositing for widget layers.
//!
//! Widgets that render into a private texture (vector graphics, scripted
//! plots) are composited over their cell rect by [`BlitRenderer`]. The
//! renderer draws a 6-vertex quad placed in NDC from the widget's pixel
//! rect, alpha-blending over whatever the terminal pass already produced.
//!
//! # Example
//!
//! ```ignore
//! use yetty_render::{BlitRenderer, TextureUploader};
//! use yetty_core::geometry::PixelRect;
//!
//! let texture = TextureUploader::new(&context, 256, 128, wgpu::TextureFormat::Rgba8Unorm);
//! texture.upload(&context, &pixels);
//!
//! let blit = BlitRenderer::new(context.clone(), surface_format);
//! let bind_group = blit.create_bind_group(texture.view());
//!
//! // Per frame: composite over the widget's pixel rect
//! blit.composite(&target_view, &bind_group, PixelRect::new(18.0, 54.0, 90.0, 90.0), 800.0, 600.0);
//! ```

use crate::context::GraphicsContext;
use std::sync::Arc;
use yetty_core::geometry::PixelRect;

/// Composites a texture over a pixel rectangle of the target.
///
/// One instance per widget is fine (the original image layers each owned
/// their pipeline); plugins that batch many widgets can share one and swap
/// bind groups.
///
/// # Example
///
/// ```ignore
/// let blit = BlitRenderer::new(context, target_format);
/// let bind_group = blit.create_bind_group(&texture_view);
///
/// // In the render walk:
/// blit.composite(&target, &bind_group, widget_rect, screen_w, screen_h);
/// ```
pub struct BlitRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    context: Arc<GraphicsContext>,
}

impl BlitRenderer {
    /// Create a new blit renderer targeting the given surface format.
    pub fn new(context: Arc<GraphicsContext>, target_format: wgpu::TextureFormat) -> Self {
        let device = context.device();
        let shader =
            context.create_shader_module("widget blit", include_str!("shaders/blit.wgsl"));

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("blit uniforms"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
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
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit pipeline"),
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

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            context,
        }
    }

    /// Create a bind group for a source texture.
    ///
    /// Cache the result while the texture handle is stable.
    pub fn create_bind_group(&self, texture_view: &wgpu::TextureView) -> wgpu::BindGroup {
        self.context
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("blit bind group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(texture_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            })
    }

    /// Composite a texture over `rect` (in pixels) of the target view.
    ///
    /// Opens its own load-preserving render pass so terminal content behind
    /// the widget survives.
    pub fn composite(
        &self,
        target: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
        rect: PixelRect,
        screen_width: f32,
        screen_height: f32,
    ) {
        let ndc = rect_to_ndc(rect, screen_width, screen_height);
        self.context
            .queue()
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&ndc));

        let mut encoder =
            self.context
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("blit encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit pass"),
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
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        self.context.queue().submit(Some(encoder.finish()));
    }
}

/// Convert a pixel rect to `[x, y, w, h]` in NDC with Y pointing up.
pub fn rect_to_ndc(rect: PixelRect, screen_width: f32, screen_height: f32) -> [f32; 4] {
    [
        (rect.x / screen_width) * 2.0 - 1.0,
        1.0 - (rect.y / screen_height) * 2.0,
        (rect.width / screen_width) * 2.0,
        (rect.height / screen_height) * 2.0,
    ]
}

/// A CPU-updatable 2D texture, used by widgets that re-render pixel
/// payloads (images, rasterized vector graphics, scripted plots).
///
/// # Example
///
/// ```ignore
/// let mut texture = TextureUploader::new(&context, width, height, wgpu::TextureFormat::Rgba8Unorm);
/// texture.upload(&context, &rgba_pixels);
///
/// // Widget resized: recreate at the new dimensions and re-upload
/// texture.resize(&context, new_width, new_height);
/// texture.upload(&context, &rerendered_pixels);
/// ```
pub struct TextureUploader {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl TextureUploader {
    /// Create a texture of the given size.
    pub fn new(
        context: &GraphicsContext,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self::with_usage(
            context,
            width,
            height,
            format,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )
    }

    /// Create a texture with explicit usage flags (add `RENDER_ATTACHMENT`
    /// for widgets that draw into their texture on the GPU).
    pub fn with_usage(
        context: &GraphicsContext,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = context.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("widget texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width: width.max(1),
            height: height.max(1),
            format,
        }
    }

    /// Upload pixel data covering the whole texture.
    pub fn upload(&self, context: &GraphicsContext, data: &[u8]) {
        let bytes_per_pixel = self.format.block_copy_size(None).unwrap_or(4);
        context.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * bytes_per_pixel),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Resize the texture, recreating it when dimensions change.
    pub fn resize(&mut self, context: &GraphicsContext, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        *self = Self::with_usage(context, width, height, self.format, self.texture.usage());
    }

    /// The texture view for binding.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// The underlying texture.
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Texture dimensions.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_to_ndc_maps_full_screen() {
        let ndc = rect_to_ndc(PixelRect::new(0.0, 0.0, 800.0, 600.0), 800.0, 600.0);
        assert_eq!(ndc, [-1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn rect_to_ndc_maps_center_quarter() {
        let ndc = rect_to_ndc(PixelRect::new(200.0, 150.0, 400.0, 300.0), 800.0, 600.0);
        assert_eq!(ndc, [-0.5, 0.5, 1.0, 1.0]);
    }
}
