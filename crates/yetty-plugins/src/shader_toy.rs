//! Shader-toy widget: user-supplied WGSL fragment code drawn in the
//! widget rect.
//!
//! The payload must define `mainImage(fragCoord: vec2<f32>) -> vec4<f32>`;
//! it is wrapped into the plugin's vertex/fragment scaffold. Compilation
//! failures are sticky: the widget marks itself failed and never renders
//! again until it is recreated with new source.

use yetty_render::rect_to_ndc;
use yetty_widget::{FrameEnv, Plugin, Widget, WidgetError, WidgetFrame, WidgetResult};

const VERTEX_AND_PRELUDE: &str = r#"
struct Uniforms {
    time: f32,
    _pad1: f32,
    _pad2: f32,
    _pad3: f32,
    resolution: vec2<f32>,
    _pad4: vec2<f32>,
    // x, y, w, h in NDC
    rect: vec4<f32>,
}

@group(0) @binding(0) var<uniform> u: Uniforms;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2(0.0, 0.0), vec2(1.0, 0.0), vec2(1.0, 1.0),
        vec2(0.0, 0.0), vec2(1.0, 1.0), vec2(0.0, 1.0)
    );
    let corner = corners[vi];

    var out: VertexOutput;
    out.position = vec4<f32>(
        u.rect.x + corner.x * u.rect.z,
        u.rect.y - corner.y * u.rect.w,
        0.0,
        1.0
    );
    out.uv = corner;
    return out;
}
"#;

const FRAGMENT_EPILOGUE: &str = r#"
@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let fragCoord = uv * u.resolution;
    return mainImage(fragCoord);
}
"#;

/// Wrap user code into a complete shader module source.
fn wrap_user_source(user_code: &str) -> String {
    format!("{VERTEX_AND_PRELUDE}\n{user_code}\n{FRAGMENT_EPILOGUE}")
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    time: f32,
    _pad1: [f32; 3],
    resolution: [f32; 2],
    _pad2: [f32; 2],
    rect: [f32; 4],
}

/// Runs user WGSL in widget rects.
pub struct ShaderToyPlugin;

impl ShaderToyPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShaderToyPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ShaderToyPlugin {
    fn name(&self) -> &str {
        "shadertoy"
    }

    fn create_widget(&mut self, _widget_type: &str, _args: &str) -> WidgetResult<Box<dyn Widget>> {
        Ok(Box::new(ShaderToyWidget::default()))
    }
}

#[derive(Default)]
struct ShaderToyWidget {
    source: String,
    time: f64,
    compiled: Option<Compiled>,
    failed: bool,
}

struct Compiled {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
}

impl ShaderToyWidget {
    fn compile(&mut self, env: &FrameEnv) -> Result<Compiled, String> {
        let device = env.ctx.device();
        let source = wrap_user_source(&self.source);

        // Shader and pipeline validation errors surface through the error
        // scope rather than unwinding.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadertoy user shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadertoy uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadertoy bind group layout"),
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
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadertoy bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadertoy pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadertoy pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: env.target_format,
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

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(error.to_string());
        }
        Ok(Compiled {
            pipeline,
            bind_group,
            uniform_buffer,
        })
    }
}

impl Widget for ShaderToyWidget {
    fn init(&mut self, payload: &[u8]) -> WidgetResult<()> {
        if payload.is_empty() {
            return Err(WidgetError::InvalidPayload("empty shader source".into()));
        }
        self.source = String::from_utf8_lossy(payload).into_owned();
        self.time = 0.0;
        self.compiled = None;
        self.failed = false;
        Ok(())
    }

    fn dispose(&mut self) {
        self.compiled = None;
    }

    fn update(&mut self, dt: f64) {
        self.time += dt;
    }

    fn prepare_frame(&mut self, _env: &mut FrameEnv, frame: &WidgetFrame) {
        if !frame.on {
            self.compiled = None;
        }
    }

    fn render(&mut self, env: &mut FrameEnv, frame: &WidgetFrame, target: &wgpu::TextureView) {
        if self.failed {
            return;
        }
        if self.compiled.is_none() {
            match self.compile(env) {
                Ok(compiled) => self.compiled = Some(compiled),
                Err(e) => {
                    tracing::error!("shadertoy compilation failed, widget disabled: {}", e);
                    self.failed = true;
                    return;
                }
            }
        }
        let compiled = self.compiled.as_ref().unwrap();

        let uniforms = Uniforms {
            time: self.time as f32,
            _pad1: [0.0; 3],
            resolution: [frame.rect.width, frame.rect.height],
            _pad2: [0.0; 2],
            rect: rect_to_ndc(
                frame.rect,
                env.screen_width as f32,
                env.screen_height as f32,
            ),
        };
        env.ctx
            .queue()
            .write_buffer(&compiled.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder =
            env.ctx
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("shadertoy encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadertoy pass"),
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
            pass.set_pipeline(&compiled.pipeline);
            pass.set_bind_group(0, &compiled.bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        env.ctx.queue().submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_source_contains_user_code_and_entry_points() {
        let wrapped = wrap_user_source(
            "fn mainImage(fragCoord: vec2<f32>) -> vec4<f32> { return vec4(1.0); }",
        );
        assert!(wrapped.contains("fn vs_main"));
        assert!(wrapped.contains("fn fs_main"));
        assert!(wrapped.contains("fn mainImage"));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let mut w = ShaderToyWidget::default();
        assert!(w.init(b"").is_err());
    }

    #[test]
    fn reinit_clears_failure() {
        let mut w = ShaderToyWidget::default();
        w.failed = true;
        w.init(b"fn mainImage(c: vec2<f32>) -> vec4<f32> { return vec4(0.0); }")
            .unwrap();
        assert!(!w.failed);
        assert!(w.compiled.is_none());
    }
}
