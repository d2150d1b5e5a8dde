//! SDF primitive widget: a small declarative document drawn as closed-form
//! distance fields.
//!
//! The payload is a YAML-like list of primitives:
//!
//! ```text
//! - type: circle
//!   x: 120
//!   y: 90
//!   r: 40
//!   fill: "#e04040"
//!   stroke: "#202020ff"
//!   stroke_width: 2
//! - type: box
//!   x: 60
//!   y: 40
//!   w: 80
//!   h: 30
//!   round: 6
//!   rotate: 15
//!   fill: "#4060e0"
//! ```
//!
//! At most [`MAX_PRIMITIVES`] entries are drawn; excess entries are
//! dropped with a log.

use bytemuck::{Pod, Zeroable};
use yetty_render::rect_to_ndc;
use yetty_widget::{FrameEnv, Plugin, Widget, WidgetError, WidgetFrame, WidgetResult};

/// Upper bound on primitives per widget (sizes the storage buffer).
pub const MAX_PRIMITIVES: usize = 256;

/// GPU layout of one primitive; must match the WGSL `Primitive` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PrimitiveGpu {
    ptype: u32,
    params: [f32; 15],
    fill: [f32; 4],
    stroke: [f32; 4],
    stroke_width: f32,
    round: f32,
    rotate: f32,
    _pad: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Uniforms {
    rect: [f32; 4],
    resolution: [f32; 2],
    num_primitives: f32,
    time: f32,
}

const TYPE_NAMES: &[(&str, u32)] = &[
    ("circle", 0),
    ("box", 1),
    ("segment", 2),
    ("triangle", 3),
    ("bezier", 4),
    ("arc", 5),
    ("ellipse", 6),
    ("cubic_bezier", 7),
    ("ellipse_arc", 8),
];

/// Parse a `#rrggbb` or `#rrggbbaa` color.
fn parse_color(value: &str) -> Option<[f32; 4]> {
    let hex = value.trim().trim_matches('"').strip_prefix('#')?;
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some([
            byte(0)? as f32 / 255.0,
            byte(2)? as f32 / 255.0,
            byte(4)? as f32 / 255.0,
            1.0,
        ]),
        8 => Some([
            byte(0)? as f32 / 255.0,
            byte(2)? as f32 / 255.0,
            byte(4)? as f32 / 255.0,
            byte(6)? as f32 / 255.0,
        ]),
        _ => None,
    }
}

/// Parse the declarative document into GPU primitives.
///
/// Unknown keys and malformed values skip that line; unknown types skip
/// the whole entry.
pub fn parse_primitives(source: &str) -> Vec<PrimitiveGpu> {
    let mut out: Vec<PrimitiveGpu> = Vec::new();
    let mut current: Option<PrimitiveGpu> = None;
    let mut dropped = 0usize;

    let mut push = |prim: Option<PrimitiveGpu>, out: &mut Vec<PrimitiveGpu>| {
        if let Some(p) = prim {
            if out.len() < MAX_PRIMITIVES {
                out.push(p);
            } else {
                dropped += 1;
            }
        }
    };

    for raw in source.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line == "---" {
            continue;
        }
        let body = line.strip_prefix("- ").unwrap_or(line);
        let Some((key, value)) = body.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if key == "type" {
            // Starting a new entry flushes the previous one
            if raw.trim_start().starts_with("- ") || current.is_none() {
                push(current.take(), &mut out);
            }
            let ptype = TYPE_NAMES
                .iter()
                .find(|(name, _)| *name == value)
                .map(|(_, id)| *id);
            match ptype {
                Some(ptype) => {
                    current = Some(PrimitiveGpu {
                        ptype,
                        fill: [1.0, 1.0, 1.0, 1.0],
                        ..Default::default()
                    });
                }
                None => {
                    tracing::warn!(value, "unknown primitive type skipped");
                    current = None;
                }
            }
            continue;
        }

        let Some(prim) = current.as_mut() else {
            continue;
        };
        match key {
            "fill" => {
                if let Some(c) = parse_color(value) {
                    prim.fill = c;
                }
            }
            "stroke" => {
                if let Some(c) = parse_color(value) {
                    prim.stroke = c;
                }
            }
            _ => {
                let Ok(num) = value.parse::<f32>() else {
                    continue;
                };
                match key {
                    "stroke_width" => prim.stroke_width = num,
                    "round" => prim.round = num,
                    "rotate" => prim.rotate = num,
                    _ => {
                        if let Some(slot) = param_slot(prim.ptype, key) {
                            prim.params[slot] = transform_param(prim.ptype, key, num);
                        }
                    }
                }
            }
        }
    }
    push(current.take(), &mut out);

    if dropped > 0 {
        tracing::warn!(dropped, max = MAX_PRIMITIVES, "primitive list truncated");
    }
    out
}

/// Where a named parameter lands in the 15-float slot array.
fn param_slot(ptype: u32, key: &str) -> Option<usize> {
    match key {
        "x" => Some(0),
        "y" => Some(1),
        _ => match (ptype, key) {
            (0, "r") => Some(2),
            (1, "w") => Some(2),
            (1, "h") => Some(3),
            (2 | 3 | 4 | 7, "x1") => Some(2),
            (2 | 3 | 4 | 7, "y1") => Some(3),
            (2 | 3 | 4 | 7, "x2") => Some(4),
            (2 | 3 | 4 | 7, "y2") => Some(5),
            (3 | 4 | 7, "x3") => Some(6),
            (3 | 4 | 7, "y3") => Some(7),
            (7, "x4") => Some(8),
            (7, "y4") => Some(9),
            (5, "aperture") => Some(2),
            (5, "radius") => Some(4),
            (5, "thickness") => Some(5),
            (6 | 8, "rx") => Some(2),
            (6 | 8, "ry") => Some(3),
            (8, "rot") => Some(4),
            (8, "start") => Some(5),
            (8, "end") => Some(6),
            _ => None,
        },
    }
}

/// Unit conversions the shader expects: box sizes are half-extents, the
/// arc aperture becomes a (sin, cos) pair, angles become radians.
fn transform_param(ptype: u32, key: &str, value: f32) -> f32 {
    match (ptype, key) {
        (1, "w") | (1, "h") => value * 0.5,
        (5, "aperture") => value, // expanded into sin/cos below
        (8, "rot") | (8, "start") | (8, "end") => value.to_radians(),
        _ => value,
    }
}

/// Post-process primitives whose raw values need derived slots.
fn finalize(mut prims: Vec<PrimitiveGpu>) -> Vec<PrimitiveGpu> {
    for prim in &mut prims {
        if prim.ptype == 5 {
            let half = prim.params[2].to_radians() * 0.5;
            prim.params[2] = half.sin();
            prim.params[3] = half.cos();
        }
    }
    prims
}

/// Draws declarative SDF primitive documents.
pub struct SdfPrimitivesPlugin;

impl SdfPrimitivesPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SdfPrimitivesPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for SdfPrimitivesPlugin {
    fn name(&self) -> &str {
        "sdf"
    }

    fn create_widget(&mut self, _widget_type: &str, _args: &str) -> WidgetResult<Box<dyn Widget>> {
        Ok(Box::new(SdfWidget::default()))
    }
}

#[derive(Default)]
struct SdfWidget {
    primitives: Vec<PrimitiveGpu>,
    time: f64,
    gpu: Option<SdfGpu>,
}

struct SdfGpu {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    primitive_buffer: wgpu::Buffer,
}

impl SdfWidget {
    fn build_gpu(&self, env: &FrameEnv) -> SdfGpu {
        let device = env.ctx.device();
        let shader = env.ctx.create_shader_module(
            "sdf primitives",
            include_str!("shaders/sdf_primitives.wgsl"),
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sdf uniforms"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let primitive_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sdf primitives"),
            size: (MAX_PRIMITIVES * std::mem::size_of::<PrimitiveGpu>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sdf bind group layout"),
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
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sdf bind group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: primitive_buffer.as_entire_binding(),
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sdf pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sdf pipeline"),
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

        SdfGpu {
            pipeline,
            bind_group,
            uniform_buffer,
            primitive_buffer,
        }
    }
}

impl Widget for SdfWidget {
    fn init(&mut self, payload: &[u8]) -> WidgetResult<()> {
        let source = std::str::from_utf8(payload)
            .map_err(|e| WidgetError::InvalidPayload(format!("not UTF-8: {}", e)))?;
        let prims = finalize(parse_primitives(source));
        if prims.is_empty() {
            return Err(WidgetError::InvalidPayload("no primitives".into()));
        }
        tracing::debug!(count = prims.len(), "sdf document parsed");
        self.primitives = prims;
        Ok(())
    }

    fn dispose(&mut self) {
        self.gpu = None;
    }

    fn update(&mut self, dt: f64) {
        self.time += dt;
    }

    fn prepare_frame(&mut self, env: &mut FrameEnv, frame: &WidgetFrame) {
        if !frame.on {
            self.gpu = None;
            return;
        }
        if self.gpu.is_none() {
            self.gpu = Some(self.build_gpu(env));
        }
    }

    fn render(&mut self, env: &mut FrameEnv, frame: &WidgetFrame, target: &wgpu::TextureView) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        let queue = env.ctx.queue();

        queue.write_buffer(
            &gpu.primitive_buffer,
            0,
            bytemuck::cast_slice(&self.primitives),
        );
        queue.write_buffer(
            &gpu.uniform_buffer,
            0,
            bytemuck::bytes_of(&Uniforms {
                rect: rect_to_ndc(
                    frame.rect,
                    env.screen_width as f32,
                    env.screen_height as f32,
                ),
                resolution: [frame.rect.width, frame.rect.height],
                num_primitives: self.primitives.len() as f32,
                time: self.time as f32,
            }),
        );

        let mut encoder =
            env.ctx
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("sdf encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sdf pass"),
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
            pass.set_pipeline(&gpu.pipeline);
            pass.set_bind_group(0, &gpu.bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        queue.submit(Some(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_circle_with_style() {
        let doc = r##"
- type: circle
  x: 100
  y: 80
  r: 40
  fill: "#ff0000"
  stroke: "#00ff00ff"
  stroke_width: 2
"##;
        let prims = parse_primitives(doc);
        assert_eq!(prims.len(), 1);
        let p = &prims[0];
        assert_eq!(p.ptype, 0);
        assert_eq!(p.params[0], 100.0);
        assert_eq!(p.params[1], 80.0);
        assert_eq!(p.params[2], 40.0);
        assert_eq!(p.fill, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(p.stroke, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(p.stroke_width, 2.0);
    }

    #[test]
    fn box_sizes_become_half_extents() {
        let doc = "- type: box\n  x: 0\n  y: 0\n  w: 80\n  h: 30\n";
        let prims = parse_primitives(doc);
        assert_eq!(prims[0].params[2], 40.0);
        assert_eq!(prims[0].params[3], 15.0);
    }

    #[test]
    fn multiple_entries_and_unknown_type() {
        let doc = "\
- type: circle\n  r: 5\n\
- type: pentagram\n  r: 5\n\
- type: segment\n  x1: 0\n  y1: 0\n  x2: 10\n  y2: 10\n";
        let prims = parse_primitives(doc);
        assert_eq!(prims.len(), 2);
        assert_eq!(prims[0].ptype, 0);
        assert_eq!(prims[1].ptype, 2);
    }

    #[test]
    fn list_is_bounded() {
        let mut doc = String::new();
        for _ in 0..300 {
            doc.push_str("- type: circle\n  r: 1\n");
        }
        assert_eq!(parse_primitives(&doc).len(), MAX_PRIMITIVES);
    }

    #[test]
    fn arc_aperture_becomes_sin_cos() {
        let doc = "- type: arc\n  aperture: 180\n  radius: 10\n  thickness: 2\n";
        let prims = finalize(parse_primitives(doc));
        let p = &prims[0];
        assert!((p.params[2] - 1.0).abs() < 1e-5, "sin(90 deg)");
        assert!(p.params[3].abs() < 1e-5, "cos(90 deg)");
        assert_eq!(p.params[4], 10.0);
    }

    #[test]
    fn bad_payload_rejected() {
        let mut w = SdfWidget::default();
        assert!(w.init(b"just some text").is_err());
        assert!(w.init(&[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn color_parsing() {
        assert_eq!(parse_color("#ffffff"), Some([1.0, 1.0, 1.0, 1.0]));
        assert_eq!(parse_color("\"#00000000\""), Some([0.0, 0.0, 0.0, 0.0]));
        assert_eq!(parse_color("red"), None);
        assert_eq!(parse_color("#12345"), None);
    }

    #[test]
    fn gpu_struct_size_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<PrimitiveGpu>(), 112);
        assert_eq!(std::mem::size_of::<Uniforms>(), 32);
    }
}
