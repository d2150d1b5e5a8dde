//! Demo: a terminal grid with three widgets driven over the escape wire.
//!
//! ```bash
//! cargo run --package yetty --example widgets
//! ```

use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};
use yetty::core::{logging, Config};
use yetty::widget::base94;
use yetty::Engine;

const SDF_DOC: &str = r##"
- type: circle
  x: 110
  y: 80
  r: 50
  fill: "#e05050"
  stroke: "#202020ff"
  stroke_width: 3
- type: box
  x: 240
  y: 80
  w: 90
  h: 60
  round: 10
  rotate: 12
  fill: "#5070e0"
"##;

const SHADER_TOY: &str = r#"
fn mainImage(fragCoord: vec2<f32>) -> vec4<f32> {
    let uv = fragCoord / u.resolution;
    let c = 0.5 + 0.5 * cos(u.time + uv.xyx * 4.0 + vec3(0.0, 2.0, 4.0));
    return vec4<f32>(c, 1.0);
}
"#;

const RICH_TEXT: &str = "Widgets live inside the terminal grid. This one is \
rich text: it wraps to its cell rect, scrolls with the mouse wheel, and \
renders through the same MSDF atlas as the grid itself.";

#[derive(Default)]
struct App {
    window: Option<Arc<Window>>,
    engine: Option<Engine>,
    cursor: (f32, f32),
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window = Arc::new(
            event_loop
                .create_window(Window::default_attributes().with_title("yetty widgets"))
                .expect("create window"),
        );
        let size = window.inner_size();
        let mut engine = Engine::new(Config::default(), window.clone(), size.width, size.height)
            .expect("engine init");

        engine.put_text(
            2,
            1,
            "yetty widget demo - sdf primitives, shader toy, rich text",
            [220, 220, 220, 255],
            [0, 0, 0, 255],
        );
        engine.set_cursor(0, 0, false);

        engine.queue_sequence(format!(
            "99999;sdf;A;2;3;28;10;{}",
            base94::encode(SDF_DOC.as_bytes())
        ));
        engine.queue_sequence(format!(
            "99999;shadertoy;A;32;3;28;10;{}",
            base94::encode(SHADER_TOY.as_bytes())
        ));
        engine.queue_sequence(format!(
            "99999;richtext;A;2;15;58;8;{}",
            base94::encode(RICH_TEXT.as_bytes())
        ));

        window.request_redraw();
        self.window = Some(window);
        self.engine = Some(engine);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let (Some(window), Some(engine)) = (self.window.as_ref(), self.engine.as_mut()) else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                engine.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                engine.resize(size.width, size.height);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                engine.mouse_move(self.cursor.0, self.cursor.1);
            }
            WindowEvent::MouseInput { state, .. } => {
                engine.mouse_button(
                    self.cursor.0,
                    self.cursor.1,
                    0,
                    state == ElementState::Pressed,
                );
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let (dx, dy) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (x, y),
                    MouseScrollDelta::PixelDelta(p) => (p.x as f32 / 20.0, p.y as f32 / 20.0),
                };
                engine.mouse_scroll(self.cursor.0, self.cursor.1, dx, dy, 0);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = engine.frame() {
                    eprintln!("frame failed: {e}");
                    event_loop.exit();
                    return;
                }
                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() {
    logging::init();
    let event_loop = EventLoop::new().expect("event loop");
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut App::default()).expect("run");
}
