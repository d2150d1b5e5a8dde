//! Scripted widget host contract.
//!
//! The embedding application supplies a [`ScriptRuntime`] factory (a plot
//! runtime, an embedded interpreter). Each widget owns a render-target
//! texture; the runtime redraws it every frame and the result is
//! composited over the widget rect with the standard blit pipeline.
//!
//! Runtimes built on interpreters with a global lock must acquire and
//! release that lock inside [`ScriptRuntime::draw`]; all calls arrive on
//! the single render thread.

use std::rc::Rc;
use yetty_render::{BlitRenderer, GraphicsContext, TextureUploader};
use yetty_widget::{FrameEnv, Plugin, Widget, WidgetError, WidgetFrame, WidgetResult};

/// A per-widget script execution environment.
pub trait ScriptRuntime {
    /// Redraw the widget's private texture. Called once per frame while
    /// the widget is on.
    fn draw(
        &mut self,
        ctx: &GraphicsContext,
        target: &wgpu::TextureView,
        width: u32,
        height: u32,
        time: f64,
    );
}

/// Factory invoked with the widget's payload on create and update.
pub type RuntimeFactory = Rc<dyn Fn(&[u8]) -> WidgetResult<Box<dyn ScriptRuntime>>>;

/// Hosts embedder-provided script runtimes.
pub struct ScriptedPlugin {
    name: String,
    factory: RuntimeFactory,
}

impl ScriptedPlugin {
    /// Create a scripted plugin under the given name ("plot", "python").
    pub fn new(name: impl Into<String>, factory: RuntimeFactory) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }
}

impl Plugin for ScriptedPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_widget(&mut self, _widget_type: &str, _args: &str) -> WidgetResult<Box<dyn Widget>> {
        Ok(Box::new(ScriptedWidget {
            factory: self.factory.clone(),
            runtime: None,
            time: 0.0,
            gpu: None,
        }))
    }
}

struct ScriptedWidget {
    factory: RuntimeFactory,
    runtime: Option<Box<dyn ScriptRuntime>>,
    time: f64,
    gpu: Option<ScriptedGpu>,
}

struct ScriptedGpu {
    texture: TextureUploader,
    blit: BlitRenderer,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
}

impl Widget for ScriptedWidget {
    fn init(&mut self, payload: &[u8]) -> WidgetResult<()> {
        self.runtime = Some((self.factory)(payload).map_err(|e| {
            WidgetError::WidgetInitFailed(format!("script runtime: {}", e))
        })?);
        self.time = 0.0;
        Ok(())
    }

    fn dispose(&mut self) {
        self.gpu = None;
        self.runtime = None;
    }

    fn update(&mut self, dt: f64) {
        self.time += dt;
    }

    fn prepare_frame(&mut self, env: &mut FrameEnv, frame: &WidgetFrame) {
        if !frame.on {
            // Dormant: drop GPU state, keep the runtime
            self.gpu = None;
            return;
        }
        let Some(runtime) = self.runtime.as_mut() else {
            return;
        };
        let width = frame.rect.width.max(1.0) as u32;
        let height = frame.rect.height.max(1.0) as u32;

        let needs_new = self.gpu.as_ref().is_none_or(|g| g.size != (width, height));
        if needs_new {
            let texture = TextureUploader::with_usage(
                env.ctx,
                width,
                height,
                wgpu::TextureFormat::Rgba8Unorm,
                wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::RENDER_ATTACHMENT,
            );
            let blit = BlitRenderer::new(env.ctx.clone(), env.target_format);
            let bind_group = blit.create_bind_group(texture.view());
            self.gpu = Some(ScriptedGpu {
                texture,
                blit,
                bind_group,
                size: (width, height),
            });
        }

        let gpu = self.gpu.as_ref().unwrap();
        runtime.draw(env.ctx, gpu.texture.view(), width, height, self.time);
    }

    fn render(&mut self, env: &mut FrameEnv, frame: &WidgetFrame, target: &wgpu::TextureView) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        gpu.blit.composite(
            target,
            &gpu.bind_group,
            frame.rect,
            env.screen_width as f32,
            env.screen_height as f32,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct NullRuntime;
    impl ScriptRuntime for NullRuntime {
        fn draw(
            &mut self,
            _ctx: &GraphicsContext,
            _target: &wgpu::TextureView,
            _w: u32,
            _h: u32,
            _time: f64,
        ) {
        }
    }

    #[test]
    fn factory_receives_payload() {
        let seen = Rc::new(Cell::new(0usize));
        let seen2 = seen.clone();
        let factory: RuntimeFactory = Rc::new(move |payload| {
            seen2.set(payload.len());
            Ok(Box::new(NullRuntime) as Box<dyn ScriptRuntime>)
        });
        let mut plugin = ScriptedPlugin::new("plot", factory);
        let mut widget = plugin.create_widget("", "").unwrap();
        widget.init(b"plot(sin)").unwrap();
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn factory_failure_propagates() {
        let factory: RuntimeFactory =
            Rc::new(|_| Err(WidgetError::InvalidPayload("bad script".into())));
        let mut plugin = ScriptedPlugin::new("plot", factory);
        let mut widget = plugin.create_widget("", "").unwrap();
        assert!(widget.init(b"x").is_err());
    }
}
