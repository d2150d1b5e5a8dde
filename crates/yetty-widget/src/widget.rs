//! The widget contract and per-instance state.
//!
//! A widget implementation draws into the shared surface target; the
//! manager owns the surrounding state ([`WidgetEntry`]) with a stable u32
//! id, so widgets never hold owning references to their plugin or to each
//! other.

use crate::error::WidgetResult;
use std::sync::Arc;
use yetty_core::geometry::{CellRect, PixelRect};
use yetty_font::FontManager;
use yetty_render::GraphicsContext;

/// How a widget's cell position is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionMode {
    /// Fixed grid position; unaffected by scrolling.
    Absolute,
    /// Anchored to the content; y shifts up as the terminal scrolls.
    Relative,
}

/// Frame-global context handed to widgets during render.
pub struct FrameEnv<'a> {
    pub ctx: &'a Arc<GraphicsContext>,
    pub fonts: &'a mut FontManager,
    pub target_format: wgpu::TextureFormat,
    pub screen_width: u32,
    pub screen_height: u32,
    pub cell_width: f32,
    pub cell_height: f32,
}

/// Per-widget frame parameters.
#[derive(Debug, Clone, Copy)]
pub struct WidgetFrame {
    /// The widget's pixel rect (unclipped; may extend past the screen).
    pub rect: PixelRect,
    /// False when the host wants the widget dormant: release pipeline-sized
    /// GPU resources but keep enough state to reinitialize later.
    pub on: bool,
}

/// A widget implementation hosted by a plugin.
///
/// All methods run on the single render thread. Input callbacks return
/// whether the event was consumed.
///
/// # Example
///
/// ```ignore
/// struct SolidColor([f32; 4]);
///
/// impl Widget for SolidColor {
///     fn init(&mut self, payload: &[u8]) -> WidgetResult<()> {
///         self.0 = parse_color(payload)?;
///         Ok(())
///     }
///
///     fn render(&mut self, env: &mut FrameEnv, frame: &WidgetFrame, target: &wgpu::TextureView) {
///         // open a load-preserving pass scoped to frame.rect and fill it
///     }
/// }
/// ```
///
/// # Dormant Widgets
///
/// When the host calls [`prepare_frame`](Widget::prepare_frame) with
/// `frame.on == false`, the widget must drop its pipeline-sized GPU
/// resources but keep enough CPU state to rebuild them on the next
/// `on == true` frame.
pub trait Widget {
    /// (Re-)initialize from a payload. Called on create and on every
    /// update command; implementations may diff or rebuild.
    fn init(&mut self, payload: &[u8]) -> WidgetResult<()>;

    /// Release resources. Called once before the widget is dropped.
    fn dispose(&mut self) {}

    /// Per-frame tick for animation.
    fn update(&mut self, _dt: f64) {}

    // Input; coordinates are widget-local pixels.
    fn on_mouse_move(&mut self, _x: f32, _y: f32) -> bool {
        false
    }
    fn on_mouse_button(&mut self, _button: u32, _pressed: bool) -> bool {
        false
    }
    fn on_mouse_scroll(&mut self, _dx: f32, _dy: f32, _mods: u32) -> bool {
        false
    }
    fn on_key(&mut self, _key: u32, _scancode: u32, _pressed: bool, _mods: u32) -> bool {
        false
    }
    fn on_char(&mut self, _codepoint: u32) -> bool {
        false
    }

    fn wants_keyboard(&self) -> bool {
        false
    }
    fn wants_mouse(&self) -> bool {
        false
    }
    fn set_focus(&mut self, _focused: bool) {}

    /// The widget's pixel size changed (terminal resize or font change).
    fn on_resize(&mut self, _width: u32, _height: u32) {}

    /// Off-pass GPU work (offscreen rendering, uploads) before any render
    /// pass of the frame is opened. `frame.on == false` must release
    /// GPU resources.
    fn prepare_frame(&mut self, _env: &mut FrameEnv, _frame: &WidgetFrame) {}

    /// Draw into the shared target. Implementations either open their own
    /// load-preserving pass scoped to `frame.rect`, or composite a texture
    /// prepared in [`prepare_frame`](Widget::prepare_frame).
    fn render(&mut self, env: &mut FrameEnv, frame: &WidgetFrame, target: &wgpu::TextureView);
}

/// Manager-owned state for one live widget.
pub struct WidgetEntry {
    pub id: u32,
    pub plugin: String,
    pub mode: PositionMode,
    pub x: i32,
    pub y: i32,
    pub width_cells: u32,
    pub height_cells: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Content line this widget was created on (relative mode scroll
    /// tracking).
    pub logical_line: i32,
    pub visible: bool,
    pub focused: bool,
    pub needs_render: bool,
    pub payload: Vec<u8>,
    pub widget: Box<dyn Widget>,
}

impl WidgetEntry {
    /// The widget's footprint in cell coordinates.
    pub fn cell_rect(&self) -> CellRect {
        CellRect::new(
            self.x,
            self.y,
            self.width_cells as i32,
            self.height_cells as i32,
        )
    }

    /// The widget's pixel rect for the given cell metrics.
    pub fn pixel_rect(&self, cell_width: f32, cell_height: f32) -> PixelRect {
        self.cell_rect().to_pixels(cell_width, cell_height)
    }

    /// Recompute the cached pixel size from cell metrics.
    pub fn update_pixel_size(&mut self, cell_width: u32, cell_height: u32) {
        self.pixel_width = self.width_cells * cell_width;
        self.pixel_height = self.height_cells * cell_height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl Widget for Noop {
        fn init(&mut self, _payload: &[u8]) -> WidgetResult<()> {
            Ok(())
        }
        fn render(&mut self, _env: &mut FrameEnv, _frame: &WidgetFrame, _t: &wgpu::TextureView) {}
    }

    fn entry() -> WidgetEntry {
        WidgetEntry {
            id: 1,
            plugin: "test".into(),
            mode: PositionMode::Absolute,
            x: 2,
            y: 3,
            width_cells: 10,
            height_cells: 5,
            pixel_width: 0,
            pixel_height: 0,
            logical_line: 0,
            visible: true,
            focused: false,
            needs_render: true,
            payload: Vec::new(),
            widget: Box::new(Noop),
        }
    }

    #[test]
    fn pixel_size_derives_from_cells() {
        let mut e = entry();
        e.update_pixel_size(9, 18);
        assert_eq!(e.pixel_width, 90);
        assert_eq!(e.pixel_height, 90);
    }

    #[test]
    fn pixel_rect_matches_cell_rect() {
        let e = entry();
        let r = e.pixel_rect(9.0, 18.0);
        assert_eq!(r.x, 18.0);
        assert_eq!(r.y, 54.0);
        assert_eq!(r.width, 90.0);
        assert_eq!(r.height, 90.0);
    }
}
