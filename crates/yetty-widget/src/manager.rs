//! Widget lifecycle, escape-sequence routing and the per-frame walk.
//!
//! The manager owns every live widget in creation order (which is also
//! their back-to-front z-order), reserves and restores the grid cells
//! under them, applies scroll and resize events, and routes input to the
//! topmost interested widget.
//!
//! # Wire format
//!
//! The widget control sequence is semicolon-delimited with fixed field
//! positions (payloads are Base94 and may themselves contain semicolons):
//!
//! ```text
//! VENDOR;PLUGIN;A;x;y;w;h;PAYLOAD   create, absolute
//! VENDOR;PLUGIN;R;x;y;w;h;PAYLOAD   create, relative to cursor
//! VENDOR;PLUGIN;U;id;PAYLOAD        update
//! VENDOR;PLUGIN;D;id                delete
//! ```
//!
//! Unknown vendors, unknown op letters and malformed numeric fields are
//! ignored without any terminal-visible effect.

use crate::base94;
use crate::host::PluginHost;
use crate::widget::{FrameEnv, PositionMode, WidgetEntry, WidgetFrame};
use yetty_core::geometry::CellRect;
use yetty_grid::Grid;

/// Vendor field identifying yetty widget sequences.
pub const OSC_VENDOR_ID: u32 = 99999;

/// Owns all live widgets and the plugin host.
///
/// # Example
///
/// ```ignore
/// use yetty_widget::{base94, PluginHost, WidgetManager};
///
/// let mut host = PluginHost::new(plugin_search_paths);
/// yetty_plugins::register_builtin_plugins(&mut host);
/// let mut widgets = WidgetManager::new(host);
///
/// // The terminal's string-sequence handler forwards widget sequences:
/// let seq = format!("99999;image;A;2;3;10;5;{}", base94::encode(&png_bytes));
/// widgets.handle_sequence(&seq, &mut grid, cursor_col, cursor_row, 9, 18);
///
/// // Between frames:
/// widgets.on_scroll(lines);
/// widgets.update(dt);
/// // And inside the frame, after the grid pass:
/// widgets.render_all(&mut env, &target_view);
/// ```
pub struct WidgetManager {
    host: PluginHost,
    widgets: Vec<WidgetEntry>,
    next_id: u32,
    /// Cell rects whose reservation state changed since the last drain.
    dirty_cells: Vec<CellRect>,
}

impl WidgetManager {
    pub fn new(host: PluginHost) -> Self {
        Self {
            host,
            widgets: Vec::new(),
            next_id: 1,
            dirty_cells: Vec::new(),
        }
    }

    /// Cell rects touched by widget create/delete since the last call.
    /// The caller feeds these into its damage set.
    pub fn take_dirty_cells(&mut self) -> Vec<CellRect> {
        std::mem::take(&mut self.dirty_cells)
    }

    pub fn host_mut(&mut self) -> &mut PluginHost {
        &mut self.host
    }

    pub fn widgets(&self) -> &[WidgetEntry] {
        &self.widgets
    }

    pub fn widget(&self, id: u32) -> Option<&WidgetEntry> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub fn widget_mut(&mut self, id: u32) -> Option<&mut WidgetEntry> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    //-------------------------------------------------------------------------
    // Escape-sequence routing
    //-------------------------------------------------------------------------

    /// Handle a widget control sequence (the payload after the vendor
    /// prefix of the host's string sequence). Returns whether the sequence
    /// was consumed.
    pub fn handle_sequence(
        &mut self,
        sequence: &str,
        grid: &mut Grid,
        cursor_col: i32,
        cursor_row: i32,
        cell_width: u32,
        cell_height: u32,
    ) -> bool {
        let Some(vendor) = field(sequence, 0).and_then(|f| f.parse::<u32>().ok()) else {
            return false;
        };
        if vendor != OSC_VENDOR_ID {
            return false;
        }
        let Some(plugin_id) = field(sequence, 1) else {
            return false;
        };
        let Some(op) = field(sequence, 2) else {
            return false;
        };
        if plugin_id.is_empty() {
            return false;
        }

        match op {
            "D" => {
                let Some(id) = field(sequence, 3).and_then(|f| f.parse::<u32>().ok()) else {
                    return false;
                };
                self.remove_widget(id, grid)
            }
            "U" => {
                let Some(id) = field(sequence, 3).and_then(|f| f.parse::<u32>().ok()) else {
                    return false;
                };
                let encoded = after_nth_semicolon(sequence, 4).unwrap_or("");
                let payload = base94::decode(encoded);
                self.update_widget(id, payload)
            }
            "A" | "R" => {
                let parse = |i| field(sequence, i).and_then(|f: &str| f.parse::<i32>().ok());
                let (Some(mut x), Some(mut y)) = (parse(3), parse(4)) else {
                    return false;
                };
                let (Some(w), Some(h)) = (
                    field(sequence, 5).and_then(|f| f.parse::<u32>().ok()),
                    field(sequence, 6).and_then(|f| f.parse::<u32>().ok()),
                ) else {
                    return false;
                };
                let encoded = after_nth_semicolon(sequence, 7).unwrap_or("");
                let payload = base94::decode(encoded);

                let mode = if op == "A" {
                    PositionMode::Absolute
                } else {
                    x += cursor_col;
                    y += cursor_row;
                    PositionMode::Relative
                };

                match self.create_widget(
                    plugin_id,
                    mode,
                    x,
                    y,
                    w,
                    h,
                    payload,
                    grid,
                    cell_width,
                    cell_height,
                    cursor_row,
                ) {
                    Some(id) => {
                        tracing::info!(id, plugin = plugin_id, x, y, w, h, "widget created");
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }

    //-------------------------------------------------------------------------
    // Lifecycle
    //-------------------------------------------------------------------------

    /// Create a widget. Returns its id, or `None` on any failure (in which
    /// case the grid is left untouched).
    #[allow(clippy::too_many_arguments)]
    pub fn create_widget(
        &mut self,
        plugin_name: &str,
        mode: PositionMode,
        x: i32,
        y: i32,
        width_cells: u32,
        height_cells: u32,
        payload: Vec<u8>,
        grid: &mut Grid,
        cell_width: u32,
        cell_height: u32,
        logical_line: i32,
    ) -> Option<u32> {
        // "plugin.widget" addresses a specific widget type
        let (plugin_name, widget_type) = match plugin_name.split_once('.') {
            Some((p, w)) => (p, w),
            None => (plugin_name, ""),
        };

        let widget = match self
            .host
            .get_or_load(plugin_name)
            .and_then(|plugin| plugin.create_widget(widget_type, ""))
        {
            Ok(widget) => widget,
            Err(e) => {
                tracing::error!(plugin = plugin_name, "widget creation failed: {}", e);
                return None;
            }
        };

        let id = self.next_id;
        let mut entry = WidgetEntry {
            id,
            plugin: plugin_name.to_owned(),
            mode,
            x,
            y,
            width_cells,
            height_cells,
            pixel_width: 0,
            pixel_height: 0,
            logical_line,
            visible: true,
            focused: false,
            needs_render: true,
            payload,
            widget,
        };
        entry.update_pixel_size(cell_width, cell_height);

        if let Err(e) = entry.widget.init(&entry.payload) {
            tracing::error!(plugin = plugin_name, "widget init failed: {}", e);
            return None;
        }

        self.next_id += 1;
        grid.reserve_widget_cells(entry.cell_rect(), id);
        self.dirty_cells.push(entry.cell_rect());
        self.widgets.push(entry);
        Some(id)
    }

    /// Re-initialize a widget with a new payload. Unknown ids are ignored.
    ///
    /// The stored payload is only replaced when the widget accepts the new
    /// one; a rejected update leaves the entry's last-good payload intact.
    pub fn update_widget(&mut self, id: u32, payload: Vec<u8>) -> bool {
        let Some(entry) = self.widgets.iter_mut().find(|w| w.id == id) else {
            tracing::debug!(id, "update for unknown widget ignored");
            return false;
        };
        match entry.widget.init(&payload) {
            Ok(()) => {
                entry.payload = payload;
                entry.needs_render = true;
                true
            }
            Err(e) => {
                tracing::error!(id, "widget re-init failed: {}", e);
                false
            }
        }
    }

    /// Dispose a widget and restore its grid cells. Unknown ids are
    /// ignored.
    pub fn remove_widget(&mut self, id: u32, grid: &mut Grid) -> bool {
        let Some(pos) = self.widgets.iter().position(|w| w.id == id) else {
            tracing::debug!(id, "delete for unknown widget ignored");
            return false;
        };
        let mut entry = self.widgets.remove(pos);
        grid.clear_widget_cells(entry.cell_rect());
        self.dirty_cells.push(entry.cell_rect());
        entry.widget.dispose();
        tracing::info!(id, "widget removed");
        true
    }

    /// Dispose everything (terminal shutdown).
    pub fn dispose_all(&mut self, grid: &mut Grid) {
        for entry in &mut self.widgets {
            grid.clear_widget_cells(entry.cell_rect());
            entry.widget.dispose();
        }
        self.widgets.clear();
        self.host.dispose_all();
    }

    //-------------------------------------------------------------------------
    // Frame events
    //-------------------------------------------------------------------------

    /// Tick visible widgets.
    pub fn update(&mut self, dt: f64) {
        for entry in &mut self.widgets {
            if entry.visible {
                entry.widget.update(dt);
            }
        }
    }

    /// Terminal resize: recompute pixel sizes and notify widgets.
    pub fn on_resize(&mut self, cell_width: u32, cell_height: u32) {
        for entry in &mut self.widgets {
            entry.update_pixel_size(cell_width, cell_height);
            entry.widget.on_resize(entry.pixel_width, entry.pixel_height);
            entry.needs_render = true;
        }
    }

    /// The terminal scrolled by `lines`; relative widgets move up.
    pub fn on_scroll(&mut self, lines: i32) {
        for entry in &mut self.widgets {
            if entry.mode == PositionMode::Relative {
                entry.y -= lines;
            }
        }
    }

    /// Render all visible widgets in creation order (back-to-front).
    ///
    /// Relative widgets scrolled fully off screen are skipped. Each widget
    /// first gets its off-pass `prepare_frame`, then `render`.
    pub fn render_all(&mut self, env: &mut FrameEnv, target: &wgpu::TextureView) {
        let screen_height = env.screen_height as f32;
        for entry in &mut self.widgets {
            if !entry.visible {
                continue;
            }
            let rect = entry.pixel_rect(env.cell_width, env.cell_height);
            if entry.mode == PositionMode::Relative
                && (rect.y + rect.height <= 0.0 || rect.y >= screen_height)
            {
                continue;
            }
            let frame = WidgetFrame { rect, on: true };
            entry.widget.prepare_frame(env, &frame);
            entry.widget.render(env, &frame, target);
            entry.needs_render = false;
        }
    }

    //-------------------------------------------------------------------------
    // Input routing
    //-------------------------------------------------------------------------

    /// Route a mouse move; coordinates in screen pixels. Returns whether a
    /// widget consumed it.
    pub fn route_mouse_move(&mut self, x: f32, y: f32, cell_w: f32, cell_h: f32) -> bool {
        for entry in self.widgets.iter_mut().rev() {
            let rect = entry.pixel_rect(cell_w, cell_h);
            if entry.visible && entry.widget.wants_mouse() && rect.contains(x, y) {
                return entry.widget.on_mouse_move(x - rect.x, y - rect.y);
            }
        }
        false
    }

    /// Route a mouse button. A press focuses the widget under the cursor
    /// and unfocuses every other widget.
    pub fn route_mouse_button(
        &mut self,
        x: f32,
        y: f32,
        button: u32,
        pressed: bool,
        cell_w: f32,
        cell_h: f32,
    ) -> bool {
        let mut hit: Option<u32> = None;
        for entry in self.widgets.iter_mut().rev() {
            let rect = entry.pixel_rect(cell_w, cell_h);
            if entry.visible && entry.widget.wants_mouse() && rect.contains(x, y) {
                hit = Some(entry.id);
                break;
            }
        }
        if pressed {
            for entry in &mut self.widgets {
                let focused = Some(entry.id) == hit;
                if entry.focused != focused {
                    entry.focused = focused;
                    entry.widget.set_focus(focused);
                }
            }
        }
        if let Some(id) = hit {
            let entry = self.widgets.iter_mut().find(|w| w.id == id).unwrap();
            return entry.widget.on_mouse_button(button, pressed);
        }
        false
    }

    /// Route a scroll event to the widget under the cursor.
    pub fn route_mouse_scroll(
        &mut self,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
        mods: u32,
        cell_w: f32,
        cell_h: f32,
    ) -> bool {
        for entry in self.widgets.iter_mut().rev() {
            let rect = entry.pixel_rect(cell_w, cell_h);
            if entry.visible && entry.widget.wants_mouse() && rect.contains(x, y) {
                return entry.widget.on_mouse_scroll(dx, dy, mods);
            }
        }
        false
    }

    /// Route a key event to the focused widget, if it wants the keyboard.
    pub fn route_key(&mut self, key: u32, scancode: u32, pressed: bool, mods: u32) -> bool {
        for entry in &mut self.widgets {
            if entry.focused && entry.widget.wants_keyboard() {
                return entry.widget.on_key(key, scancode, pressed, mods);
            }
        }
        false
    }

    /// Route a character to the focused widget.
    pub fn route_char(&mut self, codepoint: u32) -> bool {
        for entry in &mut self.widgets {
            if entry.focused && entry.widget.wants_keyboard() {
                return entry.widget.on_char(codepoint);
            }
        }
        false
    }
}

/// Position just past the `n`th semicolon, or `None` when there are fewer.
fn after_nth_semicolon(s: &str, n: usize) -> Option<&str> {
    let mut rest = s;
    let mut consumed = 0;
    for _ in 0..n {
        let idx = rest.find(';')?;
        consumed += idx + 1;
        rest = &s[consumed..];
    }
    Some(rest)
}

/// Extract field `index` (semicolon-delimited, fixed positions).
fn field(s: &str, index: usize) -> Option<&str> {
    let start = after_nth_semicolon(s, index)?;
    Some(match start.find(';') {
        Some(end) => &start[..end],
        None => start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WidgetResult;
    use crate::plugin::Plugin;
    use crate::widget::Widget;
    use std::cell::Cell;
    use std::rc::Rc;
    use yetty_grid::{GLYPH_DECORATOR, GLYPH_EMPTY};

    #[derive(Default)]
    struct Probe {
        inits: Cell<u32>,
        disposes: Cell<u32>,
        last_payload: std::cell::RefCell<Vec<u8>>,
    }

    struct ProbeWidget {
        probe: Rc<Probe>,
        fail_init: bool,
    }

    impl Widget for ProbeWidget {
        fn init(&mut self, payload: &[u8]) -> WidgetResult<()> {
            if self.fail_init || payload == b"!fail" {
                return Err(crate::WidgetError::InvalidPayload("nope".into()));
            }
            self.probe.inits.set(self.probe.inits.get() + 1);
            *self.probe.last_payload.borrow_mut() = payload.to_vec();
            Ok(())
        }
        fn dispose(&mut self) {
            self.probe.disposes.set(self.probe.disposes.get() + 1);
        }
        fn render(&mut self, _env: &mut FrameEnv, _f: &WidgetFrame, _t: &wgpu::TextureView) {}
    }

    struct ProbePlugin {
        probe: Rc<Probe>,
        fail_init: bool,
    }

    impl Plugin for ProbePlugin {
        fn name(&self) -> &str {
            "img"
        }
        fn create_widget(&mut self, _t: &str, _args: &str) -> WidgetResult<Box<dyn Widget>> {
            Ok(Box::new(ProbeWidget {
                probe: self.probe.clone(),
                fail_init: self.fail_init,
            }))
        }
    }

    thread_local! {
        static PROBE: Rc<Probe> = Rc::new(Probe::default());
        static FAIL_INIT: Cell<bool> = const { Cell::new(false) };
    }

    fn probe_factory() -> WidgetResult<Box<dyn Plugin>> {
        Ok(Box::new(ProbePlugin {
            probe: PROBE.with(|p| p.clone()),
            fail_init: FAIL_INIT.with(|f| f.get()),
        }))
    }

    fn manager() -> WidgetManager {
        FAIL_INIT.with(|f| f.set(false));
        let mut host = PluginHost::new(vec![]);
        host.register_builtin("img", probe_factory);
        WidgetManager::new(host)
    }

    fn seq_create(payload: &[u8]) -> String {
        format!("99999;img;A;2;3;10;5;{}", base94::encode(payload))
    }

    #[test]
    fn create_update_delete_via_sequences() {
        let mut mgr = manager();
        let mut grid = Grid::new(40, 20);

        assert!(mgr.handle_sequence(&seq_create(b"hello"), &mut grid, 0, 0, 9, 18));
        let entry = mgr.widget(1).expect("widget 1 exists");
        assert_eq!(entry.pixel_width, 90);
        assert_eq!(entry.pixel_height, 90);
        assert_eq!(PROBE.with(|p| p.last_payload.borrow().clone()), b"hello");

        // Cells (2..12, 3..8) carry the decorator glyph and the id
        for col in 2..12 {
            for row in 3..8 {
                assert_eq!(grid.cell(col, row).unwrap().0, GLYPH_DECORATOR);
                assert_eq!(grid.widget_id_at(col, row), Some(1));
            }
        }

        // Update re-initializes with the new payload, rect unchanged
        let update = format!("99999;img;U;1;{}", base94::encode(b"world"));
        assert!(mgr.handle_sequence(&update, &mut grid, 0, 0, 9, 18));
        assert_eq!(PROBE.with(|p| p.last_payload.borrow().clone()), b"world");
        assert_eq!(mgr.widget(1).unwrap().pixel_width, 90);

        // Delete restores the cells
        assert!(mgr.handle_sequence("99999;img;D;1", &mut grid, 0, 0, 9, 18));
        assert!(mgr.widget(1).is_none());
        for col in 2..12 {
            for row in 3..8 {
                let (glyph, fg, bg, _) = grid.cell(col, row).unwrap();
                assert_eq!(glyph, GLYPH_EMPTY);
                assert_eq!(fg, [255, 255, 255, 255]);
                assert_eq!(bg, [0, 0, 0, 255]);
            }
        }
    }

    #[test]
    fn unknown_vendor_and_garbage_are_ignored() {
        let mut mgr = manager();
        let mut grid = Grid::new(10, 10);
        assert!(!mgr.handle_sequence("1337;img;A;0;0;1;1;", &mut grid, 0, 0, 8, 16));
        assert!(!mgr.handle_sequence("99999;img;X;0", &mut grid, 0, 0, 8, 16));
        assert!(!mgr.handle_sequence("99999;img;A;zero;0;1;1;", &mut grid, 0, 0, 8, 16));
        assert!(!mgr.handle_sequence("not a sequence", &mut grid, 0, 0, 8, 16));
        assert!(mgr.widgets().is_empty());
        assert_eq!(grid.cell(0, 0).unwrap().0, GLYPH_EMPTY);
    }

    #[test]
    fn relative_create_offsets_by_cursor_and_scrolls() {
        let mut mgr = manager();
        let mut grid = Grid::new(40, 30);
        assert!(mgr.handle_sequence("99999;img;R;0;0;4;2;", &mut grid, 0, 10, 8, 16));

        let id = mgr.widgets()[0].id;
        assert_eq!(mgr.widget(id).unwrap().y, 10);

        mgr.on_scroll(3);
        assert_eq!(mgr.widget(id).unwrap().y, 7);
        let rect = mgr.widget(id).unwrap().pixel_rect(8.0, 16.0);
        assert_eq!((rect.x, rect.y), (0.0, 7.0 * 16.0));
        assert_eq!((rect.width, rect.height), (32.0, 32.0));

        // Scroll far off screen; position goes negative without error
        mgr.on_scroll(10);
        assert_eq!(mgr.widget(id).unwrap().y, -3);
    }

    #[test]
    fn absolute_widgets_ignore_scroll() {
        let mut mgr = manager();
        let mut grid = Grid::new(40, 30);
        assert!(mgr.handle_sequence(&seq_create(b""), &mut grid, 5, 5, 8, 16));
        let y = mgr.widget(1).unwrap().y;
        mgr.on_scroll(4);
        assert_eq!(mgr.widget(1).unwrap().y, y);
    }

    #[test]
    fn failed_widget_init_leaves_grid_untouched() {
        FAIL_INIT.with(|f| f.set(true));
        let mut host = PluginHost::new(vec![]);
        host.register_builtin("img", probe_factory);
        let mut mgr = WidgetManager::new(host);
        let mut grid = Grid::new(10, 10);

        assert!(!mgr.handle_sequence(&seq_create(b"x"), &mut grid, 0, 0, 8, 16));
        assert!(mgr.widgets().is_empty());
        assert_eq!(grid.cell(2, 3).unwrap().0, GLYPH_EMPTY);
    }

    #[test]
    fn resize_recomputes_pixel_sizes() {
        let mut mgr = manager();
        let mut grid = Grid::new(40, 20);
        mgr.handle_sequence(&seq_create(b""), &mut grid, 0, 0, 9, 18);
        mgr.on_resize(10, 20);
        let entry = mgr.widget(1).unwrap();
        assert_eq!(entry.pixel_width, 100);
        assert_eq!(entry.pixel_height, 100);
        assert!(entry.needs_render);
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut mgr = manager();
        let mut grid = Grid::new(40, 20);
        mgr.handle_sequence(&seq_create(b""), &mut grid, 0, 0, 8, 16);
        mgr.handle_sequence(&seq_create(b""), &mut grid, 0, 0, 8, 16);
        mgr.remove_widget(1, &mut grid);
        mgr.handle_sequence(&seq_create(b""), &mut grid, 0, 0, 8, 16);
        let ids: Vec<u32> = mgr.widgets().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn rejected_update_keeps_previous_payload() {
        let mut mgr = manager();
        let mut grid = Grid::new(40, 20);
        mgr.handle_sequence(&seq_create(b"good"), &mut grid, 0, 0, 8, 16);
        assert_eq!(mgr.widget(1).unwrap().payload, b"good");

        let update = format!("99999;img;U;1;{}", base94::encode(b"!fail"));
        assert!(!mgr.handle_sequence(&update, &mut grid, 0, 0, 8, 16));
        // The manager's record still holds the widget's last-good payload
        assert_eq!(mgr.widget(1).unwrap().payload, b"good");
    }

    #[test]
    fn payload_with_semicolons_survives() {
        let mut mgr = manager();
        let mut grid = Grid::new(40, 20);
        let payload = b"a;b;;c";
        mgr.handle_sequence(&seq_create(payload), &mut grid, 0, 0, 8, 16);
        assert_eq!(PROBE.with(|p| p.last_payload.borrow().clone()), payload);
    }

    #[test]
    fn field_helpers() {
        assert_eq!(field("a;b;c", 0), Some("a"));
        assert_eq!(field("a;b;c", 2), Some("c"));
        assert_eq!(field("a;b;c", 3), None);
        assert_eq!(after_nth_semicolon("a;b;c;rest;x", 3), Some("rest;x"));
    }
}
