//! End-to-end escape-sequence scenarios against a recording plugin.

use std::cell::RefCell;
use std::rc::Rc;
use yetty_grid::{Grid, GLYPH_DECORATOR, GLYPH_EMPTY};
use yetty_widget::{
    base94, FrameEnv, Plugin, PluginHost, PositionMode, Widget, WidgetFrame, WidgetManager,
    WidgetResult,
};

#[derive(Default)]
struct Journal {
    events: RefCell<Vec<String>>,
}

impl Journal {
    fn push(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }
}

struct RecordingWidget {
    journal: Rc<Journal>,
}

impl Widget for RecordingWidget {
    fn init(&mut self, payload: &[u8]) -> WidgetResult<()> {
        self.journal
            .push(format!("init:{}", String::from_utf8_lossy(payload)));
        Ok(())
    }
    fn dispose(&mut self) {
        self.journal.push("dispose");
    }
    fn render(&mut self, _env: &mut FrameEnv, _f: &WidgetFrame, _t: &wgpu::TextureView) {}
}

struct RecordingPlugin {
    journal: Rc<Journal>,
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        "img"
    }
    fn create_widget(&mut self, _t: &str, _args: &str) -> WidgetResult<Box<dyn Widget>> {
        Ok(Box::new(RecordingWidget {
            journal: self.journal.clone(),
        }))
    }
}

thread_local! {
    static JOURNAL: Rc<Journal> = Rc::new(Journal::default());
}

fn recording_factory() -> WidgetResult<Box<dyn Plugin>> {
    Ok(Box::new(RecordingPlugin {
        journal: JOURNAL.with(|j| j.clone()),
    }))
}

fn setup() -> (WidgetManager, Grid) {
    JOURNAL.with(|j| j.events.borrow_mut().clear());
    let mut host = PluginHost::new(vec![]);
    host.register_builtin("img", recording_factory);
    (WidgetManager::new(host), Grid::new(40, 20))
}

fn events() -> Vec<String> {
    JOURNAL.with(|j| j.events.borrow().clone())
}

#[test]
fn widget_lifecycle_through_the_wire() {
    let (mut mgr, mut grid) = setup();

    // Create: id 1 appears with the full cell reservation
    let create = format!("99999;img;A;2;3;10;5;{}", base94::encode(b"first"));
    assert!(mgr.handle_sequence(&create, &mut grid, 0, 0, 9, 18));
    assert_eq!(events(), vec!["init:first"]);

    let entry = mgr.widget(1).unwrap();
    assert_eq!(entry.mode, PositionMode::Absolute);
    let rect = entry.pixel_rect(9.0, 18.0);
    assert_eq!(
        (rect.x, rect.y, rect.width, rect.height),
        (18.0, 54.0, 90.0, 90.0)
    );
    for col in 2..12 {
        for row in 3..8 {
            assert_eq!(grid.cell(col, row).unwrap().0, GLYPH_DECORATOR);
        }
    }

    // Update: re-initializes with the new payload, geometry untouched
    let update = format!("99999;img;U;1;{}", base94::encode(b"second"));
    assert!(mgr.handle_sequence(&update, &mut grid, 0, 0, 9, 18));
    assert_eq!(events(), vec!["init:first", "init:second"]);
    assert_eq!(mgr.widget(1).unwrap().pixel_rect(9.0, 18.0).width, 90.0);

    // Delete: widget gone, cells restored to space/white/black
    assert!(mgr.handle_sequence("99999;img;D;1", &mut grid, 0, 0, 9, 18));
    assert_eq!(
        events(),
        vec!["init:first", "init:second", "dispose"]
    );
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
fn relative_widget_follows_scroll_then_leaves_screen() {
    let (mut mgr, mut grid) = setup();

    // Created at cursor row 10 with size 4x2
    assert!(mgr.handle_sequence("99999;img;R;0;0;4;2;", &mut grid, 0, 10, 8, 16));
    let id = mgr.widgets()[0].id;
    assert_eq!(mgr.widget(id).unwrap().y, 10);

    mgr.on_scroll(3);
    let entry = mgr.widget(id).unwrap();
    assert_eq!(entry.y, 7);
    let rect = entry.pixel_rect(8.0, 16.0);
    assert_eq!((rect.x, rect.y), (0.0, 112.0));
    assert_eq!((rect.width, rect.height), (32.0, 32.0));

    // Scrolling past the top must not error; the render walk skips it
    mgr.on_scroll(10);
    assert_eq!(mgr.widget(id).unwrap().y, -3);
    let rect = mgr.widget(id).unwrap().pixel_rect(8.0, 16.0);
    assert!(rect.y + rect.height <= 0.0);
}

#[test]
fn deleting_one_widget_leaves_neighbours_reserved() {
    let (mut mgr, mut grid) = setup();
    assert!(mgr.handle_sequence("99999;img;A;0;0;4;2;", &mut grid, 0, 0, 8, 16));
    assert!(mgr.handle_sequence("99999;img;A;4;0;4;2;", &mut grid, 0, 0, 8, 16));

    assert!(mgr.handle_sequence("99999;img;D;1", &mut grid, 0, 0, 8, 16));
    assert_eq!(grid.cell(0, 0).unwrap().0, GLYPH_EMPTY);
    assert_eq!(grid.cell(4, 0).unwrap().0, GLYPH_DECORATOR);
    assert_eq!(grid.widget_id_at(4, 0), Some(2));
}

#[test]
fn dirty_cells_cover_create_and_delete() {
    let (mut mgr, mut grid) = setup();
    mgr.handle_sequence("99999;img;A;2;3;10;5;", &mut grid, 0, 0, 8, 16);

    let dirty = mgr.take_dirty_cells();
    assert_eq!(dirty.len(), 1);
    assert_eq!((dirty[0].x, dirty[0].y), (2, 3));
    assert_eq!((dirty[0].width, dirty[0].height), (10, 5));

    // Drained: no stale entries
    assert!(mgr.take_dirty_cells().is_empty());

    mgr.handle_sequence("99999;img;D;1", &mut grid, 0, 0, 8, 16);
    assert_eq!(mgr.take_dirty_cells().len(), 1);
}

#[test]
fn delete_of_unknown_id_is_ignored() {
    let (mut mgr, mut grid) = setup();
    assert!(!mgr.handle_sequence("99999;img;D;42", &mut grid, 0, 0, 8, 16));
    assert!(events().is_empty());
}

#[test]
fn update_of_unknown_id_is_ignored() {
    let (mut mgr, mut grid) = setup();
    let update = format!("99999;img;U;42;{}", base94::encode(b"x"));
    assert!(!mgr.handle_sequence(&update, &mut grid, 0, 0, 8, 16));
    assert!(events().is_empty());
}
