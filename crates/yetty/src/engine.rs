//! The per-frame engine.
//!
//! Control flow per frame: drain queued escape sequences, tick widgets,
//! acquire the surface target, run widget `prepare_frame` work, draw the
//! terminal grid, walk widgets in z-order, present. Everything runs on one
//! render thread; escape and input events queue between frames and are
//! drained in arrival order.
//!
//! # Example
//!
//! ```ignore
//! use yetty::Engine;
//! use yetty::core::Config;
//!
//! let mut engine = Engine::new(Config::default(), window.clone(), 800, 600)?;
//!
//! // Terminal emulation writes cells and queues widget sequences
//! engine.put_text(0, 0, "$ cat plot.png", [220, 220, 220, 255], [0, 0, 0, 255]);
//! engine.queue_sequence(format!("99999;image;A;0;1;40;12;{}", encoded_png));
//!
//! // Event loop, once per redraw:
//! engine.frame()?;
//! ```
//!
//! # Threading
//!
//! The engine is single-threaded cooperative: every call, including plugin
//! entry points, happens on the render thread. Async GPU callbacks are
//! resolved by polling inside a bounded spin
//! ([`yetty_render::GraphicsContext::poll_wait`]); no user code runs on
//! callback threads.

use std::sync::Arc;
use std::time::Instant;
use winit::window::Window;
use yetty_core::Config;
use yetty_font::{FontId, FontManager, FontManagerOptions, Style};
use yetty_grid::{CellAttrs, Cursor, Damage, EmojiAtlas, Grid, GridRenderer};
use yetty_render::{GraphicsContext, GraphicsError, WindowSurface};
use yetty_widget::{FrameEnv, PluginHost, WidgetManager};

/// Top-level engine errors.
#[derive(Debug)]
pub enum EngineError {
    Graphics(GraphicsError),
    Font(yetty_font::FontError),
    /// The device was lost and could not be reinitialized.
    DeviceLost,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Graphics(e) => write!(f, "graphics: {}", e),
            EngineError::Font(e) => write!(f, "font: {}", e),
            EngineError::DeviceLost => write!(f, "device lost and reinitialization failed"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<GraphicsError> for EngineError {
    fn from(e: GraphicsError) -> Self {
        EngineError::Graphics(e)
    }
}

impl From<yetty_font::FontError> for EngineError {
    fn from(e: yetty_font::FontError) -> Self {
        EngineError::Font(e)
    }
}

/// The terminal rendering core: grid, fonts, widgets and the frame loop.
///
/// # Lifecycle
///
/// 1. Build with [`Engine::new`] from a [`Config`] and a window handle.
/// 2. Feed it terminal state ([`put_char`](Engine::put_char),
///    [`set_cursor`](Engine::set_cursor), [`scroll`](Engine::scroll)) and
///    widget sequences ([`queue_sequence`](Engine::queue_sequence)).
/// 3. Call [`frame`](Engine::frame) once per redraw.
/// 4. Call [`shutdown`](Engine::shutdown) before dropping so plugins can
///    tear down their widgets.
///
/// # Example
///
/// ```ignore
/// let mut engine = Engine::new(Config::default(), window, 1024, 768)?;
/// engine.put_text(2, 1, "hello", [255, 255, 255, 255], [0, 0, 0, 255]);
/// loop {
///     engine.frame()?;
/// }
/// ```
pub struct Engine {
    config: Config,
    ctx: Arc<GraphicsContext>,
    surface: WindowSurface,
    fonts: FontManager,
    terminal_font: FontId,
    emoji: EmojiAtlas,
    grid: Grid,
    damage: Damage,
    grid_renderer: GridRenderer,
    widgets: WidgetManager,
    cursor: Cursor,
    cell_size: (f32, f32),
    pending_sequences: Vec<String>,
    last_frame: Instant,
    device_lost_once: bool,
}

impl Engine {
    /// Build the engine for a window surface.
    pub fn new(
        config: Config,
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Self, EngineError> {
        let config = config.normalized();
        let ctx = GraphicsContext::new_sync()?;
        let surface = WindowSurface::new(ctx.clone(), window, width, height)?;

        let mut fonts = FontManager::new(FontManagerOptions {
            font_size: config.font_size,
            msdf_range: config.msdf_range,
            atlas_width: config.atlas_width,
            atlas_cache_dir: config.atlas_cache_dir.clone(),
        });
        let terminal_font = match &config.font_path {
            Some(path) => fonts.load_from_path("terminal", path.clone())?,
            None => fonts.get_or_load("monospace")?,
        };
        {
            let font = fonts.font_mut(terminal_font);
            font.create_texture(ctx.device(), ctx.queue())?;
            font.create_glyph_metadata_buffer(ctx.device())?;
        }

        let mut emoji = EmojiAtlas::new(64, 1024);
        emoji.load_common_emojis(fonts.database());

        // Cell metrics derive from the terminal font at its intrinsic size
        let (cell_w, cell_h) = {
            let font = fonts.font(terminal_font);
            let advance = font
                .glyph('M' as u32, Style::Regular)
                .map(|m| m.advance)
                .unwrap_or(font.font_size() * 0.6);
            (advance.round().max(1.0), font.line_height().round().max(1.0))
        };
        let cols = (width as f32 / cell_w).max(1.0) as u32;
        let rows = (height as f32 / cell_h).max(1.0) as u32;
        tracing::info!(cols, rows, cell_w, cell_h, "terminal geometry");

        let mut grid_renderer =
            GridRenderer::new(ctx.clone(), surface.format(), config.grid_shader_path.as_deref())?;
        grid_renderer.resize(width, height);
        grid_renderer.set_cell_size(cell_w, cell_h);

        let mut host = PluginHost::new(config.plugin_search_paths.clone());
        host.set_context(ctx.clone());
        yetty_plugins::register_builtin_plugins(&mut host);

        Ok(Self {
            config,
            ctx,
            surface,
            fonts,
            terminal_font,
            emoji,
            grid: Grid::new(cols, rows),
            damage: Damage::Full,
            grid_renderer,
            widgets: WidgetManager::new(host),
            cursor: Cursor::default(),
            cell_size: (cell_w, cell_h),
            pending_sequences: Vec::new(),
            last_frame: Instant::now(),
            device_lost_once: false,
        })
    }

    //-------------------------------------------------------------------------
    // Terminal state entry points (called by the emulation layer)
    //-------------------------------------------------------------------------

    /// Write a character cell, resolving its glyph index (with fallback
    /// loading for unknown codepoints).
    pub fn put_char(
        &mut self,
        col: u32,
        row: u32,
        ch: char,
        fg: [u8; 4],
        bg: [u8; 4],
        attrs: CellAttrs,
    ) {
        let style = Style::from_flags(
            attrs.contains(CellAttrs::BOLD),
            attrs.contains(CellAttrs::ITALIC),
        );
        let glyph = if attrs.contains(CellAttrs::EMOJI) {
            self.emoji
                .ensure_glyph(self.fonts.database(), ch as u32)
                .unwrap_or(0)
        } else {
            self.fonts.font_mut(self.terminal_font).glyph_index(ch as u32, style)
        };
        self.grid.set_cell(col, row, glyph, fg, bg, attrs);
        self.damage.add_cell(col, row);
    }

    /// Write a run of text starting at a cell, without line wrapping.
    pub fn put_text(&mut self, col: u32, row: u32, text: &str, fg: [u8; 4], bg: [u8; 4]) {
        for (i, ch) in text.chars().enumerate() {
            let c = col + i as u32;
            if c >= self.grid.cols() {
                break;
            }
            self.put_char(c, row, ch, fg, bg, CellAttrs::empty());
        }
    }

    /// Move or hide the cursor.
    pub fn set_cursor(&mut self, col: i32, row: i32, visible: bool) {
        self.cursor = Cursor { col, row, visible };
    }

    /// Queue a widget control sequence; drained at the next frame.
    pub fn queue_sequence(&mut self, sequence: impl Into<String>) {
        self.pending_sequences.push(sequence.into());
    }

    /// The terminal scrolled by `lines` (positive = content moved up).
    pub fn scroll(&mut self, lines: i32) {
        self.widgets.on_scroll(lines);
        self.damage.mark_full();
    }

    /// Window resize. Same-size calls are no-ops end to end.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface.resize(width, height);
        self.grid_renderer.resize(width, height);

        let cols = (width as f32 / self.cell_size.0).max(1.0) as u32;
        let rows = (height as f32 / self.cell_size.1).max(1.0) as u32;
        if (cols, rows) != (self.grid.cols(), self.grid.rows()) {
            self.grid.resize(cols, rows);
            self.widgets
                .on_resize(self.cell_size.0 as u32, self.cell_size.1 as u32);
            self.damage.mark_full();
        }
    }

    //-------------------------------------------------------------------------
    // Input routing
    //-------------------------------------------------------------------------

    pub fn mouse_move(&mut self, x: f32, y: f32) -> bool {
        self.widgets
            .route_mouse_move(x, y, self.cell_size.0, self.cell_size.1)
    }

    pub fn mouse_button(&mut self, x: f32, y: f32, button: u32, pressed: bool) -> bool {
        self.widgets
            .route_mouse_button(x, y, button, pressed, self.cell_size.0, self.cell_size.1)
    }

    pub fn mouse_scroll(&mut self, x: f32, y: f32, dx: f32, dy: f32, mods: u32) -> bool {
        self.widgets
            .route_mouse_scroll(x, y, dx, dy, mods, self.cell_size.0, self.cell_size.1)
    }

    pub fn key(&mut self, key: u32, scancode: u32, pressed: bool, mods: u32) -> bool {
        self.widgets.route_key(key, scancode, pressed, mods)
    }

    pub fn char_input(&mut self, codepoint: u32) -> bool {
        self.widgets.route_char(codepoint)
    }

    //-------------------------------------------------------------------------
    // The frame
    //-------------------------------------------------------------------------

    /// Render one frame. Surface loss skips the frame (and attempts a
    /// reconfigure); a second consecutive device-level failure is fatal.
    pub fn frame(&mut self) -> Result<(), EngineError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;

        // Events queued since the previous frame, in arrival order
        let sequences = std::mem::take(&mut self.pending_sequences);
        for sequence in sequences {
            self.widgets.handle_sequence(
                &sequence,
                &mut self.grid,
                self.cursor.col,
                self.cursor.row,
                self.cell_size.0 as u32,
                self.cell_size.1 as u32,
            );
        }
        // Reservation changes damage exactly the affected cell rects
        for rect in self.widgets.take_dirty_cells() {
            let col0 = rect.x.max(0) as u32;
            let row0 = rect.y.max(0) as u32;
            self.damage.add(yetty_grid::DamageRect {
                start_col: col0,
                start_row: row0,
                end_col: ((rect.x + rect.width).max(0) as u32).min(self.grid.cols()),
                end_row: ((rect.y + rect.height).max(0) as u32).min(self.grid.rows()),
            });
        }

        // Fallback glyphs discovered while writing cells go up now
        {
            let font = self.fonts.font_mut(self.terminal_font);
            if font.has_pending_upload() {
                font.upload_pending(self.ctx.device(), self.ctx.queue())?;
            }
        }

        self.widgets.update(dt);

        match self.surface.acquire() {
            Ok(_) => {
                self.device_lost_once = false;
            }
            Err(GraphicsError::SurfaceLost | GraphicsError::SurfaceOutdated) => {
                tracing::warn!("surface lost, reconfiguring and skipping frame");
                if self.device_lost_once {
                    return Err(EngineError::DeviceLost);
                }
                self.device_lost_once = true;
                self.surface.reconfigure();
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("frame skipped: {}", e);
                return Ok(());
            }
        }

        let (screen_w, screen_h) = self.surface.size();
        let target_format = self.surface.format();

        // Widget off-pass work happens before any pass is opened
        {
            let mut env = FrameEnv {
                ctx: &self.ctx,
                fonts: &mut self.fonts,
                target_format,
                screen_width: screen_w,
                screen_height: screen_h,
                cell_width: self.cell_size.0,
                cell_height: self.cell_size.1,
            };
            // prepare + render are interleaved per widget inside the walk
            let target = self.surface.acquire()?;
            let font = env.fonts.font(self.terminal_font);
            self.grid_renderer
                .render(font, &mut self.emoji, &self.grid, &self.damage, self.cursor, target)?;
            self.widgets.render_all(&mut env, target);
        }
        self.damage.clear();

        self.surface.present();
        Ok(())
    }

    //-------------------------------------------------------------------------
    // Accessors
    //-------------------------------------------------------------------------

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn fonts_mut(&mut self) -> &mut FontManager {
        &mut self.fonts
    }

    pub fn widgets(&self) -> &WidgetManager {
        &self.widgets
    }

    pub fn widgets_mut(&mut self) -> &mut WidgetManager {
        &mut self.widgets
    }

    pub fn cell_size(&self) -> (f32, f32) {
        self.cell_size
    }

    /// Dispose widgets and plugins (terminal shutdown).
    pub fn shutdown(&mut self) {
        self.widgets.dispose_all(&mut self.grid);
    }
}
