//! The terminal cell grid.
//!
//! Four parallel row-major arrays hold the per-cell state the renderer
//! consumes directly: 16-bit glyph indices, RGBA8 foreground and background
//! colors, and a packed attribute byte. The arrays always share the same
//! dimensions and are swapped atomically with respect to a frame.

use bitflags::bitflags;
use yetty_core::geometry::CellRect;

/// Glyph index meaning "empty cell" (space).
pub const GLYPH_EMPTY: u16 = 0;

/// Reserved glyph index marking a cell occupied by a widget. The owning
/// widget id is encoded in the cell's fg color (24 bits).
pub const GLYPH_DECORATOR: u16 = 0xFFFF;

bitflags! {
    /// Packed per-cell attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CellAttrs: u8 {
        const BOLD          = 1 << 0;
        const ITALIC        = 1 << 1;
        const UNDERLINE     = 1 << 2;
        const STRIKETHROUGH = 1 << 3;
        /// The glyph slot holds an emoji-atlas index, not an MSDF index.
        const EMOJI         = 1 << 4;
    }
}

/// The terminal screen: `cols * rows` cells in four parallel arrays.
///
/// # Example
///
/// ```rust
/// use yetty_grid::{CellAttrs, Grid};
///
/// let mut grid = Grid::new(80, 24);
/// grid.set_cell(3, 5, 42, [255, 255, 255, 255], [0, 0, 0, 255], CellAttrs::BOLD);
///
/// let (glyph, _fg, _bg, attrs) = grid.cell(3, 5).unwrap();
/// assert_eq!(glyph, 42);
/// assert!(attrs.contains(CellAttrs::BOLD));
/// ```
pub struct Grid {
    cols: u32,
    rows: u32,
    glyphs: Vec<u16>,
    fg: Vec<u8>,
    bg: Vec<u8>,
    attrs: Vec<u8>,
}

impl Grid {
    /// Create a grid filled with spaces (white on black).
    pub fn new(cols: u32, rows: u32) -> Self {
        let n = (cols * rows) as usize;
        let mut grid = Self {
            cols,
            rows,
            glyphs: vec![GLYPH_EMPTY; n],
            fg: vec![0; n * 4],
            bg: vec![0; n * 4],
            attrs: vec![0; n],
        };
        grid.fill_space();
        grid
    }

    /// Reset every cell to a space with default colors.
    pub fn fill_space(&mut self) {
        self.glyphs.fill(GLYPH_EMPTY);
        self.attrs.fill(0);
        for cell in self.fg.chunks_exact_mut(4) {
            cell.copy_from_slice(&[255, 255, 255, 255]);
        }
        for cell in self.bg.chunks_exact_mut(4) {
            cell.copy_from_slice(&[0, 0, 0, 255]);
        }
    }

    /// Resize the grid, clearing its contents. Resizing to the current
    /// dimensions has no effect.
    pub fn resize(&mut self, cols: u32, rows: u32) {
        if cols == self.cols && rows == self.rows {
            return;
        }
        *self = Self::new(cols, rows);
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    #[inline]
    fn index(&self, col: u32, row: u32) -> usize {
        (row * self.cols + col) as usize
    }

    /// Write one cell. Out-of-range coordinates are ignored.
    pub fn set_cell(
        &mut self,
        col: u32,
        row: u32,
        glyph: u16,
        fg: [u8; 4],
        bg: [u8; 4],
        attrs: CellAttrs,
    ) {
        if col >= self.cols || row >= self.rows {
            return;
        }
        let i = self.index(col, row);
        self.glyphs[i] = glyph;
        self.fg[i * 4..i * 4 + 4].copy_from_slice(&fg);
        self.bg[i * 4..i * 4 + 4].copy_from_slice(&bg);
        self.attrs[i] = attrs.bits();
    }

    /// Read one cell as `(glyph, fg, bg, attrs)`.
    pub fn cell(&self, col: u32, row: u32) -> Option<(u16, [u8; 4], [u8; 4], CellAttrs)> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        let i = self.index(col, row);
        Some((
            self.glyphs[i],
            self.fg[i * 4..i * 4 + 4].try_into().unwrap(),
            self.bg[i * 4..i * 4 + 4].try_into().unwrap(),
            CellAttrs::from_bits_truncate(self.attrs[i]),
        ))
    }

    //-------------------------------------------------------------------------
    // Widget cell reservation
    //-------------------------------------------------------------------------

    /// Mark the cells under a widget's cell rect with the decorator glyph,
    /// encoding the widget id in the fg color slot. Writes outside the grid
    /// are clipped.
    pub fn reserve_widget_cells(&mut self, rect: CellRect, widget_id: u32) {
        let fg = [
            ((widget_id >> 16) & 0xFF) as u8,
            ((widget_id >> 8) & 0xFF) as u8,
            (widget_id & 0xFF) as u8,
            255,
        ];
        self.for_each_clipped(rect, |grid, col, row| {
            grid.set_cell(
                col,
                row,
                GLYPH_DECORATOR,
                fg,
                [0, 0, 0, 255],
                CellAttrs::empty(),
            );
        });
    }

    /// Restore a widget's cells to spaces with default colors.
    pub fn clear_widget_cells(&mut self, rect: CellRect) {
        self.for_each_clipped(rect, |grid, col, row| {
            grid.set_cell(
                col,
                row,
                GLYPH_EMPTY,
                [255, 255, 255, 255],
                [0, 0, 0, 255],
                CellAttrs::empty(),
            );
        });
    }

    /// Decode the widget id stored in a decorator cell's fg slot.
    pub fn widget_id_at(&self, col: u32, row: u32) -> Option<u32> {
        let (glyph, fg, _, _) = self.cell(col, row)?;
        if glyph != GLYPH_DECORATOR {
            return None;
        }
        Some(((fg[0] as u32) << 16) | ((fg[1] as u32) << 8) | fg[2] as u32)
    }

    fn for_each_clipped(&mut self, rect: CellRect, mut f: impl FnMut(&mut Self, u32, u32)) {
        for row in rect.y..rect.y + rect.height {
            if row < 0 || row >= self.rows as i32 {
                continue;
            }
            for col in rect.x..rect.x + rect.width {
                if col < 0 || col >= self.cols as i32 {
                    continue;
                }
                f(self, col as u32, row as u32);
            }
        }
    }

    //-------------------------------------------------------------------------
    // Raw data for texture upload
    //-------------------------------------------------------------------------

    pub fn glyph_data(&self) -> &[u16] {
        &self.glyphs
    }

    pub fn fg_data(&self) -> &[u8] {
        &self.fg
    }

    pub fn bg_data(&self) -> &[u8] {
        &self.bg
    }

    pub fn attrs_data(&self) -> &[u8] {
        &self.attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_spaces_white_on_black() {
        let grid = Grid::new(4, 2);
        let (glyph, fg, bg, attrs) = grid.cell(0, 0).unwrap();
        assert_eq!(glyph, GLYPH_EMPTY);
        assert_eq!(fg, [255, 255, 255, 255]);
        assert_eq!(bg, [0, 0, 0, 255]);
        assert_eq!(attrs, CellAttrs::empty());
    }

    #[test]
    fn resize_to_same_size_keeps_contents() {
        let mut grid = Grid::new(4, 2);
        grid.set_cell(1, 1, 42, [1, 2, 3, 4], [5, 6, 7, 8], CellAttrs::BOLD);
        grid.resize(4, 2);
        assert_eq!(grid.cell(1, 1).unwrap().0, 42);
        grid.resize(8, 2);
        assert_eq!(grid.cell(1, 1).unwrap().0, GLYPH_EMPTY);
    }

    #[test]
    fn reserve_and_clear_round_trips_cells() {
        let mut grid = Grid::new(20, 10);
        let rect = CellRect::new(2, 3, 10, 5);
        grid.reserve_widget_cells(rect, 1);

        for col in 2..12 {
            for row in 3..8 {
                let (glyph, _, _, _) = grid.cell(col, row).unwrap();
                assert_eq!(glyph, GLYPH_DECORATOR);
                assert_eq!(grid.widget_id_at(col, row), Some(1));
            }
        }
        // Outside the rect untouched
        assert_eq!(grid.cell(1, 3).unwrap().0, GLYPH_EMPTY);

        grid.clear_widget_cells(rect);
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
    fn widget_id_encoding_uses_24_bits() {
        let mut grid = Grid::new(4, 4);
        grid.reserve_widget_cells(CellRect::new(0, 0, 1, 1), 0x00AB_CDEF);
        assert_eq!(grid.widget_id_at(0, 0), Some(0x00AB_CDEF));
    }

    #[test]
    fn reservation_clips_to_grid() {
        let mut grid = Grid::new(4, 4);
        // Extends past every edge; must not panic and must mark the overlap
        grid.reserve_widget_cells(CellRect::new(-2, -2, 8, 8), 7);
        assert_eq!(grid.widget_id_at(0, 0), Some(7));
        assert_eq!(grid.widget_id_at(3, 3), Some(7));
    }
}
