//! Grid and damage behavior across mutations, as the renderer consumes it.

use yetty_core::geometry::CellRect;
use yetty_grid::{CellAttrs, Damage, DamageRect, Grid, GLYPH_DECORATOR, GLYPH_EMPTY};

#[test]
fn single_cell_mutation_produces_single_cell_damage() {
    let mut grid = Grid::new(80, 24);
    let mut damage = Damage::none();

    grid.set_cell(
        3,
        5,
        42,
        [255, 255, 255, 255],
        [0, 0, 0, 255],
        CellAttrs::empty(),
    );
    damage.add_cell(3, 5);

    match &damage {
        Damage::Rects(rects) => {
            assert_eq!(rects.len(), 1);
            assert_eq!(
                rects[0],
                DamageRect {
                    start_col: 3,
                    start_row: 5,
                    end_col: 4,
                    end_row: 6,
                }
            );
        }
        Damage::Full => panic!("expected a rect list"),
    }

    // Adjacent writes extend the same rect instead of growing the list
    grid.set_cell(
        4,
        5,
        43,
        [255, 255, 255, 255],
        [0, 0, 0, 255],
        CellAttrs::empty(),
    );
    damage.add_cell(4, 5);
    match &damage {
        Damage::Rects(rects) => assert_eq!(rects.len(), 1),
        Damage::Full => panic!("expected a rect list"),
    }
}

#[test]
fn parallel_arrays_stay_in_lockstep_through_resize() {
    let mut grid = Grid::new(10, 4);
    let n = (grid.cols() * grid.rows()) as usize;
    assert_eq!(grid.glyph_data().len(), n);
    assert_eq!(grid.fg_data().len(), n * 4);
    assert_eq!(grid.bg_data().len(), n * 4);
    assert_eq!(grid.attrs_data().len(), n);

    grid.resize(33, 7);
    let n = (33 * 7) as usize;
    assert_eq!(grid.glyph_data().len(), n);
    assert_eq!(grid.fg_data().len(), n * 4);
    assert_eq!(grid.bg_data().len(), n * 4);
    assert_eq!(grid.attrs_data().len(), n);
}

#[test]
fn decorator_cells_never_alias_text() {
    let mut grid = Grid::new(20, 20);
    grid.set_cell(
        5,
        5,
        7,
        [200, 200, 200, 255],
        [0, 0, 0, 255],
        CellAttrs::BOLD,
    );

    grid.reserve_widget_cells(CellRect::new(4, 4, 4, 4), 9);
    // The text cell under the widget became a decorator cell
    let (glyph, _, _, attrs) = grid.cell(5, 5).unwrap();
    assert_eq!(glyph, GLYPH_DECORATOR);
    assert_eq!(attrs, CellAttrs::empty());
    assert_eq!(grid.widget_id_at(5, 5), Some(9));

    // Restoring brings back a space, not the old character
    grid.clear_widget_cells(CellRect::new(4, 4, 4, 4));
    assert_eq!(grid.cell(5, 5).unwrap().0, GLYPH_EMPTY);
    assert_eq!(grid.widget_id_at(5, 5), None);
}

#[test]
fn overlapping_reservations_last_writer_wins() {
    let mut grid = Grid::new(20, 20);
    grid.reserve_widget_cells(CellRect::new(0, 0, 6, 6), 1);
    grid.reserve_widget_cells(CellRect::new(3, 3, 6, 6), 2);

    assert_eq!(grid.widget_id_at(1, 1), Some(1));
    assert_eq!(grid.widget_id_at(4, 4), Some(2));
    assert_eq!(grid.widget_id_at(8, 8), Some(2));
}

#[test]
fn full_damage_swallows_rects_and_survives_clear() {
    let mut damage = Damage::none();
    damage.add_cell(1, 1);
    damage.mark_full();
    damage.add_cell(2, 2);
    assert_eq!(damage, Damage::Full);

    damage.clear();
    assert!(damage.is_empty());
    assert_eq!(damage, Damage::none());
}
