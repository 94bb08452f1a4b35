//! Viewport diff engine
//!
//! Given the previously shown [`GridBounds`] and the newly computed ones, works out which
//! cells lost visibility and which gained it. A pan at constant zoom is handled with a
//! rectangle difference whose cost is proportional to the strips that changed, not to the
//! viewport area; a zoom change rebuilds everything since no cell survives it.

use crate::bounds::GridBounds;
use crate::projection::TileCoord;

/// Direction of a cell's visibility change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellDirection {
    Leaving,
    Entering,
}

/// One cell whose visibility changed, at the zoom it must be read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellChange {
    pub cell: TileCoord,
    pub zoom: u32,
    pub direction: CellDirection,
}

/// How a settled viewport relates to the shown one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportTransition {
    /// Same rectangle at the same zoom
    Unchanged,
    /// Same zoom, different rectangle
    Pan,
    /// Different zoom level
    Rezoom,
}

impl ViewportTransition {
    pub fn classify(old: &GridBounds, new: &GridBounds) -> Self {
        if old.zoom != new.zoom {
            Self::Rezoom
        } else if old.same_extent(new) {
            Self::Unchanged
        } else {
            Self::Pan
        }
    }
}

/// Visit every cell of `bounds`
pub fn for_each_cell(bounds: &GridBounds, mut visit: impl FnMut(TileCoord)) {
    for x in bounds.min_x..=bounds.max_x {
        for y in bounds.min_y..=bounds.max_y {
            visit(TileCoord::new(x, y));
        }
    }
}

/// Visit every cell of `from` that is not in `minus`, exactly once
///
/// `from \ minus` is decomposed into full-width strips above and below `minus`, then
/// the parts left and right of it within the rows both rectangles share.
pub fn rectangle_diff(from: &GridBounds, minus: &GridBounds, mut visit: impl FnMut(TileCoord)) {
    for x in from.min_x..=from.max_x {
        for y in from.min_y..=from.max_y.min(minus.min_y - 1) {
            visit(TileCoord::new(x, y));
        }
        for y in from.min_y.max(minus.max_y + 1)..=from.max_y {
            visit(TileCoord::new(x, y));
        }
    }

    for y in from.min_y.max(minus.min_y)..=from.max_y.min(minus.max_y) {
        for x in from.min_x..=from.max_x.min(minus.min_x - 1) {
            visit(TileCoord::new(x, y));
        }
        for x in from.min_x.max(minus.max_x + 1)..=from.max_x {
            visit(TileCoord::new(x, y));
        }
    }
}

/// Drive `visit` over every cell whose visibility changes between `old` and `new`
///
/// All leaving cells are reported before any entering cell. Entering cells are only
/// reported when `reveal_entering` is set (a hidden layer materialises nothing).
pub fn apply_transition(
    old: &GridBounds,
    new: &GridBounds,
    reveal_entering: bool,
    mut visit: impl FnMut(CellChange),
) -> ViewportTransition {
    let transition = ViewportTransition::classify(old, new);
    match transition {
        ViewportTransition::Unchanged => {}
        ViewportTransition::Rezoom => {
            tracing::debug!(
                from = old.zoom,
                to = new.zoom,
                leaving = old.cell_count(),
                entering = new.cell_count(),
                "Zoom changed; rebuilding shown cells"
            );
            for_each_cell(old, |cell| {
                visit(CellChange {
                    cell,
                    zoom: old.zoom,
                    direction: CellDirection::Leaving,
                })
            });
            if reveal_entering {
                for_each_cell(new, |cell| {
                    visit(CellChange {
                        cell,
                        zoom: new.zoom,
                        direction: CellDirection::Entering,
                    })
                });
            }
        }
        ViewportTransition::Pan => {
            tracing::debug!(?old, ?new, "Viewport panned; diffing shown cells");
            rectangle_diff(old, new, |cell| {
                visit(CellChange {
                    cell,
                    zoom: old.zoom,
                    direction: CellDirection::Leaving,
                })
            });
            if reveal_entering {
                rectangle_diff(new, old, |cell| {
                    visit(CellChange {
                        cell,
                        zoom: new.zoom,
                        direction: CellDirection::Entering,
                    })
                });
            }
        }
    }
    transition
}
