//! Facet Grid Planner.

use crate::error::{FacetError, Result};
use crate::group::GroupValues;

/// Subplot grid dimensions. `nwrap` is zero unless the grid packs wrap values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub nrow: usize,
    pub ncol: usize,
    pub nwrap: usize,
}

impl GridShape {
    pub fn is_wrap(&self) -> bool {
        self.nwrap > 0
    }

    pub fn n_cells(&self) -> usize {
        self.nrow * self.ncol
    }

    /// Row-major position of a cell.
    pub fn linear_index(&self, ir: usize, ic: usize) -> usize {
        ir * self.ncol + ic
    }

    /// 1-based subplot number, as rendering backends count them.
    pub fn plot_num(&self, ir: usize, ic: usize) -> usize {
        self.linear_index(ir, ic) + 1
    }

    /// Whether a wrap-grid cell sits past the last wrap value.
    pub fn is_trailing_empty(&self, ir: usize, ic: usize) -> bool {
        self.is_wrap() && self.linear_index(ir, ic) >= self.nwrap
    }

    /// All `(row, col)` cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let ncol = self.ncol;
        (0..self.n_cells()).map(move |i| (i / ncol, i % ncol))
    }
}

/// Near-square packing for `n` panels: `ncol = ceil(sqrt(n))`.
pub fn wrap_dimensions(n_panels: usize) -> (usize, usize) {
    if n_panels == 0 {
        return (0, 0);
    }
    let cols = (n_panels as f64).sqrt().ceil() as usize;
    let rows = (n_panels as f64 / cols as f64).ceil() as usize;
    (rows, cols)
}

/// Compute the grid for the active groupings. Wrap takes precedence over row/col.
pub fn plan_grid(
    wrap: Option<&GroupValues>,
    row: Option<&GroupValues>,
    col: Option<&GroupValues>,
) -> Result<GridShape> {
    let shape = match wrap {
        Some(w) => {
            let (nrow, ncol) = wrap_dimensions(w.len());
            GridShape {
                nrow,
                ncol,
                nwrap: w.len(),
            }
        }
        None => GridShape {
            nrow: row.map(|r| r.len()).unwrap_or(1),
            ncol: col.map(|c| c.len()).unwrap_or(1),
            nwrap: 0,
        },
    };

    if shape.nrow == 0 {
        return Err(FacetError::EmptyGrid("rows"));
    }
    if shape.ncol == 0 {
        return Err(FacetError::EmptyGrid("columns"));
    }
    Ok(shape)
}
