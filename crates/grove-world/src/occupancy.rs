//! Per-chunk placability layers.

use grove_terrain::Grid;

/// Which placability layer a query refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Object footprints. Cleared zones around buildings also land here.
    General,
    /// Ground cover beneath and between objects.
    Detail,
}

/// Inclusive rectangle extent: a footprint at `(row, col)` covers
/// `row..=row + rows` and `col..=col + cols`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Footprint {
    pub rows: usize,
    pub cols: usize,
}

impl Footprint {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

/// Two parallel boolean layers, `true` meaning free.
///
/// Cells only ever go from free to taken.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupancyGrid {
    general: Grid<bool>,
    detail: Grid<bool>,
}

impl OccupancyGrid {
    /// All cells free.
    pub fn new(resolution: usize) -> Self {
        Self {
            general: Grid::square(resolution, true),
            detail: Grid::square(resolution, true),
        }
    }

    pub fn layer(&self, layer: Layer) -> &Grid<bool> {
        match layer {
            Layer::General => &self.general,
            Layer::Detail => &self.detail,
        }
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut Grid<bool> {
        match layer {
            Layer::General => &mut self.general,
            Layer::Detail => &mut self.detail,
        }
    }

    /// Returns true if every cell of the footprint is inside the grid and free.
    pub fn is_free(&self, layer: Layer, row: usize, col: usize, footprint: Footprint) -> bool {
        self.layer(layer)
            .all_in_rect(row, col, footprint.rows, footprint.cols, |&free| free)
    }

    /// Mark the footprint taken, clipped to the grid.
    pub fn claim(&mut self, layer: Layer, row: usize, col: usize, footprint: Footprint) {
        self.layer_mut(layer)
            .fill_rect(row, col, footprint.rows, footprint.cols, false);
    }

    /// Mark the square of `radius` cells around `(row, col)` taken, clipped to the grid.
    pub fn block_square(&mut self, layer: Layer, row: usize, col: usize, radius: usize) {
        let top = row.saturating_sub(radius);
        let left = col.saturating_sub(radius);
        let rows = row + radius - top;
        let cols = col + radius - left;
        self.layer_mut(layer).fill_rect(top, left, rows, cols, false);
    }

    pub fn is_cell_free(&self, layer: Layer, row: usize, col: usize) -> bool {
        self.layer(layer).get(row, col).copied().unwrap_or(false)
    }

    /// Number of free cells in a layer.
    pub fn free_count(&self, layer: Layer) -> usize {
        self.layer(layer).count_true()
    }
}
