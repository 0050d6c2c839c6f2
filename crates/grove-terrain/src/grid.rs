//! Flat row-major 2D grid with bounds-checked accessors.
//!
//! Rows follow world Z and columns follow world X throughout the generator.

use std::ops::{Index, IndexMut};

/// A `rows x cols` grid stored in a single row-major buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Creates a grid with every cell set to `fill`.
    pub fn new(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            rows,
            cols,
            cells: vec![fill; rows * cols],
        }
    }

    /// Creates a square grid with every cell set to `fill`.
    pub fn square(size: usize, fill: T) -> Self {
        Self::new(size, size, fill)
    }

    /// Sets every cell of the inclusive rectangle starting at `(row, col)`,
    /// clipped to the grid.
    pub fn fill_rect(&mut self, row: usize, col: usize, row_extent: usize, col_extent: usize, value: T) {
        if row >= self.rows || col >= self.cols {
            return;
        }
        let last_row = row.saturating_add(row_extent).min(self.rows - 1);
        let last_col = col.saturating_add(col_extent).min(self.cols - 1);
        for r in row..=last_row {
            let start = self.index(r, col);
            let end = self.index(r, last_col);
            self.cells[start..=end].fill(value.clone());
        }
    }
}

impl<T> Grid<T> {
    /// Creates a grid by evaluating `f(row, col)` for every cell in row-major order.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(f(row, col));
            }
        }
        Self { rows, cols, cells }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns true if `(row, col)` lies inside the grid.
    #[inline]
    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Cell at `(row, col)`, or `None` outside the grid.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if self.in_bounds(row, col) {
            Some(&self.cells[self.index(row, col)])
        } else {
            None
        }
    }

    /// Mutable cell at `(row, col)`, or `None` outside the grid.
    #[inline]
    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        if self.in_bounds(row, col) {
            let idx = self.index(row, col);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    /// Returns true if `pred` holds for every cell of the inclusive rectangle
    /// starting at `(row, col)`. A rectangle leaving the grid fails.
    pub fn all_in_rect(
        &self,
        row: usize,
        col: usize,
        row_extent: usize,
        col_extent: usize,
        mut pred: impl FnMut(&T) -> bool,
    ) -> bool {
        let (Some(last_row), Some(last_col)) =
            (row.checked_add(row_extent), col.checked_add(col_extent))
        else {
            return false;
        };
        if !self.in_bounds(last_row, last_col) {
            return false;
        }
        (row..=last_row).all(|r| {
            let start = self.index(r, col);
            self.cells[start..=start + col_extent].iter().all(&mut pred)
        })
    }

    /// One row as a slice.
    ///
    /// # Panics
    ///
    /// Panics if `row >= rows`.
    pub fn row(&self, row: usize) -> &[T] {
        let start = self.index(row, 0);
        &self.cells[start..start + self.cols]
    }

    /// The underlying row-major buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    /// Iterates over all cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    /// Builds a new grid of the same shape by mapping every cell.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            cells: self.cells.iter().map(f).collect(),
        }
    }
}

impl<T: Copy> Grid<T> {
    /// One column copied into a vector.
    pub fn column(&self, col: usize) -> Vec<T> {
        (0..self.rows).map(|row| self[(row, col)]).collect()
    }
}

impl Grid<bool> {
    /// Number of `true` cells.
    pub fn count_true(&self) -> usize {
        self.cells.iter().filter(|&&v| v).count()
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(
            self.in_bounds(row, col),
            "grid access ({row}, {col}) outside {}x{}",
            self.rows,
            self.cols
        );
        &self.cells[Grid::index(self, row, col)]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(
            self.in_bounds(row, col),
            "grid access ({row}, {col}) outside {}x{}",
            self.rows,
            self.cols
        );
        let idx = Grid::index(self, row, col);
        &mut self.cells[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_is_row_major() {
        let grid = Grid::from_fn(2, 3, |r, c| r * 10 + c);
        assert_eq!(grid.as_slice(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(grid[(1, 2)], 12);
        assert_eq!(grid.row(1), &[10, 11, 12]);
        assert_eq!(grid.column(1), vec![1, 11]);
    }

    #[test]
    fn test_get_out_of_bounds_is_none() {
        let grid = Grid::square(4, 0u8);
        assert!(grid.get(3, 3).is_some());
        assert!(grid.get(4, 0).is_none());
        assert!(grid.get(0, 4).is_none());
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_index_out_of_bounds_panics() {
        let grid = Grid::square(4, 0u8);
        let _ = grid[(4, 0)];
    }

    #[test]
    fn test_fill_rect_is_inclusive_and_clipped() {
        let mut grid = Grid::square(5, false);
        grid.fill_rect(1, 1, 1, 2, true);
        assert_eq!(grid.count_true(), 2 * 3);
        assert!(grid[(2, 3)]);
        assert!(!grid[(3, 3)]);

        grid.fill_rect(3, 3, 10, 10, true);
        assert!(grid[(4, 4)]);
        assert_eq!(grid.count_true(), 6 + 4);
    }

    #[test]
    fn test_all_in_rect() {
        let mut grid = Grid::square(6, true);
        assert!(grid.all_in_rect(0, 0, 5, 5, |&v| v));
        assert!(!grid.all_in_rect(1, 1, 5, 0, |&v| v), "leaves the grid");
        grid[(3, 4)] = false;
        assert!(!grid.all_in_rect(2, 2, 2, 2, |&v| v));
        assert!(grid.all_in_rect(2, 2, 2, 1, |&v| v));
    }

    #[test]
    fn test_map_preserves_shape() {
        let grid = Grid::from_fn(3, 2, |r, c| (r + c) as f32);
        let mask = grid.map(|&v| v > 1.0);
        assert_eq!(mask.rows(), 3);
        assert_eq!(mask.cols(), 2);
        assert_eq!(mask.count_true(), 3);
    }
}
