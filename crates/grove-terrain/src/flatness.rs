//! Flat-area masks used to gate object placement.

use crate::grid::Grid;

/// Marks every cell whose `(2 * radius + 1)`-square neighbourhood stays within
/// `sensitivity` of the cell's own height.
///
/// Cells closer than `radius` to any border are never flat. A non-positive
/// sensitivity marks nothing, since the strict comparison fails even for the
/// cell itself.
pub fn flatness_mask(heights: &Grid<f32>, radius: usize, sensitivity: f64) -> Grid<bool> {
    let (rows, cols) = (heights.rows(), heights.cols());
    let mut mask = Grid::new(rows, cols, false);
    if rows <= 2 * radius || cols <= 2 * radius {
        return mask;
    }

    let sensitivity = sensitivity as f32;
    for row in radius..rows - radius {
        for col in radius..cols - radius {
            let centre = heights[(row, col)];
            mask[(row, col)] = heights.all_in_rect(
                row - radius,
                col - radius,
                2 * radius,
                2 * radius,
                |&h| (centre - h).abs() < sensitivity,
            );
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_grid_is_flat_inside_border() {
        let heights = Grid::square(10, 0.3f32);
        let mask = flatness_mask(&heights, 2, 0.01);
        assert_eq!(mask.count_true(), 6 * 6);
        assert!(!mask[(1, 5)]);
        assert!(!mask[(5, 8)]);
        assert!(mask[(2, 2)]);
        assert!(mask[(7, 7)]);
    }

    #[test]
    fn test_bump_excludes_neighbourhood() {
        let mut heights = Grid::square(11, 0.0f32);
        heights[(5, 5)] = 1.0;
        let mask = flatness_mask(&heights, 1, 0.1);
        for row in 4..=6 {
            for col in 4..=6 {
                assert!(!mask[(row, col)], "({row}, {col}) should not be flat");
            }
        }
        assert!(mask[(3, 3)]);
        assert!(mask[(7, 5)]);
    }

    #[test]
    fn test_radius_zero_needs_positive_sensitivity() {
        let heights = Grid::square(4, 0.5f32);
        assert_eq!(flatness_mask(&heights, 0, 0.001).count_true(), 16);
        assert_eq!(flatness_mask(&heights, 0, 0.0).count_true(), 0);
    }

    #[test]
    fn test_radius_larger_than_grid() {
        let heights = Grid::square(4, 0.5f32);
        assert_eq!(flatness_mask(&heights, 2, 1.0).count_true(), 0);
    }

    #[test]
    fn test_slope_within_sensitivity() {
        let heights = Grid::from_fn(8, 8, |_, c| c as f32 * 0.001);
        let loose = flatness_mask(&heights, 1, 0.0015);
        let tight = flatness_mask(&heights, 1, 0.0005);
        assert_eq!(loose.count_true(), 6 * 6);
        assert_eq!(tight.count_true(), 0);
    }
}
