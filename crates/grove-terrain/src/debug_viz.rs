//! Greyscale PNG previews of height grids, noise maps and placement masks.

use std::path::Path;

use image::{GrayImage, Luma};

use crate::grid::Grid;

/// Render values in `[min, max]` as greyscale; column maps to x, row to y.
pub fn render_values(values: &Grid<f32>, min: f32, max: f32) -> GrayImage {
    let span = max - min;
    GrayImage::from_fn(values.cols() as u32, values.rows() as u32, |x, y| {
        let v = values[(y as usize, x as usize)];
        let t = if span > 0.0 {
            ((v - min) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Luma([(t * 255.0).round() as u8])
    })
}

/// Render a normalized height grid, 0 black and 1 white.
pub fn render_heights(heights: &Grid<f32>) -> GrayImage {
    render_values(heights, 0.0, 1.0)
}

/// Render a boolean mask, `true` white.
pub fn render_mask(mask: &Grid<bool>) -> GrayImage {
    GrayImage::from_fn(mask.cols() as u32, mask.rows() as u32, |x, y| {
        Luma([if mask[(y as usize, x as usize)] { 255 } else { 0 }])
    })
}

/// Write a preview image as PNG.
pub fn save_png(image: &GrayImage, path: &Path) -> Result<(), image::ImageError> {
    image.save_with_format(path, image::ImageFormat::Png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_heights_dimensions_and_orientation() {
        let heights = Grid::from_fn(2, 3, |r, c| if r == 1 && c == 2 { 1.0 } else { 0.0 });
        let image = render_heights(&heights);
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [255]);
        assert_eq!(image.get_pixel(0, 0).0, [0]);
    }

    #[test]
    fn test_render_values_degenerate_range() {
        let values = Grid::square(2, 5.0f32);
        let image = render_values(&values, 5.0, 5.0);
        assert!(image.pixels().all(|p| p.0 == [0]));
    }

    #[test]
    fn test_render_mask() {
        let mut mask = Grid::square(3, false);
        mask[(0, 1)] = true;
        let image = render_mask(&mask);
        assert_eq!(image.get_pixel(1, 0).0, [255]);
        assert_eq!(image.get_pixel(0, 1).0, [0]);
    }

    #[test]
    fn test_save_png_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heights.png");
        save_png(&render_heights(&Grid::square(4, 0.5)), &path).unwrap();
        let loaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(loaded.dimensions(), (4, 4));
        assert_eq!(loaded.get_pixel(0, 0).0, [128]);
    }
}
