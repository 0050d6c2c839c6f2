//! Per-category colour atlases painted in bounded batches on the misc queue.

use grove_config::{ObjectCategory, Palette};
use image::{Rgba, RgbaImage};

use crate::generator::GenerationContext;
use crate::host::WorldHost;
use crate::scheduler::{Spawner, Step, Task};

/// Colour of pixel `(x, y)` in a four-quadrant atlas of side `size`.
///
/// Image rows grow downward, so the primary and secondary colours fill the
/// bottom half.
pub fn quadrant_colour(palette: &Palette, size: u32, x: u32, y: u32) -> [u8; 4] {
    let half = size / 2;
    match (x < half, y < half) {
        (true, false) => palette.primary,
        (false, false) => palette.secondary,
        (true, true) => palette.tertiary,
        (false, true) => palette.quaternary,
    }
}

/// Paints one category's atlas, an eighth of the pixels per step.
pub struct ColourAtlasTask {
    category: ObjectCategory,
    palette: Palette,
    image: RgbaImage,
    cursor: u32,
    batch: u32,
    label: String,
}

impl ColourAtlasTask {
    pub fn new(category: ObjectCategory, palette: Palette, size: u32) -> Self {
        let size = size.max(2);
        Self {
            category,
            palette,
            image: RgbaImage::new(size, size),
            cursor: 0,
            batch: (size * size / 8).max(1),
            label: format!("{} atlas", category.name()),
        }
    }

    /// Paint the next batch. Returns true once every pixel is painted.
    pub fn paint_batch(&mut self) -> bool {
        let size = self.image.width();
        let total = size * size;
        let end = (self.cursor + self.batch).min(total);
        for i in self.cursor..end {
            let (x, y) = (i % size, i / size);
            self.image
                .put_pixel(x, y, Rgba(quadrant_colour(&self.palette, size, x, y)));
        }
        self.cursor = end;
        self.cursor == total
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl<H: WorldHost> Task<GenerationContext<H>> for ColourAtlasTask {
    fn label(&self) -> &str {
        &self.label
    }

    fn step(&mut self, ctx: &mut GenerationContext<H>, _: &mut Spawner<GenerationContext<H>>) -> Step {
        if !self.paint_batch() {
            return Step::Yield;
        }
        ctx.atlases
            .insert(self.category, std::mem::take(&mut self.image));
        Step::Done
    }
}
