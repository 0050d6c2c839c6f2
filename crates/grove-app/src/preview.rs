//! PNG export of generated chunks and colour atlases.

use std::path::Path;

use grove_config::ObjectCategory;
use grove_terrain::debug_viz::{render_heights, render_mask, save_png};
use grove_terrain::flatness_mask;
use grove_world::{ChunkData, HeadlessHost, Layer, WorldGenerator};

/// Write height, house flatness and occupancy previews for every chunk plus
/// every painted atlas into `dir`. Returns the number of files written.
pub fn export_all(world: &WorldGenerator<HeadlessHost>, dir: &Path) -> Result<usize, image::ImageError> {
    std::fs::create_dir_all(dir)?;
    let houses = &world.config().houses;
    let mut written = 0;

    for chunk in world.chunks().iter() {
        written += export_chunk(chunk, houses.flatness_radius, houses.flatness_sensitivity, dir)?;
    }
    for category in ObjectCategory::ALL {
        if let Some(atlas) = world.atlas(category) {
            atlas.save_with_format(
                dir.join(format!("atlas_{}.png", category.name())),
                image::ImageFormat::Png,
            )?;
            written += 1;
        }
    }
    Ok(written)
}

fn export_chunk(
    chunk: &ChunkData,
    flatness_radius: usize,
    flatness_sensitivity: f64,
    dir: &Path,
) -> Result<usize, image::ImageError> {
    let stem = format!("chunk_{}_{}", chunk.coord.x, chunk.coord.z);
    let heights = chunk.heights.values();
    let flat = flatness_mask(heights, flatness_radius, flatness_sensitivity);

    save_png(&render_heights(heights), &dir.join(format!("{stem}_height.png")))?;
    save_png(&render_mask(&flat), &dir.join(format!("{stem}_flat.png")))?;
    save_png(
        &render_mask(chunk.occupancy.layer(Layer::General)),
        &dir.join(format!("{stem}_general.png")),
    )?;
    save_png(
        &render_mask(chunk.occupancy.layer(Layer::Detail)),
        &dir.join(format!("{stem}_detail.png")),
    )?;
    Ok(4)
}
