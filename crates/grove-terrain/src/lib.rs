//! Terrain sampling: seeded fractal noise, seamless chunk height grids and
//! flat-area masks for object placement.

mod flatness;
mod grid;
mod heightmap;
mod noise_field;

pub mod debug_viz;

pub use flatness::flatness_mask;
pub use grid::Grid;
pub use heightmap::{HeightGrid, HeightmapBuilder, collapse_padded, inverse_lerp};
pub use noise_field::{CellOffset, NoiseField, NoiseMap, OCTAVE_OFFSET_RANGE, sample_noise};
