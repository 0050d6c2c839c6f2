//! Normalized height grids for a single chunk.
//!
//! The builder samples a grid padded by one cell on every side, then collapses
//! the padding so that the last row/column of one chunk and the first
//! row/column of its neighbour hold the same lattice samples. Chunks placed on
//! a stride of `resolution + 1` cells therefore meet without seams.

use glam::DVec2;
use grove_config::{HeightNormalization, MapConfig};
use tracing::trace;

use crate::grid::Grid;
use crate::noise_field::{CellOffset, NoiseField};

/// Heights of one chunk, normalized and shaped, each in `[0, height_multiplier]`.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightGrid {
    values: Grid<f32>,
    origin: DVec2,
}

impl HeightGrid {
    pub fn new(values: Grid<f32>, origin: DVec2) -> Self {
        Self { values, origin }
    }

    /// Cells per side.
    pub fn resolution(&self) -> usize {
        self.values.rows()
    }

    /// World-space (x, z) corner of the chunk.
    pub fn origin(&self) -> DVec2 {
        self.origin
    }

    pub fn values(&self) -> &Grid<f32> {
        &self.values
    }

    /// Height at `(row, col)`.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.values[(row, col)]
    }

    /// Bilinear height at normalized chunk coordinates, `u` along columns
    /// (world X) and `v` along rows (world Z). Inputs are clamped to `[0, 1]`.
    pub fn sample_normalized(&self, u: f64, v: f64) -> f64 {
        let last = self.resolution().saturating_sub(1);
        if last == 0 {
            return self.values.get(0, 0).copied().unwrap_or(0.0) as f64;
        }
        let fc = u.clamp(0.0, 1.0) * last as f64;
        let fr = v.clamp(0.0, 1.0) * last as f64;
        let c0 = (fc.floor() as usize).min(last - 1);
        let r0 = (fr.floor() as usize).min(last - 1);
        let tc = fc - c0 as f64;
        let tr = fr - r0 as f64;

        let h00 = self.at(r0, c0) as f64;
        let h01 = self.at(r0, c0 + 1) as f64;
        let h10 = self.at(r0 + 1, c0) as f64;
        let h11 = self.at(r0 + 1, c0 + 1) as f64;
        let top = h00 + (h01 - h00) * tc;
        let bottom = h10 + (h11 - h10) * tc;
        top + (bottom - top) * tr
    }
}

/// Builds [`HeightGrid`]s from a [`MapConfig`].
///
/// One builder is shared by every chunk of a world so that all of them use the
/// same noise field and, for global normalization, the same range.
#[derive(Clone, Debug)]
pub struct HeightmapBuilder {
    field: NoiseField,
    resolution: usize,
    normalization: HeightNormalization,
    map: MapConfig,
}

impl HeightmapBuilder {
    pub fn new(map: &MapConfig) -> Self {
        Self {
            field: NoiseField::new(&map.noise),
            resolution: map.resolution,
            normalization: map.normalization,
            map: map.clone(),
        }
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn field(&self) -> &NoiseField {
        &self.field
    }

    /// Build the height grid whose cell `(0, 0)` sits at lattice cell `origin`.
    pub fn build(&self, origin: CellOffset, world_origin: DVec2) -> HeightGrid {
        let padded = self
            .field
            .sample(self.resolution + 2, origin.shifted(-1, -1));
        let raw = collapse_padded(&padded);
        let (min, max) = self.range(&raw);
        trace!(
            row = origin.row,
            col = origin.col,
            min,
            max,
            "normalizing height grid"
        );

        let values = raw.map(|&v| {
            let t = inverse_lerp(min, max, v as f64);
            (self.map.height_curve.evaluate(t) * self.map.height_multiplier) as f32
        });
        HeightGrid::new(values, world_origin)
    }

    /// Raw range mapped onto `[0, 1]` for `raw`.
    pub fn range(&self, raw: &Grid<f32>) -> (f64, f64) {
        match self.normalization {
            HeightNormalization::Local => {
                let (min, max) = raw
                    .iter()
                    .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    });
                if min > max {
                    (0.0, 0.0)
                } else {
                    (min as f64, max as f64)
                }
            }
            HeightNormalization::Theoretical => (0.0, self.field.amplitude_sum()),
            HeightNormalization::Fixed { min, max } => (min, max),
        }
    }
}

/// Collapse a `(R + 2)`-sided padded sample into `R` cells per side.
///
/// Output index 0 takes padded index 0, output index `R - 1` takes padded
/// index `R + 1`, and every interior index `i` takes padded index `i + 1`.
pub fn collapse_padded(padded: &Grid<f32>) -> Grid<f32> {
    let resolution = padded.rows().saturating_sub(2);
    let source = |i: usize| {
        if i == 0 {
            0
        } else if i + 1 == resolution {
            resolution + 1
        } else {
            i + 1
        }
    };
    Grid::from_fn(resolution, resolution, |r, c| padded[(source(r), source(c))])
}

/// Clamped inverse linear interpolation; a degenerate range maps to 0.
#[inline]
pub fn inverse_lerp(min: f64, max: f64, value: f64) -> f64 {
    if max == min {
        0.0
    } else {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_config::{CurveKey, HeightCurve, NoiseParameters};

    fn map(resolution: usize, normalization: HeightNormalization) -> MapConfig {
        MapConfig {
            resolution,
            normalization,
            noise: NoiseParameters {
                seed: 42,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.0,
                scale: 20.0,
            },
            ..MapConfig::default()
        }
    }

    /// Lattice origin of the chunk at `(x, z)` on a `resolution + 1` stride.
    fn chunk_origin(x: i64, z: i64, resolution: usize) -> CellOffset {
        let stride = resolution as i64 + 1;
        CellOffset::new(z * stride, x * stride)
    }

    #[test]
    fn test_collapse_padded_edges() {
        let padded = Grid::from_fn(6, 6, |r, c| (r * 10 + c) as f32);
        let collapsed = collapse_padded(&padded);
        assert_eq!(collapsed.rows(), 4);
        assert_eq!(collapsed[(0, 0)], 0.0);
        assert_eq!(collapsed[(0, 3)], 5.0);
        assert_eq!(collapsed[(1, 1)], 22.0);
        assert_eq!(collapsed[(2, 2)], 33.0);
        assert_eq!(collapsed[(3, 3)], 55.0);
    }

    #[test]
    fn test_inverse_lerp() {
        assert_eq!(inverse_lerp(0.0, 2.0, 1.0), 0.5);
        assert_eq!(inverse_lerp(0.0, 2.0, 3.0), 1.0);
        assert_eq!(inverse_lerp(0.0, 2.0, -1.0), 0.0);
        assert_eq!(inverse_lerp(1.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = HeightmapBuilder::new(&map(65, HeightNormalization::Theoretical));
        let a = builder.build(CellOffset::ZERO, DVec2::ZERO);
        let b = HeightmapBuilder::new(&map(65, HeightNormalization::Theoretical))
            .build(CellOffset::ZERO, DVec2::ZERO);
        assert_eq!(a, b);
        assert_eq!(a.resolution(), 65);
    }

    #[test]
    fn test_reference_terrain_is_reproducible() {
        let config = MapConfig {
            resolution: 513,
            noise: NoiseParameters {
                seed: 42,
                octaves: 1,
                persistence: 0.5,
                lacunarity: 1.8,
                scale: 50.0,
            },
            height_curve: HeightCurve::linear(),
            height_multiplier: 1.0,
            ..MapConfig::default()
        };
        let first = HeightmapBuilder::new(&config).build(CellOffset::ZERO, DVec2::ZERO);
        let second = HeightmapBuilder::new(&config).build(CellOffset::ZERO, DVec2::ZERO);
        assert_eq!(first.resolution(), 513);
        assert_eq!(first, second);
        assert!(first.values().iter().all(|v| (0.0..=1.0).contains(v)));

        // Recorded heights: corners, centre, edge midpoints and the far seam row.
        let recorded = [
            ((0, 0), 0x3ef3_605e),
            ((0, 512), 0x3e6c_ac03),
            ((512, 0), 0x3eff_7d72),
            ((512, 512), 0x3f35_5897),
            ((256, 256), 0x3f58_dfab),
            ((1, 1), 0x3ef6_29ad),
            ((100, 300), 0x3e77_c833),
            ((0, 256), 0x3f52_8d3e),
            ((256, 0), 0x3f1d_386f),
            ((256, 512), 0x3f0e_e595),
            ((512, 256), 0x3ec9_dc68),
        ];
        for ((row, col), bits) in recorded {
            assert_eq!(
                first.at(row, col).to_bits(),
                bits,
                "height at ({row}, {col}) is {}",
                first.at(row, col)
            );
        }

        let checksum: f64 = first.values().iter().map(|&v| v as f64).sum();
        assert_eq!(checksum.to_bits(), 0x4100_16e7_b6dd_229e, "checksum {checksum}");
    }

    #[test]
    fn test_theoretical_values_in_unit_range() {
        let builder = HeightmapBuilder::new(&map(33, HeightNormalization::Theoretical));
        let grid = builder.build(CellOffset::new(-500, 900), DVec2::ZERO);
        assert!(grid.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_local_normalization_spans_unit_range() {
        let builder = HeightmapBuilder::new(&map(33, HeightNormalization::Local));
        let grid = builder.build(CellOffset::ZERO, DVec2::ZERO);
        let min = grid.values().iter().copied().fold(f32::INFINITY, f32::min);
        let max = grid.values().iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn test_fixed_normalization_clamps() {
        let builder = HeightmapBuilder::new(&map(
            17,
            HeightNormalization::Fixed { min: 10.0, max: 20.0 },
        ));
        let grid = builder.build(CellOffset::ZERO, DVec2::ZERO);
        assert!(grid.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_curve_and_multiplier_applied() {
        let mut config = map(17, HeightNormalization::Theoretical);
        config.height_curve = HeightCurve {
            keys: vec![
                CurveKey { t: 0.0, value: 0.5 },
                CurveKey { t: 1.0, value: 0.5 },
            ],
        };
        config.height_multiplier = 2.0;
        let grid = HeightmapBuilder::new(&config).build(CellOffset::ZERO, DVec2::ZERO);
        assert!(grid.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_adjacent_chunks_share_edges() {
        let resolution = 33;
        let builder = HeightmapBuilder::new(&map(resolution, HeightNormalization::Theoretical));
        let origin = builder.build(chunk_origin(0, 0, resolution), DVec2::ZERO);
        let right = builder.build(chunk_origin(1, 0, resolution), DVec2::ZERO);
        let top = builder.build(chunk_origin(0, 1, resolution), DVec2::ZERO);

        assert_eq!(origin.values().column(resolution - 1), right.values().column(0));
        assert_eq!(origin.values().row(resolution - 1), top.values().row(0));
    }

    #[test]
    fn test_sample_normalized_corners_and_midpoint() {
        let values = Grid::from_fn(3, 3, |r, c| (r * 3 + c) as f32);
        let grid = HeightGrid::new(values, DVec2::ZERO);
        assert_eq!(grid.sample_normalized(0.0, 0.0), 0.0);
        assert_eq!(grid.sample_normalized(1.0, 0.0), 2.0);
        assert_eq!(grid.sample_normalized(0.0, 1.0), 6.0);
        assert_eq!(grid.sample_normalized(1.0, 1.0), 8.0);
        assert!((grid.sample_normalized(0.25, 0.5) - 3.5).abs() < 1e-9);
        assert_eq!(grid.sample_normalized(-3.0, 7.0), 6.0);
    }
}
