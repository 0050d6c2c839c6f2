//! Seeded multi-octave coherent noise sampled on an integer cell lattice.
//!
//! Each octave gets its own pseudo-random lattice offset drawn from the seed,
//! so two fields with the same parameters produce identical grids and two
//! adjacent chunks sampled at adjacent cell origins agree on every shared cell.

use grove_config::NoiseParameters;
use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::grid::Grid;

/// Octave offsets are drawn from `[-OCTAVE_OFFSET_RANGE, OCTAVE_OFFSET_RANGE)`.
pub const OCTAVE_OFFSET_RANGE: i64 = 100_000;

/// Grid of raw noise samples, each in `[0, amplitude_sum]`.
pub type NoiseMap = Grid<f32>;

/// Integer cell origin of a sampled grid in the shared noise lattice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CellOffset {
    /// Lattice row of grid row 0 (world Z direction).
    pub row: i64,
    /// Lattice column of grid column 0 (world X direction).
    pub col: i64,
}

impl CellOffset {
    pub const ZERO: Self = Self { row: 0, col: 0 };

    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Offset shifted by `(d_row, d_col)` cells.
    pub fn shifted(self, d_row: i64, d_col: i64) -> Self {
        Self {
            row: self.row + d_row,
            col: self.col + d_col,
        }
    }
}

/// Fractal noise generator built from [`NoiseParameters`].
///
/// Parameters are sanitized on construction: non-positive scale, persistence or
/// lacunarity are replaced by [`NoiseParameters::MIN_POSITIVE`] and at least one
/// octave is always sampled.
#[derive(Clone, Debug)]
pub struct NoiseField {
    params: NoiseParameters,
    perlin: Perlin,
    octave_offsets: Vec<(i64, i64)>,
}

impl NoiseField {
    pub fn new(params: &NoiseParameters) -> Self {
        let params = params.sanitized();
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let octave_offsets = (0..params.octaves)
            .map(|_| {
                (
                    rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE),
                    rng.random_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE),
                )
            })
            .collect();
        Self {
            perlin: Perlin::new(fold_seed(params.seed)),
            params,
            octave_offsets,
        }
    }

    /// The sanitized parameters this field samples with.
    pub fn params(&self) -> &NoiseParameters {
        &self.params
    }

    /// Upper bound of any sample: the sum of all octave amplitudes.
    pub fn amplitude_sum(&self) -> f64 {
        self.params.amplitude_sum()
    }

    /// Sample the field at an absolute lattice cell.
    ///
    /// Offsets are subtracted in integer space before conversion, so the same
    /// cell yields bit-identical values regardless of which grid it belongs to.
    pub fn value_at(&self, row: i64, col: i64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;

        for &(offset_row, offset_col) in &self.octave_offsets {
            let sample_row = (row - offset_row) as f64 / self.params.scale * frequency;
            let sample_col = (col - offset_col) as f64 / self.params.scale * frequency;
            total += coherent(&self.perlin, sample_row, sample_col) * amplitude;

            amplitude *= self.params.persistence;
            frequency *= self.params.lacunarity;
        }

        total
    }

    /// Sample a `resolution x resolution` grid whose cell `(0, 0)` is `origin`.
    pub fn sample(&self, resolution: usize, origin: CellOffset) -> NoiseMap {
        self.sample_rect(resolution, resolution, origin)
    }

    /// Sample a `rows x cols` grid whose cell `(0, 0)` is `origin`.
    pub fn sample_rect(&self, rows: usize, cols: usize, origin: CellOffset) -> NoiseMap {
        Grid::from_fn(rows, cols, |r, c| {
            self.value_at(origin.row + r as i64, origin.col + c as i64) as f32
        })
    }
}

/// One-shot helper: build a field from `params` and sample a square grid.
pub fn sample_noise(params: &NoiseParameters, resolution: usize, origin: CellOffset) -> NoiseMap {
    NoiseField::new(params).sample(resolution, origin)
}

/// Perlin noise remapped from roughly `[-1, 1]` into `[0, 1]`.
#[inline]
fn coherent(perlin: &Perlin, x: f64, y: f64) -> f64 {
    (perlin.get([x, y]) * 0.5 + 0.5).clamp(0.0, 1.0)
}

fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}
