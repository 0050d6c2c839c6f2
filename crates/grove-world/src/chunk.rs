//! Chunk identity and per-chunk generation state.

use std::sync::Arc;

use glam::{DVec2, DVec3};
use grove_config::ObjectCategory;
use grove_terrain::{CellOffset, HeightGrid};

use crate::host::ObjectHandle;
use crate::occupancy::OccupancyGrid;
use crate::village::VillageData;

/// Integer grid coordinate of a chunk. `x` follows world X, `z` world Z.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i64,
    pub z: i64,
}

/// The 4 orthogonal then 4 diagonal neighbour offsets `(dx, dz)`.
pub const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, 0),
    (1, 0),
    (0, 1),
    (0, -1),
    (-1, 1),
    (1, 1),
    (-1, -1),
    (1, -1),
];

impl ChunkCoord {
    pub const ORIGIN: Self = Self { x: 0, z: 0 };

    pub fn new(x: i64, z: i64) -> Self {
        Self { x, z }
    }

    /// Coordinate offset by `(dx, dz)` chunks.
    pub fn offset(self, dx: i64, dz: i64) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// Lattice cell of grid `(0, 0)` for a chunk of `resolution` cells per side.
    ///
    /// Chunks sit `resolution + 1` cells apart so that the collapsed padding
    /// of neighbouring height grids lands on the same lattice cells.
    pub fn cell_offset(self, resolution: usize) -> CellOffset {
        let stride = resolution as i64 + 1;
        CellOffset::new(self.z * stride, self.x * stride)
    }

    /// World-space (x, z) corner of the chunk.
    pub fn world_origin(self, chunk_size: f64) -> DVec2 {
        DVec2::new(self.x as f64 * chunk_size, self.z as f64 * chunk_size)
    }

    /// World-space (x, z) centre of the chunk.
    pub fn world_centre(self, chunk_size: f64) -> DVec2 {
        self.world_origin(chunk_size) + DVec2::splat(chunk_size * 0.5)
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Orthogonal neighbours of a chunk, used for terrain stitching.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkNeighbors {
    /// `x - 1`
    pub left: Option<ChunkCoord>,
    /// `x + 1`
    pub right: Option<ChunkCoord>,
    /// `z + 1`
    pub top: Option<ChunkCoord>,
    /// `z - 1`
    pub bottom: Option<ChunkCoord>,
}

impl ChunkNeighbors {
    /// Number of neighbours present.
    pub fn count(&self) -> usize {
        [self.left, self.right, self.top, self.bottom]
            .iter()
            .filter(|n| n.is_some())
            .count()
    }
}

/// One object committed by the placement scan.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedObject {
    pub handle: ObjectHandle,
    pub category: ObjectCategory,
    pub prefab: String,
    pub position: DVec3,
    pub yaw_degrees: f64,
    /// Grid `(row, col)` of the footprint origin.
    pub cell: (usize, usize),
}

/// A placed house awaiting or holding village membership.
#[derive(Clone, Debug, PartialEq)]
pub struct HouseRecord {
    pub handle: ObjectHandle,
    pub position: DVec3,
    /// Grid `(row, col)` of the footprint origin.
    pub cell: (usize, usize),
    /// Grid `(row, col)` under the footprint centre. Village clearing is centred here.
    pub centre_cell: (usize, usize),
    /// Index into [`ChunkData::villages`]. A lookup link, not ownership.
    pub village: Option<usize>,
}

/// Everything generated for one chunk.
#[derive(Debug)]
pub struct ChunkData {
    pub coord: ChunkCoord,
    pub chunk_size: f64,
    pub terrain_height: f64,
    pub heights: Arc<HeightGrid>,
    pub occupancy: OccupancyGrid,
    pub objects: Vec<PlacedObject>,
    /// Houses in placement order.
    pub houses: Vec<HouseRecord>,
    pub villages: Vec<VillageData>,
    pub neighbors: ChunkNeighbors,
}

impl ChunkData {
    pub fn new(
        coord: ChunkCoord,
        heights: Arc<HeightGrid>,
        chunk_size: f64,
        terrain_height: f64,
    ) -> Self {
        let resolution = heights.resolution();
        Self {
            coord,
            chunk_size,
            terrain_height,
            heights,
            occupancy: OccupancyGrid::new(resolution),
            objects: Vec::new(),
            houses: Vec::new(),
            villages: Vec::new(),
            neighbors: ChunkNeighbors::default(),
        }
    }

    pub fn resolution(&self) -> usize {
        self.heights.resolution()
    }

    /// World-space (x, z) corner of the chunk.
    pub fn world_origin(&self) -> DVec2 {
        self.heights.origin()
    }

    /// World-space width of one grid cell.
    pub fn cell_size(&self) -> f64 {
        self.chunk_size / self.resolution().max(1) as f64
    }

    /// World position of fractional grid coordinate `(row, col)`, on the terrain surface.
    pub fn cell_to_world(&self, row: f64, col: f64) -> DVec3 {
        let resolution = self.resolution().max(1) as f64;
        let u = col / resolution;
        let v = row / resolution;
        let origin = self.world_origin();
        DVec3::new(
            origin.x + u * self.chunk_size,
            self.heights.sample_normalized(u, v) * self.terrain_height,
            origin.y + v * self.chunk_size,
        )
    }

    /// Grid `(row, col)` containing world position `(x, z)`, if inside this chunk.
    pub fn world_to_cell(&self, x: f64, z: f64) -> Option<(usize, usize)> {
        let origin = self.world_origin();
        let col = ((x - origin.x) / self.cell_size()).floor();
        let row = ((z - origin.y) / self.cell_size()).floor();
        let resolution = self.resolution() as f64;
        if col < 0.0 || row < 0.0 || col >= resolution || row >= resolution {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Objects of one category.
    pub fn objects_of(&self, category: ObjectCategory) -> impl Iterator<Item = &PlacedObject> {
        self.objects.iter().filter(move |o| o.category == category)
    }
}
