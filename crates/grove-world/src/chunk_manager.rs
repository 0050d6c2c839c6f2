//! Central owner for all generated chunks, keyed by [`ChunkCoord`].
//!
//! The [`ChunkManager`] keeps chunks in an [`FxHashMap`] for O(1) lookup plus
//! a creation-order list, tracks which coordinates have been requested but
//! not delivered yet, and rewires orthogonal adjacency whenever a chunk lands.

use std::collections::VecDeque;

use glam::DVec2;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::chunk::{ChunkCoord, ChunkData, ChunkNeighbors, NEIGHBOR_OFFSETS};

/// Owns every generated chunk and every outstanding request.
///
/// A coordinate is requested at most once: requests for coordinates that are
/// already generated or already pending are ignored.
#[derive(Debug, Default)]
pub struct ChunkManager {
    chunks: FxHashMap<ChunkCoord, ChunkData>,
    order: Vec<ChunkCoord>,
    pending: FxHashSet<ChunkCoord>,
    outbox: VecDeque<ChunkCoord>,
}

impl ChunkManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue generation of `coord`. Returns false if it exists or is pending.
    pub fn request_chunk(&mut self, coord: ChunkCoord) -> bool {
        if self.chunks.contains_key(&coord) || !self.pending.insert(coord) {
            return false;
        }
        self.outbox.push_back(coord);
        true
    }

    /// Requests issued since the last drain, in request order.
    pub fn drain_requests(&mut self) -> Vec<ChunkCoord> {
        self.outbox.drain(..).collect()
    }

    /// Store a finished chunk and recompute adjacency for every chunk.
    ///
    /// Returns the coordinates whose neighbours changed, including `chunk`'s own.
    pub fn on_chunk_ready(&mut self, chunk: ChunkData) -> Vec<ChunkCoord> {
        let coord = chunk.coord;
        self.pending.remove(&coord);
        if self.chunks.insert(coord, chunk).is_none() {
            self.order.push(coord);
        }

        let mut changed = Vec::new();
        for &existing in &self.order {
            let neighbors = self.neighbors_of(existing);
            if let Some(data) = self.chunks.get_mut(&existing)
                && (data.neighbors != neighbors || existing == coord)
            {
                data.neighbors = neighbors;
                changed.push(existing);
            }
        }
        debug!(chunk = %coord, total = self.order.len(), "chunk ready");
        changed
    }

    /// Request every missing neighbour (4 orthogonal, 4 diagonal) of `coord`.
    /// Returns the number of requests issued.
    pub fn ensure_neighbors(&mut self, coord: ChunkCoord) -> usize {
        NEIGHBOR_OFFSETS
            .iter()
            .filter(|&&(dx, dz)| self.request_chunk(coord.offset(dx, dz)))
            .count()
    }

    /// Observer distance check: the first chunk in creation order whose centre is
    /// within `view_distance` of `position` and that still misses a neighbour
    /// gets its neighbours requested. Returns that chunk.
    ///
    /// Unlike a plain first-in-range rule, in-range chunks whose eight
    /// neighbours are all known (generated or pending) are skipped, so the
    /// check moves on to the next chunk instead of stalling on a complete one.
    pub fn observe(&mut self, position: DVec2, chunk_size: f64, view_distance: f64) -> Option<ChunkCoord> {
        let coord = self.order.iter().copied().find(|&coord| {
            coord.world_centre(chunk_size).distance(position) <= view_distance
                && NEIGHBOR_OFFSETS
                    .iter()
                    .any(|&(dx, dz)| !self.is_known(coord.offset(dx, dz)))
        })?;
        self.ensure_neighbors(coord);
        Some(coord)
    }

    fn neighbors_of(&self, coord: ChunkCoord) -> ChunkNeighbors {
        let present = |dx, dz| {
            let other = coord.offset(dx, dz);
            self.chunks.contains_key(&other).then_some(other)
        };
        ChunkNeighbors {
            left: present(-1, 0),
            right: present(1, 0),
            top: present(0, 1),
            bottom: present(0, -1),
        }
    }

    /// Generated or pending.
    pub fn is_known(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord) || self.pending.contains(&coord)
    }

    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.pending.contains(&coord)
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&ChunkData> {
        self.chunks.get(&coord)
    }

    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut ChunkData> {
        self.chunks.get_mut(&coord)
    }

    /// Number of generated chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of requested chunks not generated yet.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Generated chunks in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &ChunkData> {
        self.order.iter().filter_map(|coord| self.chunks.get(coord))
    }
}
