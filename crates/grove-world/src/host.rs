//! Interfaces the generator needs from the engine hosting it.
//!
//! The core never owns rendering, scene or physics resources. It hands height
//! grids, transforms and render-group ids to these traits and gets opaque
//! handles back.

use std::sync::Arc;

use glam::DVec3;
use grove_config::ObjectCategory;
use grove_terrain::HeightGrid;

use crate::chunk::{ChunkCoord, ChunkNeighbors};

/// Opaque handle to an instantiated object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub u64);

/// A batch of instances merged into one mesh once closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderGroupId {
    pub chunk: ChunkCoord,
    pub category: ObjectCategory,
    pub index: u32,
}

/// What an instance is, as far as collision and bookkeeping are concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceKind {
    Placed(ObjectCategory),
    VillageCenter,
    Connection,
}

/// Everything an [`ObjectHost`] needs to create an instance.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnRequest<'a> {
    pub prefab: &'a str,
    pub kind: InstanceKind,
    pub position: DVec3,
    pub yaw_degrees: f64,
    /// Parent grouping for mesh consolidation, if any.
    pub group: Option<RenderGroupId>,
    /// Horizontal collider radius in world units; 0 for no collider.
    pub collider_radius: f64,
}

/// Tag of a collider hit by a [`CollisionQuery::capsule_sweep`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HitTag {
    Terrain,
    Tree,
    /// A house or a village center landmark.
    House(ObjectHandle),
    Other,
}

/// Renderable terrain surfaces.
pub trait TerrainHost {
    /// Build a surface for `coord` from its height grid.
    fn build_surface(
        &mut self,
        coord: ChunkCoord,
        heights: Arc<HeightGrid>,
        chunk_size: f64,
        terrain_height: f64,
    );

    /// Stitch a surface's edges to its orthogonal neighbours.
    fn stitch(&mut self, coord: ChunkCoord, neighbors: ChunkNeighbors);

    /// World height at normalized chunk coordinates, if the surface exists.
    fn height_at(&self, coord: ChunkCoord, u: f64, v: f64) -> Option<f64>;

    /// Weight of ground-texture `layer` at normalized chunk coordinates.
    fn layer_weight(&self, _coord: ChunkCoord, _u: f64, _v: f64, _layer: usize) -> f64 {
        0.0
    }
}

/// Scene instantiation.
pub trait ObjectHost {
    fn spawn(&mut self, request: SpawnRequest<'_>) -> ObjectHandle;
    fn despawn(&mut self, handle: ObjectHandle);
    fn set_yaw(&mut self, handle: ObjectHandle, yaw_degrees: f64);
}

/// Geometry merging of closed render groups.
pub trait MeshConsolidator {
    fn consolidate(&mut self, group: RenderGroupId);
}

/// Physics queries used when linking villages.
pub trait CollisionQuery {
    /// Tags of every collider touched by a capsule of `radius` swept from `from` to `to`.
    fn capsule_sweep(&self, from: DVec3, to: DVec3, radius: f64) -> Vec<HitTag>;
}

/// Everything the generator needs, in one bound.
pub trait WorldHost: TerrainHost + ObjectHost + MeshConsolidator + CollisionQuery {}

impl<T: TerrainHost + ObjectHost + MeshConsolidator + CollisionQuery> WorldHost for T {}
