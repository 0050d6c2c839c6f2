//! In-memory host used by the `grove` binary and the tests.
//!
//! Objects are stored with a vertical-cylinder collider of their spawn radius,
//! terrain surfaces keep the height grid they were built from, and merged
//! render groups are only logged.

use std::sync::Arc;

use glam::{DVec2, DVec3};
use grove_config::ObjectCategory;
use grove_terrain::HeightGrid;
use rustc_hash::FxHashMap;

use crate::chunk::{ChunkCoord, ChunkNeighbors};
use crate::host::{
    CollisionQuery, HitTag, InstanceKind, MeshConsolidator, ObjectHandle, ObjectHost,
    RenderGroupId, SpawnRequest, TerrainHost,
};

/// World-space spacing of terrain samples along a capsule sweep.
const TERRAIN_SAMPLE_SPACING: f64 = 2.0;

#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessObject {
    pub prefab: String,
    pub kind: InstanceKind,
    pub position: DVec3,
    pub yaw_degrees: f64,
    pub group: Option<RenderGroupId>,
    pub collider_radius: f64,
}

#[derive(Clone, Debug)]
pub struct HeadlessSurface {
    pub heights: Arc<HeightGrid>,
    pub chunk_size: f64,
    pub terrain_height: f64,
    pub neighbors: ChunkNeighbors,
    pub stitched: bool,
}

impl HeadlessSurface {
    fn contains(&self, x: f64, z: f64) -> bool {
        let origin = self.heights.origin();
        x >= origin.x && z >= origin.y && x < origin.x + self.chunk_size && z < origin.y + self.chunk_size
    }

    fn height_at_world(&self, x: f64, z: f64) -> f64 {
        let origin = self.heights.origin();
        let u = (x - origin.x) / self.chunk_size;
        let v = (z - origin.y) / self.chunk_size;
        self.heights.sample_normalized(u, v) * self.terrain_height
    }
}

#[derive(Debug, Default)]
pub struct HeadlessHost {
    objects: FxHashMap<ObjectHandle, HeadlessObject>,
    next_handle: u64,
    surfaces: FxHashMap<ChunkCoord, HeadlessSurface>,
    consolidated: Vec<RenderGroupId>,
    despawned: usize,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, handle: ObjectHandle) -> Option<&HeadlessObject> {
        self.objects.get(&handle)
    }

    pub fn objects(&self) -> impl Iterator<Item = (&ObjectHandle, &HeadlessObject)> {
        self.objects.iter()
    }

    /// Live objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Live objects of one kind.
    pub fn count_kind(&self, kind: InstanceKind) -> usize {
        self.objects.values().filter(|o| o.kind == kind).count()
    }

    /// Objects removed so far.
    pub fn despawned(&self) -> usize {
        self.despawned
    }

    /// Render groups merged so far, in order.
    pub fn consolidated(&self) -> &[RenderGroupId] {
        &self.consolidated
    }

    pub fn surface(&self, coord: ChunkCoord) -> Option<&HeadlessSurface> {
        self.surfaces.get(&coord)
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Terrain height at world `(x, z)`, if a surface covers it.
    pub fn world_height(&self, x: f64, z: f64) -> Option<f64> {
        self.surfaces
            .values()
            .find(|s| s.contains(x, z))
            .map(|s| s.height_at_world(x, z))
    }

    fn hit_tag(kind: InstanceKind, handle: ObjectHandle) -> HitTag {
        match kind {
            InstanceKind::Placed(ObjectCategory::Tree) => HitTag::Tree,
            InstanceKind::Placed(ObjectCategory::House) | InstanceKind::VillageCenter => {
                HitTag::House(handle)
            }
            InstanceKind::Placed(ObjectCategory::Detail) | InstanceKind::Connection => HitTag::Other,
        }
    }
}

/// Distance on the XZ plane from `point` to the segment `from..to`.
fn segment_distance_xz(from: DVec3, to: DVec3, point: DVec3) -> f64 {
    let a = DVec2::new(from.x, from.z);
    let b = DVec2::new(to.x, to.z);
    let p = DVec2::new(point.x, point.z);
    let ab = b - a;
    let len_sq = ab.length_squared();
    let t = if len_sq > 0.0 {
        ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    p.distance(a + ab * t)
}

impl TerrainHost for HeadlessHost {
    fn build_surface(
        &mut self,
        coord: ChunkCoord,
        heights: Arc<HeightGrid>,
        chunk_size: f64,
        terrain_height: f64,
    ) {
        self.surfaces.insert(
            coord,
            HeadlessSurface {
                heights,
                chunk_size,
                terrain_height,
                neighbors: ChunkNeighbors::default(),
                stitched: false,
            },
        );
    }

    fn stitch(&mut self, coord: ChunkCoord, neighbors: ChunkNeighbors) {
        if let Some(surface) = self.surfaces.get_mut(&coord) {
            surface.neighbors = neighbors;
            surface.stitched = true;
        }
    }

    fn height_at(&self, coord: ChunkCoord, u: f64, v: f64) -> Option<f64> {
        self.surfaces
            .get(&coord)
            .map(|s| s.heights.sample_normalized(u, v) * s.terrain_height)
    }
}

impl ObjectHost for HeadlessHost {
    fn spawn(&mut self, request: SpawnRequest<'_>) -> ObjectHandle {
        self.next_handle += 1;
        let handle = ObjectHandle(self.next_handle);
        self.objects.insert(
            handle,
            HeadlessObject {
                prefab: request.prefab.to_string(),
                kind: request.kind,
                position: request.position,
                yaw_degrees: request.yaw_degrees,
                group: request.group,
                collider_radius: request.collider_radius,
            },
        );
        handle
    }

    fn despawn(&mut self, handle: ObjectHandle) {
        if self.objects.remove(&handle).is_some() {
            self.despawned += 1;
        }
    }

    fn set_yaw(&mut self, handle: ObjectHandle, yaw_degrees: f64) {
        if let Some(object) = self.objects.get_mut(&handle) {
            object.yaw_degrees = yaw_degrees;
        }
    }
}

impl MeshConsolidator for HeadlessHost {
    fn consolidate(&mut self, group: RenderGroupId) {
        self.consolidated.push(group);
    }
}

impl CollisionQuery for HeadlessHost {
    fn capsule_sweep(&self, from: DVec3, to: DVec3, radius: f64) -> Vec<HitTag> {
        let mut hits: Vec<HitTag> = self
            .objects
            .iter()
            .filter(|(_, o)| o.collider_radius > 0.0)
            .filter(|(_, o)| segment_distance_xz(from, to, o.position) <= radius + o.collider_radius)
            .map(|(&handle, o)| Self::hit_tag(o.kind, handle))
            .collect();

        let samples = ((to - from).length() / TERRAIN_SAMPLE_SPACING).ceil().max(1.0) as usize;
        let grounded = (0..=samples).any(|i| {
            let p = from.lerp(to, i as f64 / samples as f64);
            self.world_height(p.x, p.z)
                .is_some_and(|ground| p.y - radius < ground)
        });
        if grounded {
            hits.push(HitTag::Terrain);
        }
        hits
    }
}
