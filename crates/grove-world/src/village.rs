//! Clustering of a chunk's houses into villages.
//!
//! Clustering is a single pass in placement order: a house joins the village of
//! the first founding house that reaches it, even if a later founder would be
//! closer. Results are reproducible because placement order is.

use glam::{DVec2, DVec3};
use grove_config::VillageConfig;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::chunk::ChunkData;
use crate::host::{InstanceKind, ObjectHandle, ObjectHost, SpawnRequest};
use crate::occupancy::Layer;
use crate::seed::yaw_towards;

/// The anchor of a village.
#[derive(Clone, Debug, PartialEq)]
pub struct VillageCenter {
    /// The landmark, or the promoted house when no landmark prefab is configured.
    pub handle: ObjectHandle,
    pub position: DVec3,
    /// Grid `(row, col)` under the footprint centre of the promoted house.
    pub cell: (usize, usize),
    /// True if a landmark replaced the promoted house.
    pub landmark: bool,
    /// Where connections attach. `None` when the landmark or connection
    /// prefab is unset; such villages are never linked.
    pub connection_point: Option<DVec3>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VillageData {
    /// Remaining houses, excluding the center.
    pub members: Vec<ObjectHandle>,
    /// Mean position of the capped membership, before promotion.
    pub centroid: DVec3,
    pub center: VillageCenter,
    /// Center position relative to the chunk's world origin, on the XZ plane.
    pub local_center: DVec2,
}

impl VillageData {
    /// Houses including the promoted center.
    pub fn house_count(&self) -> usize {
        self.members.len() + 1
    }
}

/// Counts from one clustering run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VillageReport {
    pub clusters: usize,
    pub pruned: usize,
    pub capped_houses: usize,
    pub villages: usize,
}

/// Group house indices by distance to a founding house. Houses flagged in
/// `assigned` are skipped.
pub fn cluster_houses(positions: &[DVec3], assigned: &[bool], max_distance: f64) -> Vec<Vec<usize>> {
    let mut claimed = assigned.to_vec();
    let mut groups = Vec::new();
    for founder in 0..positions.len() {
        if claimed[founder] {
            continue;
        }
        claimed[founder] = true;
        let mut group = vec![founder];
        for other in 0..positions.len() {
            if !claimed[other] && positions[founder].distance(positions[other]) <= max_distance {
                claimed[other] = true;
                group.push(other);
            }
        }
        groups.push(group);
    }
    groups
}

fn centroid(positions: impl ExactSizeIterator<Item = DVec3>) -> DVec3 {
    let count = positions.len().max(1) as f64;
    positions.sum::<DVec3>() / count
}

/// Index into `group` of the house nearest to (or farthest from) `target`.
fn extreme_by_distance(group: &[usize], positions: &[DVec3], target: DVec3, farthest: bool) -> usize {
    let mut best = 0;
    for (k, &i) in group.iter().enumerate() {
        let d = positions[i].distance_squared(target);
        let current = positions[group[best]].distance_squared(target);
        if (farthest && d > current) || (!farthest && d < current) {
            best = k;
        }
    }
    best
}

/// Runs cluster, prune, cap, promote, orient and clear over a chunk's unassigned houses.
#[derive(Clone, Debug)]
pub struct VillageClusterer {
    config: VillageConfig,
}

impl VillageClusterer {
    pub fn new(config: &VillageConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn run<H: ObjectHost + ?Sized>(&self, chunk: &mut ChunkData, host: &mut H) -> VillageReport {
        let cfg = &self.config;
        let positions: Vec<DVec3> = chunk.houses.iter().map(|h| h.position).collect();
        let assigned: Vec<bool> = chunk.houses.iter().map(|h| h.village.is_some()).collect();
        let groups = cluster_houses(&positions, &assigned, cfg.max_village_distance);

        let mut report = VillageReport {
            clusters: groups.len(),
            ..VillageReport::default()
        };
        let mut removed = FxHashSet::default();

        for mut group in groups {
            if group.len() < cfg.min_houses {
                for &i in &group {
                    host.despawn(chunk.houses[i].handle);
                    removed.insert(chunk.houses[i].handle);
                }
                report.pruned += 1;
                continue;
            }

            while group.len() > cfg.max_houses.max(1) {
                let mean = centroid(group.iter().map(|&i| positions[i]));
                let outer = group.remove(extreme_by_distance(&group, &positions, mean, true));
                host.despawn(chunk.houses[outer].handle);
                removed.insert(chunk.houses[outer].handle);
                report.capped_houses += 1;
            }

            let mean = centroid(group.iter().map(|&i| positions[i]));
            let promoted = group.remove(extreme_by_distance(&group, &positions, mean, false));
            let center = self.promote(chunk, host, promoted, &mut removed);
            let village_index = chunk.villages.len();

            for &i in &group {
                let yaw = yaw_towards(
                    positions[i].x,
                    positions[i].z,
                    center.position.x,
                    center.position.z,
                );
                let handle = chunk.houses[i].handle;
                host.set_yaw(handle, yaw);
                if let Some(object) = chunk.objects.iter_mut().find(|o| o.handle == handle) {
                    object.yaw_degrees = yaw;
                }
                chunk.houses[i].village = Some(village_index);
            }
            if !center.landmark {
                chunk.houses[promoted].village = Some(village_index);
            }

            chunk
                .occupancy
                .block_square(Layer::General, center.cell.0, center.cell.1, cfg.clear_radius);
            for &i in &group {
                let (row, col) = chunk.houses[i].centre_cell;
                chunk
                    .occupancy
                    .block_square(Layer::General, row, col, cfg.clear_radius);
            }

            let origin = chunk.world_origin();
            chunk.villages.push(VillageData {
                members: group.iter().map(|&i| chunk.houses[i].handle).collect(),
                centroid: mean,
                local_center: DVec2::new(center.position.x - origin.x, center.position.z - origin.y),
                center,
            });
            report.villages += 1;
        }

        chunk.houses.retain(|h| !removed.contains(&h.handle));
        chunk.objects.retain(|o| !removed.contains(&o.handle));
        debug!(
            chunk = %chunk.coord,
            clusters = report.clusters,
            pruned = report.pruned,
            villages = report.villages,
            "villages built"
        );
        report
    }

    fn promote<H: ObjectHost + ?Sized>(
        &self,
        chunk: &ChunkData,
        host: &mut H,
        promoted: usize,
        removed: &mut FxHashSet<ObjectHandle>,
    ) -> VillageCenter {
        let house = &chunk.houses[promoted];
        let connection_point = (self.config.center_prefab.is_some()
            && self.config.connection_prefab.is_some())
        .then(|| house.position + DVec3::Y * self.config.connection_point_height);

        let Some(prefab) = &self.config.center_prefab else {
            return VillageCenter {
                handle: house.handle,
                position: house.position,
                cell: house.centre_cell,
                landmark: false,
                connection_point,
            };
        };

        host.despawn(house.handle);
        removed.insert(house.handle);
        let handle = host.spawn(SpawnRequest {
            prefab: &prefab.id,
            kind: InstanceKind::VillageCenter,
            position: house.position,
            yaw_degrees: 0.0,
            group: None,
            collider_radius: (prefab.actual_x.max(prefab.actual_z) + 1) as f64
                * chunk.cell_size()
                * 0.5,
        });
        VillageCenter {
            handle,
            position: house.position,
            cell: house.centre_cell,
            landmark: true,
            connection_point,
        }
    }
}
