//! Connections between village centers across all generated chunks.

use glam::DVec3;
use grove_config::VillageConfig;
use tracing::{debug, trace};

use crate::chunk::{ChunkCoord, ChunkData};
use crate::host::{CollisionQuery, HitTag, InstanceKind, ObjectHandle, ObjectHost, SpawnRequest};
use crate::seed::yaw_towards;

/// Centers a village center is linked to, in link order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VillageConnectionData {
    links: Vec<ObjectHandle>,
}

impl VillageConnectionData {
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn is_linked(&self, center: ObjectHandle) -> bool {
        self.links.contains(&center)
    }

    pub fn links(&self) -> &[ObjectHandle] {
        &self.links
    }

    fn push(&mut self, center: ObjectHandle) {
        self.links.push(center);
    }
}

/// A connectable village center.
#[derive(Clone, Debug, PartialEq)]
pub struct VillageNode {
    pub chunk: ChunkCoord,
    /// Index into the owning chunk's village list.
    pub village: usize,
    pub center: ObjectHandle,
    pub point: DVec3,
    /// Houses of the village; sweeps may pass through them.
    pub houses: Vec<ObjectHandle>,
    pub connections: VillageConnectionData,
}

impl VillageNode {
    fn owns(&self, handle: ObjectHandle) -> bool {
        self.center == handle || self.houses.contains(&handle)
    }
}

/// One spawned connection.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionRecord {
    pub from: ObjectHandle,
    pub to: ObjectHandle,
    pub structure: ObjectHandle,
    pub length: f64,
}

/// Undirected graph of village centers.
#[derive(Clone, Debug, Default)]
pub struct VillageNetwork {
    nodes: Vec<VillageNode>,
    edges: usize,
}

impl VillageNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every village of `chunk` that has a connection point. Returns how many were added.
    pub fn register_chunk(&mut self, chunk: &ChunkData) -> usize {
        let before = self.nodes.len();
        for (index, village) in chunk.villages.iter().enumerate() {
            let Some(point) = village.center.connection_point else {
                trace!(chunk = %chunk.coord, village = index, "village has no connection point");
                continue;
            };
            self.nodes.push(VillageNode {
                chunk: chunk.coord,
                village: index,
                center: village.center.handle,
                point,
                houses: village.members.clone(),
                connections: VillageConnectionData::default(),
            });
        }
        self.nodes.len() - before
    }

    pub fn add_node(&mut self, node: VillageNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[VillageNode] {
        &self.nodes
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.edges
    }

    /// Try to link every ordered pair of centers once.
    ///
    /// A pair links if both are below `max_connections` (or the source has no
    /// link at all), they are not linked yet, their connection points are at
    /// most `max_connection_distance` apart, and a capsule between them hits no
    /// terrain, tree or foreign house.
    pub fn connect<H: ObjectHost + CollisionQuery + ?Sized>(
        &mut self,
        config: &VillageConfig,
        host: &mut H,
    ) -> Vec<ConnectionRecord> {
        let Some(prefab) = config.connection_prefab.as_deref() else {
            return Vec::new();
        };
        let mut made = Vec::new();
        let count = self.nodes.len();
        for i in 0..count {
            for j in 0..count {
                if i == j {
                    continue;
                }
                let (a, b) = (&self.nodes[i], &self.nodes[j]);
                let (from_links, to_links) = (a.connections.len(), b.connections.len());
                let under_cap = (from_links < config.max_connections
                    && to_links < config.max_connections)
                    || from_links == 0;
                if !under_cap || a.connections.is_linked(b.center) {
                    continue;
                }
                let length = a.point.distance(b.point);
                if length > config.max_connection_distance {
                    continue;
                }
                let blocked = host
                    .capsule_sweep(a.point, b.point, config.sweep_radius)
                    .into_iter()
                    .any(|hit| match hit {
                        HitTag::Terrain | HitTag::Tree => true,
                        HitTag::House(handle) => !a.owns(handle) && !b.owns(handle),
                        HitTag::Other => false,
                    });
                if blocked {
                    trace!(from = a.center.0, to = b.center.0, "connection blocked");
                    continue;
                }

                let (from, to) = (a.center, b.center);
                let structure = host.spawn(SpawnRequest {
                    prefab,
                    kind: InstanceKind::Connection,
                    position: a.point.lerp(b.point, 0.5),
                    yaw_degrees: yaw_towards(a.point.x, a.point.z, b.point.x, b.point.z),
                    group: None,
                    collider_radius: 0.0,
                });
                self.nodes[i].connections.push(to);
                self.nodes[j].connections.push(from);
                self.edges += 1;
                made.push(ConnectionRecord {
                    from,
                    to,
                    structure,
                    length,
                });
            }
        }
        if !made.is_empty() {
            debug!(new = made.len(), total = self.edges, "villages connected");
        }
        made
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use grove_config::ObjectCategory;

    fn node(host: &mut HeadlessHost, x: f64, z: f64) -> VillageNode {
        let point = DVec3::new(x, 4.0, z);
        let center = host.spawn(SpawnRequest {
            prefab: "village_center",
            kind: InstanceKind::VillageCenter,
            position: DVec3::new(x, 0.0, z),
            yaw_degrees: 0.0,
            group: None,
            collider_radius: 3.0,
        });
        VillageNode {
            chunk: ChunkCoord::ORIGIN,
            village: 0,
            center,
            point,
            houses: Vec::new(),
            connections: VillageConnectionData::default(),
        }
    }

    fn connection_pairs(network: &VillageNetwork) -> Vec<(ObjectHandle, ObjectHandle)> {
        let mut pairs = Vec::new();
        for node in network.nodes() {
            for &other in node.connections.links() {
                pairs.push((node.center.min(other), node.center.max(other)));
            }
        }
        pairs.sort();
        pairs
    }

    #[test]
    fn test_connects_at_exact_max_distance() {
        let mut host = HeadlessHost::new();
        let mut network = VillageNetwork::new();
        network.add_node(node(&mut host, 0.0, 0.0));
        network.add_node(node(&mut host, 300.0, 0.0));
        let made = network.connect(&VillageConfig::default(), &mut host);
        assert_eq!(made.len(), 1);
        assert_eq!(made[0].length, 300.0);
        assert_eq!(host.count_kind(InstanceKind::Connection), 1);
        let structure = host.object(made[0].structure).unwrap();
        assert_eq!(structure.position, DVec3::new(150.0, 4.0, 0.0));
    }

    #[test]
    fn test_no_connection_beyond_max_distance() {
        let mut host = HeadlessHost::new();
        let mut network = VillageNetwork::new();
        network.add_node(node(&mut host, 0.0, 0.0));
        network.add_node(node(&mut host, 301.0, 0.0));
        assert!(network.connect(&VillageConfig::default(), &mut host).is_empty());
        assert_eq!(network.edge_count(), 0);
    }

    #[test]
    fn test_no_duplicate_edges() {
        let mut host = HeadlessHost::new();
        let mut network = VillageNetwork::new();
        for (x, z) in [(0.0, 0.0), (100.0, 0.0), (0.0, 120.0), (150.0, 150.0), (-90.0, 40.0)] {
            network.add_node(node(&mut host, x, z));
        }
        let config = VillageConfig {
            max_connections: 3,
            ..VillageConfig::default()
        };
        let first = network.connect(&config, &mut host);
        let second = network.connect(&config, &mut host);
        assert!(!first.is_empty());
        assert!(second.is_empty());

        let pairs = connection_pairs(&network);
        assert_eq!(pairs.len(), 2 * network.edge_count());
        let mut unique = pairs.clone();
        unique.dedup();
        assert_eq!(unique.len(), network.edge_count());
    }

    #[test]
    fn test_unlinked_center_may_join_saturated() {
        let mut host = HeadlessHost::new();
        let mut network = VillageNetwork::new();
        network.add_node(node(&mut host, 0.0, 0.0));
        network.add_node(node(&mut host, -100.0, 0.0));
        network.add_node(node(&mut host, 100.0, 0.0));
        let config = VillageConfig {
            max_connections: 1,
            ..VillageConfig::default()
        };
        network.connect(&config, &mut host);

        let nodes = network.nodes();
        assert_eq!(nodes[0].connections.len(), 2);
        assert!(nodes[0].connections.is_linked(nodes[1].center));
        assert!(nodes[0].connections.is_linked(nodes[2].center));
        assert!(nodes.iter().all(|n| !n.connections.is_empty()));
    }

    #[test]
    fn test_blocked_by_tree() {
        let mut host = HeadlessHost::new();
        let mut network = VillageNetwork::new();
        network.add_node(node(&mut host, 0.0, 0.0));
        network.add_node(node(&mut host, 200.0, 0.0));
        host.spawn(SpawnRequest {
            prefab: "pine",
            kind: InstanceKind::Placed(ObjectCategory::Tree),
            position: DVec3::new(100.0, 0.0, 1.0),
            yaw_degrees: 0.0,
            group: None,
            collider_radius: 1.0,
        });
        assert!(network.connect(&VillageConfig::default(), &mut host).is_empty());
    }

    #[test]
    fn test_own_houses_do_not_block() {
        let mut host = HeadlessHost::new();
        let mut network = VillageNetwork::new();
        let mut a = node(&mut host, 0.0, 0.0);
        let b = node(&mut host, 200.0, 0.0);
        let house = host.spawn(SpawnRequest {
            prefab: "house",
            kind: InstanceKind::Placed(ObjectCategory::House),
            position: DVec3::new(30.0, 0.0, 0.0),
            yaw_degrees: 0.0,
            group: None,
            collider_radius: 5.0,
        });
        a.houses.push(house);
        network.add_node(a);
        network.add_node(b);
        assert_eq!(network.connect(&VillageConfig::default(), &mut host).len(), 1);
    }

    #[test]
    fn test_foreign_house_blocks() {
        let mut host = HeadlessHost::new();
        let mut network = VillageNetwork::new();
        network.add_node(node(&mut host, 0.0, 0.0));
        network.add_node(node(&mut host, 200.0, 0.0));
        host.spawn(SpawnRequest {
            prefab: "house",
            kind: InstanceKind::Placed(ObjectCategory::House),
            position: DVec3::new(100.0, 0.0, 0.0),
            yaw_degrees: 0.0,
            group: None,
            collider_radius: 5.0,
        });
        assert!(network.connect(&VillageConfig::default(), &mut host).is_empty());
    }

    #[test]
    fn test_without_connection_prefab_nothing_connects() {
        let mut host = HeadlessHost::new();
        let mut network = VillageNetwork::new();
        network.add_node(node(&mut host, 0.0, 0.0));
        network.add_node(node(&mut host, 10.0, 0.0));
        let config = VillageConfig {
            connection_prefab: None,
            ..VillageConfig::default()
        };
        assert!(network.connect(&config, &mut host).is_empty());
    }
}
