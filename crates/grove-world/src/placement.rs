//! Noise-driven object placement over a chunk's occupancy layers.
//!
//! A [`PlacementScan`] walks the candidate cells of one category in row-major
//! order and can be suspended between cells, so the scheduler can spread a
//! chunk's placement over many turns. [`PlacementEngine`] runs a whole scan in
//! one call.

use grove_config::{ObjectCategory, ObjectPlacementConfig, RenderGroupConfig};
use grove_terrain::{Grid, NoiseField, NoiseMap, flatness_mask};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::chunk::{ChunkCoord, ChunkData, HouseRecord, PlacedObject};
use crate::error::WorldError;
use crate::host::{InstanceKind, MeshConsolidator, ObjectHost, RenderGroupId, SpawnRequest};
use crate::occupancy::{Footprint, Layer};
use crate::seed::placement_rng;

/// Density gate: a uniform draw divided by the pool size must not exceed `density`.
#[inline]
pub fn passes_density(draw: f64, pool_size: usize, density: f64) -> bool {
    draw / pool_size.max(1) as f64 <= density
}

/// Fails if `config` has no prefabs to choose from.
pub fn check_prefab_pool(config: &ObjectPlacementConfig) -> Result<(), WorldError> {
    if config.prefabs.is_empty() {
        Err(WorldError::EmptyPrefabPool(config.category()))
    } else {
        Ok(())
    }
}

/// Noise grid of a category for one chunk, aligned with the chunk's height grid.
pub fn category_noise(
    config: &ObjectPlacementConfig,
    coord: ChunkCoord,
    resolution: usize,
) -> NoiseMap {
    NoiseField::new(&config.noise).sample(resolution, coord.cell_offset(resolution))
}

/// Occupancy layer a category claims and checks.
pub fn layer_for(category: ObjectCategory) -> Layer {
    match category {
        ObjectCategory::Detail => Layer::Detail,
        ObjectCategory::House | ObjectCategory::Tree => Layer::General,
    }
}

/// Counts vertices per render group and rolls over to a new group when the
/// budget would be reached.
#[derive(Clone, Debug)]
pub struct RenderGroupTracker {
    chunk: ChunkCoord,
    category: ObjectCategory,
    budget: u64,
    consolidate: bool,
    index: u32,
    vertices: u64,
}

impl RenderGroupTracker {
    pub fn new(chunk: ChunkCoord, category: ObjectCategory, render: &RenderGroupConfig) -> Self {
        Self {
            chunk,
            category,
            budget: render.vertex_budget as u64,
            consolidate: render.consolidate,
            index: 0,
            vertices: 0,
        }
    }

    /// The group new instances join.
    pub fn current(&self) -> RenderGroupId {
        RenderGroupId {
            chunk: self.chunk,
            category: self.category,
            index: self.index,
        }
    }

    pub fn vertices(&self) -> u64 {
        self.vertices
    }

    /// Account for an instance of `vertices` vertices. Returns the group closed
    /// by this rollover, if any and if it may be consolidated.
    pub fn admit(&mut self, vertices: u32) -> Option<RenderGroupId> {
        let mut closed = None;
        if self.vertices > 0 && self.vertices + vertices as u64 >= self.budget {
            closed = self.closable();
            self.index += 1;
            self.vertices = 0;
        }
        self.vertices += vertices as u64;
        closed
    }

    /// Close the open group at the end of the category.
    pub fn finish(&mut self) -> Option<RenderGroupId> {
        if self.vertices == 0 {
            return None;
        }
        self.vertices = 0;
        self.closable()
    }

    // Houses stay unmerged: villages still despawn and rotate them.
    fn closable(&self) -> Option<RenderGroupId> {
        (self.consolidate && self.category != ObjectCategory::House).then(|| self.current())
    }
}

/// Per-step limits for [`PlacementScan::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepBudget {
    pub cells: usize,
    pub spawns: usize,
}

impl StepBudget {
    pub const UNLIMITED: Self = Self {
        cells: usize::MAX,
        spawns: usize::MAX,
    };

    /// Budget from the scheduler cell limit and the category spawn cap; 0 means no cap.
    pub fn new(cells: usize, spawns: usize) -> Self {
        let unlimited = |v: usize| if v == 0 { usize::MAX } else { v };
        Self {
            cells: unlimited(cells),
            spawns: unlimited(spawns),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanProgress {
    Yielded,
    Finished,
}

/// Resumable placement of one category in one chunk.
#[derive(Debug)]
pub struct PlacementScan {
    config: ObjectPlacementConfig,
    category: ObjectCategory,
    layer: Layer,
    noise: NoiseMap,
    flat: Grid<bool>,
    attempted: Grid<bool>,
    start: usize,
    span: usize,
    cursor: usize,
    rng: ChaCha8Rng,
    tracker: RenderGroupTracker,
    closed: Vec<RenderGroupId>,
    placed: usize,
    finished: bool,
}

impl PlacementScan {
    pub fn new(
        config: &ObjectPlacementConfig,
        coord: ChunkCoord,
        noise: NoiseMap,
        flat: Grid<bool>,
        render: &RenderGroupConfig,
    ) -> Self {
        let category = config.category();
        let resolution = noise.rows();
        let range = config.max_required_extent();
        let span = resolution.saturating_sub(2 * range);
        if let Err(e) = check_prefab_pool(config) {
            warn!("{e}, nothing to place");
        }
        Self {
            category,
            layer: layer_for(category),
            attempted: Grid::square(resolution, false),
            start: range,
            span,
            cursor: 0,
            rng: placement_rng(config.noise.seed, coord, category),
            tracker: RenderGroupTracker::new(coord, category, render),
            closed: Vec::new(),
            placed: 0,
            finished: config.prefabs.is_empty() || span == 0,
            config: config.clone(),
            noise,
            flat,
        }
    }

    pub fn category(&self) -> ObjectCategory {
        self.category
    }

    /// Objects committed so far.
    pub fn placed(&self) -> usize {
        self.placed
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Render groups closed since the last call.
    pub fn take_closed_groups(&mut self) -> Vec<RenderGroupId> {
        std::mem::take(&mut self.closed)
    }

    /// Visit cells until the budget is spent or the scan completes.
    pub fn step<H: ObjectHost + ?Sized>(
        &mut self,
        chunk: &mut ChunkData,
        host: &mut H,
        budget: StepBudget,
    ) -> ScanProgress {
        if self.finished {
            return ScanProgress::Finished;
        }
        let total = self.span * self.span;
        let (mut cells, mut spawns) = (0usize, 0usize);
        while self.cursor < total {
            if cells >= budget.cells.max(1) || spawns >= budget.spawns.max(1) {
                return ScanProgress::Yielded;
            }
            let row = self.start + self.cursor / self.span;
            let col = self.start + self.cursor % self.span;
            self.cursor += 1;
            cells += 1;

            if self.attempted[(row, col)] {
                continue;
            }
            if self.try_place(chunk, host, row, col) {
                spawns += 1;
            }
        }

        self.finished = true;
        if let Some(group) = self.tracker.finish() {
            self.closed.push(group);
        }
        debug!(
            chunk = %chunk.coord,
            category = self.category.name(),
            placed = self.placed,
            "placement scan finished"
        );
        ScanProgress::Finished
    }

    fn try_place<H: ObjectHost + ?Sized>(
        &mut self,
        chunk: &mut ChunkData,
        host: &mut H,
        row: usize,
        col: usize,
    ) -> bool {
        let pool = self.config.prefabs.len();
        let prefab = self.config.prefabs[self.rng.random_range(0..pool)].clone();
        let footprint = Footprint::new(prefab.required_z, prefab.required_x);
        let height = chunk.heights.at(row, col) as f64;

        let admitted = self
            .flat
            .all_in_rect(row, col, footprint.rows, footprint.cols, |&flat| flat)
            && chunk.occupancy.is_free(self.layer, row, col, footprint)
            && passes_density(self.rng.random::<f64>(), pool, self.config.spawn_density)
            && (self.config.min_spawn_height..=self.config.max_spawn_height).contains(&height);
        if !admitted {
            self.attempted
                .fill_rect(row, col, footprint.rows, footprint.cols, true);
            return false;
        }

        let value = (1.0 - self.noise[(row, col)] as f64).clamp(0.0, 1.0);
        if value < self.config.spawn_threshold {
            self.attempted[(row, col)] = true;
            return false;
        }

        chunk.occupancy.claim(self.layer, row, col, footprint);
        if self.layer == Layer::General {
            chunk.occupancy.claim(
                Layer::Detail,
                row,
                col,
                Footprint::new(prefab.actual_z, prefab.actual_x),
            );
        }

        let position = chunk.cell_to_world(
            row as f64 + footprint.rows as f64 * 0.5,
            col as f64 + footprint.cols as f64 * 0.5,
        );
        let yaw_degrees = self.rng.random_range(0..360) as f64;
        if let Some(closed) = self.tracker.admit(prefab.vertex_count) {
            self.closed.push(closed);
        }
        let collider_radius = match self.category {
            ObjectCategory::Detail => 0.0,
            _ => (prefab.actual_x.max(prefab.actual_z) + 1) as f64 * chunk.cell_size() * 0.5,
        };
        let handle = host.spawn(SpawnRequest {
            prefab: &prefab.id,
            kind: InstanceKind::Placed(self.category),
            position,
            yaw_degrees,
            group: Some(self.tracker.current()),
            collider_radius,
        });

        if self.category == ObjectCategory::House {
            chunk.houses.push(HouseRecord {
                handle,
                position,
                cell: (row, col),
                centre_cell: (row + footprint.rows / 2, col + footprint.cols / 2),
                village: None,
            });
        }
        chunk.objects.push(PlacedObject {
            handle,
            category: self.category,
            prefab: prefab.id,
            position,
            yaw_degrees,
            cell: (row, col),
        });
        self.placed += 1;
        true
    }
}

/// Synchronous placement of a whole category.
#[derive(Clone, Debug, Default)]
pub struct PlacementEngine {
    render: RenderGroupConfig,
}

impl PlacementEngine {
    pub fn new(render: &RenderGroupConfig) -> Self {
        Self {
            render: render.clone(),
        }
    }

    /// Place every object of `config`'s category in `chunk`, consolidating
    /// closed render groups as they close. Returns the new placements.
    pub fn place<H: ObjectHost + MeshConsolidator + ?Sized>(
        &self,
        config: &ObjectPlacementConfig,
        chunk: &mut ChunkData,
        host: &mut H,
    ) -> Vec<PlacedObject> {
        let resolution = chunk.resolution();
        let noise = category_noise(config, chunk.coord, resolution);
        let flat = flatness_mask(
            chunk.heights.values(),
            config.flatness_radius,
            config.flatness_sensitivity,
        );
        let before = chunk.objects.len();
        let mut scan = PlacementScan::new(config, chunk.coord, noise, flat, &self.render);
        while scan.step(chunk, host, StepBudget::UNLIMITED) == ScanProgress::Yielded {}
        for group in scan.take_closed_groups() {
            host.consolidate(group);
        }
        chunk.objects[before..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::headless::HeadlessHost;
    use glam::DVec2;
    use grove_config::{NoiseParameters, PrefabSpec};
    use grove_terrain::HeightGrid;
    use rand::SeedableRng;

    const RESOLUTION: usize = 48;

    fn flat_chunk(height: f32) -> ChunkData {
        let heights = HeightGrid::new(Grid::square(RESOLUTION, height), DVec2::ZERO);
        ChunkData::new(ChunkCoord::ORIGIN, Arc::new(heights), 480.0, 20.0)
    }

    fn eager(mut config: ObjectPlacementConfig) -> ObjectPlacementConfig {
        config.spawn_density = 1.0;
        config.spawn_threshold = 0.0;
        config.min_spawn_height = 0.0;
        config.max_spawn_height = 1.0;
        config.flatness_sensitivity = 0.01;
        config.noise = NoiseParameters {
            seed: 5,
            ..NoiseParameters::default()
        };
        config
    }

    fn footprint_cells(chunk: &ChunkData, config: &ObjectPlacementConfig) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        for object in chunk.objects_of(config.category()) {
            let prefab = config
                .prefabs
                .iter()
                .find(|p| p.id == object.prefab)
                .unwrap();
            let (row, col) = object.cell;
            for r in row..=row + prefab.required_z {
                for c in col..=col + prefab.required_x {
                    cells.push((r, c));
                }
            }
        }
        cells
    }

    #[test]
    fn test_passes_density() {
        assert!(passes_density(0.2, 1, 0.2));
        assert!(!passes_density(0.21, 1, 0.2));
        assert!(passes_density(0.4, 2, 0.2));
        assert!(!passes_density(0.5, 2, 0.2));
    }

    #[test]
    fn test_density_acceptance_rate_converges() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let draws = 200_000;
        let accepted = (0..draws)
            .filter(|_| passes_density(rng.random::<f64>(), 1, 0.3))
            .count();
        let rate = accepted as f64 / draws as f64;
        assert!((rate - 0.3).abs() < 0.01, "rate {rate}");

        let accepted = (0..draws)
            .filter(|_| passes_density(rng.random::<f64>(), 4, 0.1))
            .count();
        let rate = accepted as f64 / draws as f64;
        assert!((rate - 0.4).abs() < 0.01, "pool share rate {rate}");
    }

    #[test]
    fn test_tracker_rolls_over_at_budget() {
        let render = RenderGroupConfig {
            vertex_budget: 1000,
            ..RenderGroupConfig::default()
        };
        let mut tracker = RenderGroupTracker::new(ChunkCoord::ORIGIN, ObjectCategory::Tree, &render);
        assert_eq!(tracker.admit(600), None);
        let closed = tracker.admit(400).unwrap();
        assert_eq!(closed.index, 0);
        assert_eq!(tracker.current().index, 1);
        assert_eq!(tracker.vertices(), 400);
        assert_eq!(tracker.finish().map(|g| g.index), Some(1));
        assert_eq!(tracker.finish(), None);
    }

    #[test]
    fn test_tracker_never_closes_house_groups() {
        let render = RenderGroupConfig {
            vertex_budget: 100,
            ..RenderGroupConfig::default()
        };
        let mut tracker = RenderGroupTracker::new(ChunkCoord::ORIGIN, ObjectCategory::House, &render);
        tracker.admit(90);
        assert_eq!(tracker.admit(90), None);
        assert_eq!(tracker.current().index, 1);
        assert_eq!(tracker.finish(), None);
    }

    #[test]
    fn test_tracker_respects_consolidate_flag() {
        let render = RenderGroupConfig {
            consolidate: false,
            ..RenderGroupConfig::default()
        };
        let mut tracker = RenderGroupTracker::new(ChunkCoord::ORIGIN, ObjectCategory::Tree, &render);
        tracker.admit(10);
        assert_eq!(tracker.finish(), None);
    }

    #[test]
    fn test_place_trees_on_flat_chunk() {
        let config = eager(ObjectPlacementConfig::trees());
        let mut chunk = flat_chunk(0.5);
        let mut host = HeadlessHost::new();
        let placed = PlacementEngine::default().place(&config, &mut chunk, &mut host);

        assert!(!placed.is_empty());
        assert_eq!(host.object_count(), placed.len());
        for object in &placed {
            assert!((0.0..360.0).contains(&object.yaw_degrees));
            assert_eq!(object.position.y, 10.0);
        }
    }

    #[test]
    fn test_footprints_never_overlap() {
        let config = eager(ObjectPlacementConfig::houses());
        let mut chunk = flat_chunk(0.3);
        let mut host = HeadlessHost::new();
        PlacementEngine::default().place(&config, &mut chunk, &mut host);

        let mut cells = footprint_cells(&chunk, &config);
        let total = cells.len();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), total, "two footprints share a cell");
        for &(r, c) in &cells {
            assert!(!chunk.occupancy.is_cell_free(Layer::General, r, c));
        }
    }

    #[test]
    fn test_second_pass_respects_claimed_cells() {
        let config = eager(ObjectPlacementConfig::trees());
        let mut chunk = flat_chunk(0.5);
        let mut host = HeadlessHost::new();
        let engine = PlacementEngine::default();
        engine.place(&config, &mut chunk, &mut host);
        let first = footprint_cells(&chunk, &config);

        let mut reseeded = config.clone();
        reseeded.noise.seed = 77;
        let second = engine.place(&reseeded, &mut chunk, &mut host);
        for object in &second {
            let (row, col) = object.cell;
            assert!(
                !first.contains(&(row, col)),
                "object placed on a claimed cell"
            );
        }
    }

    #[test]
    fn test_houses_recorded_for_villages() {
        let config = eager(ObjectPlacementConfig::houses());
        let mut chunk = flat_chunk(0.3);
        let mut host = HeadlessHost::new();
        let placed = PlacementEngine::default().place(&config, &mut chunk, &mut host);
        assert_eq!(chunk.houses.len(), placed.len());
        assert!(chunk.houses.iter().all(|h| h.village.is_none()));
    }

    #[test]
    fn test_details_use_detail_layer_only() {
        let trees = eager(ObjectPlacementConfig::trees());
        let details = eager(ObjectPlacementConfig::details());
        let mut chunk = flat_chunk(0.5);
        let mut host = HeadlessHost::new();
        let engine = PlacementEngine::default();
        engine.place(&trees, &mut chunk, &mut host);
        let general_free = chunk.occupancy.free_count(Layer::General);

        let placed = engine.place(&details, &mut chunk, &mut host);
        assert!(!placed.is_empty());
        assert_eq!(chunk.occupancy.free_count(Layer::General), general_free);
        for tree in chunk.objects_of(ObjectCategory::Tree) {
            assert!(
                !placed.iter().any(|d| d.cell == tree.cell),
                "detail spawned on a tree trunk"
            );
        }
    }

    #[test]
    fn test_height_range_rejects_everything() {
        let mut config = eager(ObjectPlacementConfig::trees());
        config.min_spawn_height = 0.6;
        let mut chunk = flat_chunk(0.5);
        let mut host = HeadlessHost::new();
        assert!(PlacementEngine::default().place(&config, &mut chunk, &mut host).is_empty());
        assert_eq!(chunk.occupancy.free_count(Layer::General), RESOLUTION * RESOLUTION);
    }

    #[test]
    fn test_zero_sensitivity_rejects_everything() {
        let mut config = eager(ObjectPlacementConfig::trees());
        config.flatness_sensitivity = 0.0;
        let mut chunk = flat_chunk(0.5);
        let mut host = HeadlessHost::new();
        assert!(PlacementEngine::default().place(&config, &mut chunk, &mut host).is_empty());
    }

    #[test]
    fn test_threshold_above_one_rejects_everything() {
        let mut config = eager(ObjectPlacementConfig::trees());
        config.spawn_threshold = 1.01;
        let mut chunk = flat_chunk(0.5);
        let mut host = HeadlessHost::new();
        assert!(PlacementEngine::default().place(&config, &mut chunk, &mut host).is_empty());
    }

    #[test]
    fn test_empty_pool_places_nothing() {
        let mut config = eager(ObjectPlacementConfig::trees());
        config.prefabs.clear();
        assert!(matches!(
            check_prefab_pool(&config),
            Err(WorldError::EmptyPrefabPool(ObjectCategory::Tree))
        ));
        let mut chunk = flat_chunk(0.5);
        let mut host = HeadlessHost::new();
        assert!(PlacementEngine::default().place(&config, &mut chunk, &mut host).is_empty());
    }

    #[test]
    fn test_placement_is_deterministic() {
        let config = eager(ObjectPlacementConfig::trees());
        let engine = PlacementEngine::default();
        let mut a = flat_chunk(0.5);
        let mut b = flat_chunk(0.5);
        let placed_a = engine.place(&config, &mut a, &mut HeadlessHost::new());
        let placed_b = engine.place(&config, &mut b, &mut HeadlessHost::new());
        assert_eq!(placed_a, placed_b);
        assert_eq!(a.occupancy, b.occupancy);
    }

    #[test]
    fn test_spawn_cap_yields_scan() {
        let mut config = eager(ObjectPlacementConfig::trees());
        config.prefabs = vec![PrefabSpec::new("sapling", (1, 1), (0, 0), 10)];
        let mut chunk = flat_chunk(0.5);
        let mut host = HeadlessHost::new();
        let noise = category_noise(&config, chunk.coord, RESOLUTION);
        let flat = flatness_mask(chunk.heights.values(), 1, 0.01);
        let mut scan = PlacementScan::new(&config, chunk.coord, noise, flat, &RenderGroupConfig::default());

        let budget = StepBudget::new(0, 1);
        assert_eq!(scan.step(&mut chunk, &mut host, budget), ScanProgress::Yielded);
        assert_eq!(scan.placed(), 1);
        let mut steps = 1;
        while scan.step(&mut chunk, &mut host, budget) == ScanProgress::Yielded {
            steps += 1;
        }
        assert!(scan.is_finished());
        assert!(scan.placed() <= steps + 1);
        assert_eq!(scan.step(&mut chunk, &mut host, budget), ScanProgress::Finished);
    }

    #[test]
    fn test_render_groups_closed_when_budget_small() {
        let config = eager(ObjectPlacementConfig::trees());
        let render = RenderGroupConfig {
            vertex_budget: 2000,
            ..RenderGroupConfig::default()
        };
        let mut chunk = flat_chunk(0.5);
        let mut host = HeadlessHost::new();
        let placed = PlacementEngine::new(&render).place(&config, &mut chunk, &mut host);
        assert!(placed.len() > 4);
        assert!(host.consolidated().len() >= 2);
    }
}
