//! Chunk generation pipeline driven by the cooperative scheduler.
//!
//! [`WorldGenerator`] owns the shared [`GenerationContext`] and a
//! [`Scheduler`] over it. Every requested chunk becomes one
//! [`ChunkGenerationTask`] on the generation queue, which walks these stages:
//!
//! 1. heights are computed on the noise pool and the terrain surface is built
//! 2. for each category, the noise map and flatness mask are computed on the
//!    pool, then the placement scan runs in budgeted steps
//! 3. after houses, villages are clustered
//! 4. the chunk is handed to the [`ChunkManager`], surfaces are stitched and a
//!    village connection pass is queued behind pending consolidation

use std::sync::Arc;

use glam::DVec2;
use grove_config::{Config, HeightNormalization, ObjectCategory};
use grove_terrain::{Grid, HeightGrid, HeightmapBuilder, NoiseMap, flatness_mask};
use image::RgbaImage;
use rustc_hash::FxHashMap;
use tracing::{debug, error, info, info_span, warn};

use crate::atlas::ColourAtlasTask;
use crate::chunk::{ChunkCoord, ChunkData};
use crate::chunk_manager::ChunkManager;
use crate::error::WorldError;
use crate::host::{RenderGroupId, WorldHost};
use crate::network::VillageNetwork;
use crate::noise_pool::{NoiseWorkerPool, Promise};
use crate::placement::{PlacementScan, ScanProgress, StepBudget, category_noise, check_prefab_pool};
use crate::scheduler::{QueueKind, Scheduler, Spawner, Step, Task, TurnReport};
use crate::village::VillageClusterer;

/// Running totals across every generated chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub chunks: usize,
    pub houses: usize,
    pub trees: usize,
    pub details: usize,
    pub villages: usize,
    pub pruned_clusters: usize,
    pub capped_houses: usize,
    pub connections: usize,
    pub connection_passes: usize,
    pub consolidated_groups: usize,
    /// Noise jobs recomputed on the scheduler thread after a worker hung up.
    pub recomputed_jobs: usize,
}

impl GenerationStats {
    fn record_placed(&mut self, category: ObjectCategory, count: usize) {
        match category {
            ObjectCategory::House => self.houses += count,
            ObjectCategory::Tree => self.trees += count,
            ObjectCategory::Detail => self.details += count,
        }
    }

    /// Objects placed across all categories, before village pruning.
    pub fn placed(&self) -> usize {
        self.houses + self.trees + self.details
    }
}

/// State shared by every task.
pub struct GenerationContext<H> {
    pub config: Arc<Config>,
    pub heightmap: Arc<HeightmapBuilder>,
    pub chunks: ChunkManager,
    pub network: VillageNetwork,
    pub host: H,
    pub noise_pool: NoiseWorkerPool,
    pub atlases: FxHashMap<ObjectCategory, RgbaImage>,
    pub stats: GenerationStats,
}

impl<H> GenerationContext<H> {
    /// Unwrap a polled promise, recomputing inline if its worker is gone.
    fn settle<T>(
        &mut self,
        polled: Result<Option<T>, WorldError>,
        job: &str,
        recompute: impl FnOnce() -> T,
    ) -> Option<T> {
        match polled {
            Ok(value) => value,
            Err(e) => {
                error!("{job}: {e}, recomputing inline");
                self.stats.recomputed_jobs += 1;
                Some(recompute())
            }
        }
    }
}

enum Stage {
    Start,
    Heights(Promise<HeightGrid>),
    Maps {
        noise: Promise<NoiseMap>,
        flat: Promise<Grid<bool>>,
        noise_ready: Option<NoiseMap>,
        flat_ready: Option<Grid<bool>>,
    },
    Scan(PlacementScan),
    Villages,
    Finish,
    Done,
}

/// Generates one chunk from heights to villages.
pub struct ChunkGenerationTask {
    coord: ChunkCoord,
    stage: Stage,
    chunk: Option<ChunkData>,
    next_category: usize,
    label: String,
}

impl ChunkGenerationTask {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            stage: Stage::Start,
            chunk: None,
            next_category: 0,
            label: format!("generate chunk {coord}"),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    fn submit_heights<H>(&self, ctx: &GenerationContext<H>) -> Promise<HeightGrid> {
        let builder = Arc::clone(&ctx.heightmap);
        let offset = self.coord.cell_offset(builder.resolution());
        let origin = self.coord.world_origin(ctx.config.terrain.chunk_size);
        ctx.noise_pool.submit(move || builder.build(offset, origin))
    }

    /// Stage for the next category with a usable prefab pool, or `Finish`.
    fn begin_next_category<H>(&mut self, ctx: &GenerationContext<H>) -> Stage {
        let Some(chunk) = self.chunk.as_ref() else {
            return Stage::Done;
        };
        while let Some(&category) = ObjectCategory::ALL.get(self.next_category) {
            self.next_category += 1;
            let config = ctx.config.objects(category);
            if let Err(e) = check_prefab_pool(config) {
                warn!("{e}, skipping category");
                if category == ObjectCategory::House {
                    return Stage::Villages;
                }
                continue;
            }

            let (coord, resolution) = (self.coord, chunk.resolution());
            let owned = config.clone();
            let noise = ctx
                .noise_pool
                .submit(move || category_noise(&owned, coord, resolution));
            let heights = Arc::clone(&chunk.heights);
            let (radius, sensitivity) = (config.flatness_radius, config.flatness_sensitivity);
            let flat = ctx
                .noise_pool
                .submit(move || flatness_mask(heights.values(), radius, sensitivity));
            return Stage::Maps {
                noise,
                flat,
                noise_ready: None,
                flat_ready: None,
            };
        }
        Stage::Finish
    }

    fn current_category(&self) -> ObjectCategory {
        ObjectCategory::ALL[self.next_category.saturating_sub(1)]
    }

    fn advance<H: WorldHost>(
        &mut self,
        stage: Stage,
        ctx: &mut GenerationContext<H>,
        spawner: &mut Spawner<GenerationContext<H>>,
    ) -> Stage {
        match stage {
            Stage::Start => Stage::Heights(self.submit_heights(ctx)),

            Stage::Heights(mut promise) => {
                let polled = promise.try_take();
                let builder = Arc::clone(&ctx.heightmap);
                let (coord, size) = (self.coord, ctx.config.terrain.chunk_size);
                let Some(heights) = ctx.settle(polled, "heights", || {
                    builder.build(coord.cell_offset(builder.resolution()), coord.world_origin(size))
                }) else {
                    return Stage::Heights(promise);
                };

                let terrain_height = ctx.config.terrain.terrain_height;
                let chunk = ChunkData::new(self.coord, Arc::new(heights), size, terrain_height);
                ctx.host
                    .build_surface(self.coord, Arc::clone(&chunk.heights), size, terrain_height);
                debug!(resolution = chunk.resolution(), "heights ready");
                self.chunk = Some(chunk);
                self.begin_next_category(ctx)
            }

            Stage::Maps {
                mut noise,
                mut flat,
                mut noise_ready,
                mut flat_ready,
            } => {
                let Some(chunk) = self.chunk.as_ref() else {
                    return Stage::Done;
                };
                let config = ctx.config.objects(self.current_category()).clone();
                let (coord, resolution) = (self.coord, chunk.resolution());
                let heights = Arc::clone(&chunk.heights);

                if noise_ready.is_none() {
                    let polled = noise.try_take();
                    noise_ready = ctx.settle(polled, "category noise", || {
                        category_noise(&config, coord, resolution)
                    });
                }
                if flat_ready.is_none() {
                    let polled = flat.try_take();
                    flat_ready = ctx.settle(polled, "flatness mask", || {
                        flatness_mask(
                            heights.values(),
                            config.flatness_radius,
                            config.flatness_sensitivity,
                        )
                    });
                }

                match (noise_ready, flat_ready) {
                    (Some(noise_map), Some(mask)) => Stage::Scan(PlacementScan::new(
                        &config,
                        coord,
                        noise_map,
                        mask,
                        &ctx.config.render_groups,
                    )),
                    (noise_ready, flat_ready) => Stage::Maps {
                        noise,
                        flat,
                        noise_ready,
                        flat_ready,
                    },
                }
            }

            Stage::Scan(mut scan) => {
                let Some(chunk) = self.chunk.as_mut() else {
                    return Stage::Done;
                };
                let budget = StepBudget::new(
                    ctx.config.scheduler.cells_per_step,
                    ctx.config.objects(scan.category()).max_spawns_per_step,
                );
                let progress = scan.step(chunk, &mut ctx.host, budget);
                for group in scan.take_closed_groups() {
                    spawner.push(QueueKind::Consolidation, ConsolidateGroupTask::new(group));
                }
                if progress == ScanProgress::Yielded {
                    return Stage::Scan(scan);
                }

                ctx.stats.record_placed(scan.category(), scan.placed());
                if scan.category() == ObjectCategory::House {
                    Stage::Villages
                } else {
                    self.begin_next_category(ctx)
                }
            }

            Stage::Villages => {
                let Some(chunk) = self.chunk.as_mut() else {
                    return Stage::Done;
                };
                if let Some(village) = ctx.config.houses.village() {
                    let report = VillageClusterer::new(village).run(chunk, &mut ctx.host);
                    ctx.stats.villages += report.villages;
                    ctx.stats.pruned_clusters += report.pruned;
                    ctx.stats.capped_houses += report.capped_houses;
                }
                self.begin_next_category(ctx)
            }

            Stage::Finish => {
                let Some(chunk) = self.chunk.take() else {
                    return Stage::Done;
                };
                ctx.network.register_chunk(&chunk);
                let objects = chunk.objects.len();
                let villages = chunk.villages.len();
                for coord in ctx.chunks.on_chunk_ready(chunk) {
                    if let Some(ready) = ctx.chunks.get(coord) {
                        ctx.host.stitch(coord, ready.neighbors);
                    }
                }
                ctx.stats.chunks += 1;
                spawner.push(QueueKind::Generation, ConnectVillagesTask::new());
                info!(objects, villages, "chunk generated");
                Stage::Done
            }

            Stage::Done => Stage::Done,
        }
    }
}

impl<H: WorldHost> Task<GenerationContext<H>> for ChunkGenerationTask {
    fn label(&self) -> &str {
        &self.label
    }

    fn step(
        &mut self,
        ctx: &mut GenerationContext<H>,
        spawner: &mut Spawner<GenerationContext<H>>,
    ) -> Step {
        let _span = info_span!("chunk", x = self.coord.x, z = self.coord.z).entered();
        let stage = std::mem::replace(&mut self.stage, Stage::Done);
        self.stage = self.advance(stage, ctx, spawner);
        match self.stage {
            Stage::Done => Step::Done,
            _ => Step::Yield,
        }
    }
}

/// Merges one closed render group.
pub struct ConsolidateGroupTask {
    group: RenderGroupId,
}

impl ConsolidateGroupTask {
    pub fn new(group: RenderGroupId) -> Self {
        Self { group }
    }
}

impl<H: WorldHost> Task<GenerationContext<H>> for ConsolidateGroupTask {
    fn label(&self) -> &str {
        "consolidate render group"
    }

    fn step(&mut self, ctx: &mut GenerationContext<H>, _: &mut Spawner<GenerationContext<H>>) -> Step {
        ctx.host.consolidate(self.group);
        ctx.stats.consolidated_groups += 1;
        Step::Done
    }
}

/// Links village centres once every pending consolidation has run.
#[derive(Default)]
pub struct ConnectVillagesTask {
    waited: bool,
}

impl ConnectVillagesTask {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: WorldHost> Task<GenerationContext<H>> for ConnectVillagesTask {
    fn label(&self) -> &str {
        "connect villages"
    }

    fn step(&mut self, ctx: &mut GenerationContext<H>, _: &mut Spawner<GenerationContext<H>>) -> Step {
        if !self.waited {
            self.waited = true;
            return Step::WaitFor(QueueKind::Consolidation);
        }
        ctx.stats.connection_passes += 1;
        if let Some(village) = ctx.config.houses.village() {
            let made = ctx.network.connect(village, &mut ctx.host);
            ctx.stats.connections += made.len();
        }
        Step::Done
    }
}

/// Streams chunks around an observer through the cooperative scheduler.
pub struct WorldGenerator<H> {
    scheduler: Scheduler<GenerationContext<H>>,
    ctx: GenerationContext<H>,
}

impl<H: WorldHost> WorldGenerator<H> {
    /// Generator with a noise pool sized from `config.scheduler.noise_threads`.
    pub fn new(config: Config, host: H) -> Self {
        let pool = NoiseWorkerPool::from_config(config.scheduler.noise_threads);
        Self::with_pool(config, host, pool)
    }

    pub fn with_pool(mut config: Config, host: H, noise_pool: NoiseWorkerPool) -> Self {
        if config.streaming.multi_chunk
            && matches!(config.terrain.normalization, HeightNormalization::Local)
        {
            warn!("local height normalization breaks chunk seams, using theoretical range");
            config.terrain.normalization = HeightNormalization::Theoretical;
        } else if !config.streaming.multi_chunk
            && matches!(config.terrain.normalization, HeightNormalization::Theoretical)
        {
            // A lone chunk has no seams to keep, so it spans the full height range.
            debug!("single chunk generation, using local height range");
            config.terrain.normalization = HeightNormalization::Local;
        }

        let mut scheduler = Scheduler::new(&config.scheduler);
        for category in ObjectCategory::ALL {
            scheduler.push(
                QueueKind::Misc,
                ColourAtlasTask::new(
                    category,
                    config.objects(category).palette,
                    config.render_groups.atlas_size,
                ),
            );
        }

        let heightmap = Arc::new(HeightmapBuilder::new(&config.terrain));
        Self {
            scheduler,
            ctx: GenerationContext {
                config: Arc::new(config),
                heightmap,
                chunks: ChunkManager::new(),
                network: VillageNetwork::new(),
                host,
                noise_pool,
                atlases: FxHashMap::default(),
                stats: GenerationStats::default(),
            },
        }
    }

    /// Queue generation of `coord` unless it is known. Returns true if queued.
    pub fn request_chunk(&mut self, coord: ChunkCoord) -> bool {
        let queued = self.ctx.chunks.request_chunk(coord);
        self.enqueue_requests();
        queued
    }

    /// Run the observer distance check and queue any neighbours it requests.
    /// Does nothing in single-chunk mode.
    pub fn update_observer(&mut self, position: DVec2) -> Option<ChunkCoord> {
        let streaming = &self.ctx.config.streaming;
        if !streaming.multi_chunk {
            return None;
        }
        let (size, view) = (self.ctx.config.terrain.chunk_size, streaming.view_distance);
        let expanded = self.ctx.chunks.observe(position, size, view);
        if let Some(coord) = expanded {
            debug!(chunk = %coord, "observer expanding neighbours");
        }
        self.enqueue_requests();
        expanded
    }

    fn enqueue_requests(&mut self) {
        for coord in self.ctx.chunks.drain_requests() {
            self.scheduler
                .push(QueueKind::Generation, ChunkGenerationTask::new(coord));
        }
    }

    pub fn turn(&mut self) -> TurnReport {
        let report = self.scheduler.turn(&mut self.ctx);
        self.enqueue_requests();
        report
    }

    /// Turn until every queue is empty or `max_turns` pass. Returns the turns taken.
    pub fn run_until_idle(&mut self, max_turns: usize) -> usize {
        let mut turns = 0;
        while turns < max_turns && !self.is_idle() {
            self.turn();
            turns += 1;
        }
        turns
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn queue_len(&self, queue: QueueKind) -> usize {
        self.scheduler.len(queue)
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    pub fn chunks(&self) -> &ChunkManager {
        &self.ctx.chunks
    }

    pub fn network(&self) -> &VillageNetwork {
        &self.ctx.network
    }

    pub fn host(&self) -> &H {
        &self.ctx.host
    }

    pub fn atlas(&self, category: ObjectCategory) -> Option<&RgbaImage> {
        self.ctx.atlases.get(&category)
    }

    pub fn stats(&self) -> GenerationStats {
        self.ctx.stats
    }

    pub fn into_host(self) -> H {
        self.ctx.host
    }
}
