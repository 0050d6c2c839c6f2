//! Object placement, villages and chunk streaming on top of `grove-terrain`.
//!
//! The generator talks to the outside world only through the traits in
//! [`host`]; [`headless::HeadlessHost`] implements them in memory.

pub mod atlas;
pub mod chunk;
pub mod chunk_manager;
pub mod error;
pub mod generator;
pub mod headless;
pub mod host;
pub mod network;
pub mod noise_pool;
pub mod occupancy;
pub mod placement;
pub mod scheduler;
pub mod seed;
pub mod village;

pub use atlas::ColourAtlasTask;
pub use chunk::{ChunkCoord, ChunkData, ChunkNeighbors, HouseRecord, NEIGHBOR_OFFSETS, PlacedObject};
pub use chunk_manager::ChunkManager;
pub use error::WorldError;
pub use generator::{
    ChunkGenerationTask, ConnectVillagesTask, ConsolidateGroupTask, GenerationContext,
    GenerationStats, WorldGenerator,
};
pub use headless::HeadlessHost;
pub use host::{
    CollisionQuery, HitTag, InstanceKind, MeshConsolidator, ObjectHandle, ObjectHost,
    RenderGroupId, SpawnRequest, TerrainHost, WorldHost,
};
pub use network::{ConnectionRecord, VillageConnectionData, VillageNetwork, VillageNode};
pub use noise_pool::{NoiseWorkerPool, Promise};
pub use occupancy::{Footprint, Layer, OccupancyGrid};
pub use placement::{PlacementEngine, PlacementScan, RenderGroupTracker, ScanProgress, StepBudget};
pub use scheduler::{QueueKind, Scheduler, Spawner, Step, Task, TurnReport};
pub use village::{VillageCenter, VillageClusterer, VillageData, VillageReport};
