//! `grove`: streams procedurally generated chunks around a simulated observer.
//!
//! Loads `config.ron` (creating it on first run), applies CLI overrides,
//! generates the origin chunk and then walks an observer east so the chunk
//! manager keeps requesting neighbours. Statistics are logged at the end and
//! PNG previews are written when enabled.
//!
//! Run with: `cargo run -p grove-app -- --seed 42`

mod preview;

use clap::Parser;
use glam::DVec2;
use grove_config::{CliArgs, Config};
use grove_world::{ChunkCoord, HeadlessHost, WorldGenerator};
use tracing::{info, warn};

/// Observer waypoints, in chunk widths east of the origin chunk centre.
const WALK: [f64; 6] = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5];

/// Turns allowed per waypoint before moving on.
const MAX_TURNS_PER_WAYPOINT: usize = 1_000_000;

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(Config::default_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    grove_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(e) = config.validate() {
        warn!("{e}, falling back to defaults");
        config = Config::default();
        config.apply_cli_overrides(&args);
    }

    info!(
        seed = config.terrain.noise.seed,
        resolution = config.terrain.resolution,
        chunk_size = config.terrain.chunk_size,
        multi_chunk = config.streaming.multi_chunk,
        "starting generation"
    );

    let export = config.debug.export_previews;
    let chunk_size = config.terrain.chunk_size;
    let mut world = WorldGenerator::new(config, HeadlessHost::new());
    world.request_chunk(ChunkCoord::ORIGIN);
    world.run_until_idle(MAX_TURNS_PER_WAYPOINT);

    let start = ChunkCoord::ORIGIN.world_centre(chunk_size);
    for offset in WALK {
        let observer = start + DVec2::new(offset * chunk_size, 0.0);
        if let Some(coord) = world.update_observer(observer) {
            info!(chunk = %coord, x = observer.x, z = observer.y, "observer expanded neighbours");
        }
        let turns = world.run_until_idle(MAX_TURNS_PER_WAYPOINT);
        if !world.is_idle() {
            warn!(turns, "generation still busy, moving observer on");
        }
    }

    let stats = world.stats();
    info!(
        chunks = stats.chunks,
        houses = stats.houses,
        trees = stats.trees,
        details = stats.details,
        villages = stats.villages,
        pruned_clusters = stats.pruned_clusters,
        capped_houses = stats.capped_houses,
        connections = stats.connections,
        consolidated_groups = stats.consolidated_groups,
        live_objects = world.host().object_count(),
        "generation finished"
    );
    if stats.recomputed_jobs > 0 {
        warn!(jobs = stats.recomputed_jobs, "noise jobs were recomputed inline");
    }

    if export {
        let dir = config_dir.join("previews");
        match preview::export_all(&world, &dir) {
            Ok(count) => info!(count, dir = %dir.display(), "previews written"),
            Err(e) => warn!("failed to write previews: {e}"),
        }
    }
}
