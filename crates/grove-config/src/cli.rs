//! Command-line argument parsing for the grove generator.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Grove command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "grove", about = "Procedural terrain and village generator")]
pub struct CliArgs {
    /// Terrain noise seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Height grid resolution per chunk side.
    #[arg(long)]
    pub resolution: Option<usize>,

    /// Observer distance that triggers neighbour creation.
    #[arg(long)]
    pub view_distance: Option<f64>,

    /// Generate only the origin chunk.
    #[arg(long)]
    pub single_chunk: bool,

    /// Noise worker threads (0 = automatic).
    #[arg(long)]
    pub noise_threads: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Write PNG previews of every generated chunk.
    #[arg(long)]
    pub export_previews: bool,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.terrain.noise.seed = seed;
        }
        if let Some(resolution) = args.resolution {
            self.terrain.resolution = resolution;
        }
        if let Some(distance) = args.view_distance {
            self.streaming.view_distance = distance;
        }
        if args.single_chunk {
            self.streaming.multi_chunk = false;
        }
        if let Some(threads) = args.noise_threads {
            self.scheduler.noise_threads = threads;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if args.export_previews {
            self.debug.export_previews = true;
        }
    }
}
