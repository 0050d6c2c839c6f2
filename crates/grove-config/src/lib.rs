//! Configuration system for the grove generator.
//!
//! Holds every generation tunable (noise, terrain mapping, object categories,
//! villages, scheduling) as serde structs persisted to disk as RON. Supports
//! CLI overrides via clap, hot-reload detection, and forward/backward
//! compatible serialization.

mod cli;
mod config;
mod error;
mod generation;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, RenderGroupConfig, SchedulerConfig, StreamingConfig};
pub use error::ConfigError;
pub use generation::{
    CategoryExtension, CurveKey, HeightCurve, HeightNormalization, MapConfig, NoiseParameters,
    ObjectCategory, ObjectPlacementConfig, Palette, PrefabSpec, VillageConfig,
};
