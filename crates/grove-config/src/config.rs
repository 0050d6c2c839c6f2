//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::generation::{
    CategoryExtension, MapConfig, ObjectCategory, ObjectPlacementConfig, VillageConfig,
};

/// Top-level generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Terrain height map settings.
    pub terrain: MapConfig,
    /// House placement and village settings.
    pub houses: ObjectPlacementConfig,
    /// Tree placement settings.
    pub trees: ObjectPlacementConfig,
    /// Detail placement settings.
    pub details: ObjectPlacementConfig,
    /// Render group consolidation settings.
    pub render_groups: RenderGroupConfig,
    /// Chunk streaming settings.
    pub streaming: StreamingConfig,
    /// Cooperative scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terrain: MapConfig::default(),
            houses: ObjectPlacementConfig::houses(),
            trees: ObjectPlacementConfig::trees(),
            details: ObjectPlacementConfig::details(),
            render_groups: RenderGroupConfig::default(),
            streaming: StreamingConfig::default(),
            scheduler: SchedulerConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

/// Render group settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderGroupConfig {
    /// Vertices a render group may hold before a new group is started.
    pub vertex_budget: u32,
    /// Request consolidation of closed groups.
    pub consolidate: bool,
    /// Side length in pixels of each category's colour atlas.
    pub atlas_size: u32,
}

/// Chunk streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingConfig {
    /// Observer distance to a chunk centre that triggers neighbour creation.
    pub view_distance: f64,
    /// Whether more than one chunk will be generated.
    pub multi_chunk: bool,
}

/// Cooperative scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Steps each queue may run per scheduler turn.
    pub steps_per_turn: u32,
    /// Wall-clock budget per queue per turn, in milliseconds (0 = unlimited).
    pub turn_budget_ms: u64,
    /// Noise worker threads (0 = derive from the CPU count).
    pub noise_threads: usize,
    /// Grid cells a placement scan visits before yielding.
    pub cells_per_step: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write PNG previews of generated chunks.
    pub export_previews: bool,
}

// --- Default implementations ---

impl Default for RenderGroupConfig {
    fn default() -> Self {
        Self {
            vertex_budget: 64_000,
            consolidate: true,
            atlas_size: 64,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            view_distance: 500.0,
            multi_chunk: true,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            steps_per_turn: 8,
            turn_budget_ms: 16,
            noise_threads: 0,
            cells_per_step: 16_384,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            export_previews: false,
        }
    }
}

// --- Accessors ---

impl Config {
    /// Placement settings for `category`.
    pub fn objects(&self, category: ObjectCategory) -> &ObjectPlacementConfig {
        match category {
            ObjectCategory::House => &self.houses,
            ObjectCategory::Tree => &self.trees,
            ObjectCategory::Detail => &self.details,
        }
    }

    /// Default directory holding `config.ron`.
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("grove")
    }
}

// --- Validation ---

impl Config {
    /// Rejects values that no clamping can make usable.
    ///
    /// Degenerate noise parameters are not errors; they are sanitized where used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.terrain.resolution < 3 {
            return Err(ConfigError::Invalid {
                field: "terrain.resolution",
                reason: format!("must be at least 3, got {}", self.terrain.resolution),
            });
        }
        if !(self.terrain.chunk_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "terrain.chunk_size",
                reason: format!("must be positive, got {}", self.terrain.chunk_size),
            });
        }
        if let Some(village) = self.houses.village()
            && village.min_houses > village.max_houses
        {
            return Err(ConfigError::Invalid {
                field: "houses.extension.min_houses",
                reason: format!(
                    "min_houses ({}) exceeds max_houses ({})",
                    village.min_houses, village.max_houses
                ),
            });
        }
        Ok(())
    }

    /// Restores the category tag of each object section.
    ///
    /// A partially written section falls back to the tree defaults for missing
    /// fields, which would otherwise silently drop the house village rules.
    pub fn repair_categories(&mut self) {
        if self.houses.category() != ObjectCategory::House {
            log::warn!("houses section lacks village rules, using defaults");
            self.houses.extension = CategoryExtension::House(VillageConfig::default());
        }
        if self.trees.category() != ObjectCategory::Tree {
            log::warn!("trees section has a foreign category tag, resetting");
            self.trees.extension = CategoryExtension::Tree;
        }
        if self.details.category() != ObjectCategory::Detail {
            log::warn!("details section has a foreign category tag, resetting");
            self.details.extension = CategoryExtension::Detail;
        }
    }

    fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = ron::from_str(contents).map_err(ConfigError::ParseError)?;
        config.repair_categories();
        config.validate()?;
        Ok(config)
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config = Config::parse(&contents)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config = Config::parse(&contents)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::HeightNormalization;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(4))
                .unwrap();
        assert!(!ron_str.is_empty());
        assert!(ron_str.contains("resolution: 513"));
        assert!(ron_str.contains("vertex_budget: 64000"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(terrain: (resolution: 129), debug: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.terrain.resolution, 129);
        assert_eq!(config.terrain.chunk_size, 1000.0);
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_normalization_parses_from_ron() {
        let ron_str = "(terrain: (normalization: Fixed(min: 0.1, max: 0.9)))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(
            config.terrain.normalization,
            HeightNormalization::Fixed { min: 0.1, max: 0.9 }
        );
    }

    #[test]
    fn test_objects_accessor_matches_sections() {
        let config = Config::default();
        assert_eq!(config.objects(ObjectCategory::House), &config.houses);
        assert_eq!(config.objects(ObjectCategory::Tree), &config.trees);
        assert_eq!(config.objects(ObjectCategory::Detail), &config.details);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.terrain.noise.seed = 99;
        config.streaming.view_distance = 750.0;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.trees.spawn_density = 0.5;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().trees.spawn_density, 0.5);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_partial_house_section_keeps_village_rules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.ron"),
            "(houses: (spawn_density: 0.05))",
        )
        .unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config.houses.spawn_density, 0.05);
        assert_eq!(config.houses.category(), ObjectCategory::House);
        assert!(config.houses.village().is_some());
    }

    #[test]
    fn test_validate_rejects_tiny_resolution() {
        let mut config = Config::default();
        config.terrain.resolution = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "terrain.resolution", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_village_bounds() {
        let mut config = Config::default();
        if let CategoryExtension::House(village) = &mut config.houses.extension {
            village.min_houses = 12;
            village.max_houses = 4;
        }
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let result: Result<Config, _> = ron::from_str("{{not valid}}");
        assert!(result.is_err());
    }
}
