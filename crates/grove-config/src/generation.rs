//! Generation tunables: noise, terrain mapping, object categories and villages.
//!
//! These are loaded once before generation starts and are treated as
//! immutable inputs by the terrain and world crates.

use serde::{Deserialize, Serialize};

/// Parameters for one fractal noise field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoiseParameters {
    /// Seed for the octave offset generator.
    pub seed: u64,
    /// Number of octaves to accumulate (at least 1).
    pub octaves: u32,
    /// Amplitude multiplier applied after each octave.
    pub persistence: f64,
    /// Frequency multiplier applied after each octave.
    pub lacunarity: f64,
    /// Cells per noise unit. Larger values give broader features.
    pub scale: f64,
}

impl NoiseParameters {
    /// Smallest value substituted for non-positive floating point parameters.
    pub const MIN_POSITIVE: f64 = 0.001;

    /// Returns a copy with every degenerate value clamped to a small positive default.
    ///
    /// Zero, negative and NaN values are replaced; this never fails.
    pub fn sanitized(&self) -> Self {
        let positive = |v: f64| if v > 0.0 { v } else { Self::MIN_POSITIVE };
        Self {
            seed: self.seed,
            octaves: self.octaves.max(1),
            persistence: positive(self.persistence),
            lacunarity: positive(self.lacunarity),
            scale: positive(self.scale),
        }
    }

    /// Sum of the octave amplitudes, i.e. the largest value a `[0, 1]`
    /// coherent primitive can accumulate to.
    pub fn amplitude_sum(&self) -> f64 {
        let params = self.sanitized();
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        for _ in 0..params.octaves {
            sum += amplitude;
            amplitude *= params.persistence;
        }
        sum
    }
}

impl Default for NoiseParameters {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 1,
            persistence: 0.5,
            lacunarity: 1.8,
            scale: 50.0,
        }
    }
}

/// One key of a [`HeightCurve`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CurveKey {
    /// Input position in `[0, 1]`.
    pub t: f64,
    /// Output value at `t`.
    pub value: f64,
}

/// Piecewise-linear response curve applied to normalized heights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeightCurve {
    /// Keys sorted by ascending `t`.
    pub keys: Vec<CurveKey>,
}

impl HeightCurve {
    /// Identity curve through `(0, 0)` and `(1, 1)`.
    pub fn linear() -> Self {
        Self {
            keys: vec![
                CurveKey { t: 0.0, value: 0.0 },
                CurveKey { t: 1.0, value: 1.0 },
            ],
        }
    }

    /// Evaluates the curve at `t`, holding the end values outside the key range.
    pub fn evaluate(&self, t: f64) -> f64 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return t;
        };
        if t <= first.t {
            return first.value;
        }
        if t >= last.t {
            return last.value;
        }
        for pair in self.keys.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.t {
                let span = b.t - a.t;
                if span <= 0.0 {
                    return b.value;
                }
                return a.value + (b.value - a.value) * ((t - a.t) / span);
            }
        }
        last.value
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

/// How raw noise heights are mapped into `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum HeightNormalization {
    /// Use the extremes sampled within the chunk. Only valid for a single chunk.
    Local,
    /// Use `[0, sum of octave amplitudes]`, identical for every chunk.
    Theoretical,
    /// Use an explicit range, identical for every chunk.
    Fixed {
        /// Raw value mapped to 0.
        min: f64,
        /// Raw value mapped to 1.
        max: f64,
    },
}

impl HeightNormalization {
    /// Returns true when every chunk shares the same range.
    pub fn is_global(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

/// Terrain height map configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    /// Height grid resolution per side.
    pub resolution: usize,
    /// Side length of one chunk in world units.
    pub chunk_size: f64,
    /// World-space height of a normalized height of 1.0.
    pub terrain_height: f64,
    /// Noise used for the terrain surface.
    pub noise: NoiseParameters,
    /// Multiplier applied after the response curve.
    pub height_multiplier: f64,
    /// Response curve applied to normalized heights.
    pub height_curve: HeightCurve,
    /// Normalization range policy.
    pub normalization: HeightNormalization,
}

impl MapConfig {
    /// Resolution used by the reference terrain.
    pub const DEFAULT_RESOLUTION: usize = 513;
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            resolution: Self::DEFAULT_RESOLUTION,
            chunk_size: 1000.0,
            terrain_height: 20.0,
            noise: NoiseParameters {
                seed: 0,
                octaves: 4,
                persistence: 0.5,
                lacunarity: 1.8,
                scale: 150.0,
            },
            height_multiplier: 1.0,
            height_curve: HeightCurve::linear(),
            normalization: HeightNormalization::Theoretical,
        }
    }
}

/// The three placeable object categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectCategory {
    /// Houses, later clustered into villages.
    House,
    /// Trees.
    Tree,
    /// Ground-cover details placed in the detail layer.
    Detail,
}

impl ObjectCategory {
    /// All categories in generation order.
    pub const ALL: [ObjectCategory; 3] = [Self::House, Self::Tree, Self::Detail];

    /// Short lowercase name used in logs and file names.
    pub fn name(self) -> &'static str {
        match self {
            Self::House => "houses",
            Self::Tree => "trees",
            Self::Detail => "details",
        }
    }

    /// Stable numeric tag, used when deriving seeds.
    pub fn tag(self) -> u64 {
        match self {
            Self::House => 1,
            Self::Tree => 2,
            Self::Detail => 3,
        }
    }
}

/// One placeable archetype.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrefabSpec {
    /// Identifier handed to the object host.
    pub id: String,
    /// Footprint extent along world X (grid columns), used for collision.
    pub required_x: usize,
    /// Footprint extent along world Z (grid rows), used for collision.
    pub required_z: usize,
    /// Visually occupied extent along world X, carved from the detail layer.
    pub actual_x: usize,
    /// Visually occupied extent along world Z, carved from the detail layer.
    pub actual_z: usize,
    /// Vertices of the prefab mesh including children.
    pub vertex_count: u32,
}

impl PrefabSpec {
    /// Convenience constructor.
    pub fn new(
        id: impl Into<String>,
        required: (usize, usize),
        actual: (usize, usize),
        vertex_count: u32,
    ) -> Self {
        Self {
            id: id.into(),
            required_x: required.0,
            required_z: required.1,
            actual_x: actual.0,
            actual_z: actual.1,
            vertex_count,
        }
    }
}

impl Default for PrefabSpec {
    fn default() -> Self {
        Self::new("prefab", (1, 1), (1, 1), 100)
    }
}

/// RGBA colours used to paint a category's colour atlas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Palette {
    /// Bottom-left quadrant.
    pub primary: [u8; 4],
    /// Bottom-right quadrant.
    pub secondary: [u8; 4],
    /// Top-left quadrant.
    pub tertiary: [u8; 4],
    /// Top-right quadrant.
    pub quaternary: [u8; 4],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            primary: [0, 255, 0, 255],
            secondary: [139, 69, 19, 255],
            tertiary: [255, 255, 255, 255],
            quaternary: [0, 0, 0, 255],
        }
    }
}

/// Village clustering and connection tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VillageConfig {
    /// Landmark that replaces the most central house. `None` leaves the house in place.
    pub center_prefab: Option<PrefabSpec>,
    /// Structure spawned between connected centers. `None` disables connections.
    pub connection_prefab: Option<String>,
    /// Longest allowed connection between two connection points.
    pub max_connection_distance: f64,
    /// Connections per center before it is saturated.
    pub max_connections: usize,
    /// Radius in cells of the square cleared around every building.
    pub clear_radius: usize,
    /// Distance from a founding house within which houses join its village.
    pub max_village_distance: f64,
    /// Villages smaller than this are removed.
    pub min_houses: usize,
    /// Villages larger than this lose their outermost houses.
    pub max_houses: usize,
    /// Radius of the capsule swept between connection points.
    pub sweep_radius: f64,
    /// Height of the connection point above the center.
    pub connection_point_height: f64,
}

impl Default for VillageConfig {
    fn default() -> Self {
        Self {
            center_prefab: Some(PrefabSpec::new("village_center", (6, 6), (5, 5), 3000)),
            connection_prefab: Some("bridge".to_string()),
            max_connection_distance: 300.0,
            max_connections: 2,
            clear_radius: 20,
            max_village_distance: 150.0,
            min_houses: 5,
            max_houses: 10,
            sweep_radius: 1.5,
            connection_point_height: 4.0,
        }
    }
}

/// Category-specific extension of [`ObjectPlacementConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CategoryExtension {
    /// Trees carry no extra fields.
    Tree,
    /// Details carry no extra fields.
    Detail,
    /// Houses carry the village rules.
    House(VillageConfig),
}

impl CategoryExtension {
    /// Category described by this extension.
    pub fn category(&self) -> ObjectCategory {
        match self {
            Self::Tree => ObjectCategory::Tree,
            Self::Detail => ObjectCategory::Detail,
            Self::House(_) => ObjectCategory::House,
        }
    }
}

/// Placement tunables for one object category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObjectPlacementConfig {
    /// Noise field driving spatial variation.
    pub noise: NoiseParameters,
    /// Square radius searched by the flatness mask.
    pub flatness_radius: usize,
    /// Largest height difference still considered flat.
    pub flatness_sensitivity: f64,
    /// Lowest normalized height objects may spawn at.
    pub min_spawn_height: f64,
    /// Highest normalized height objects may spawn at.
    pub max_spawn_height: f64,
    /// Probability scalar of the density gate.
    pub spawn_density: f64,
    /// Cutoff applied to `1 - noise`.
    pub spawn_threshold: f64,
    /// Placements committed before the scan yields.
    pub max_spawns_per_step: usize,
    /// Archetypes chosen uniformly per candidate cell.
    pub prefabs: Vec<PrefabSpec>,
    /// Atlas colours.
    pub palette: Palette,
    /// Category tag and category-only fields.
    pub extension: CategoryExtension,
}

impl ObjectPlacementConfig {
    /// Category this configuration places.
    pub fn category(&self) -> ObjectCategory {
        self.extension.category()
    }

    /// Village rules, present only for houses.
    pub fn village(&self) -> Option<&VillageConfig> {
        match &self.extension {
            CategoryExtension::House(village) => Some(village),
            _ => None,
        }
    }

    /// Largest footprint extent across the prefab pool.
    pub fn max_required_extent(&self) -> usize {
        self.prefabs
            .iter()
            .map(|p| p.required_x.max(p.required_z))
            .max()
            .unwrap_or(0)
    }

    /// Default house configuration.
    pub fn houses() -> Self {
        Self {
            noise: NoiseParameters {
                seed: 7,
                octaves: 2,
                persistence: 0.5,
                lacunarity: 2.0,
                scale: 60.0,
            },
            flatness_radius: 2,
            flatness_sensitivity: 0.004,
            min_spawn_height: 0.1,
            max_spawn_height: 0.6,
            spawn_density: 0.02,
            spawn_threshold: 0.45,
            max_spawns_per_step: 16,
            prefabs: vec![
                PrefabSpec::new("house_small", (4, 4), (3, 3), 1200),
                PrefabSpec::new("house_large", (6, 5), (5, 4), 2400),
            ],
            palette: Palette {
                primary: [178, 34, 34, 255],
                ..Palette::default()
            },
            extension: CategoryExtension::House(VillageConfig::default()),
        }
    }

    /// Default tree configuration.
    pub fn trees() -> Self {
        Self {
            noise: NoiseParameters {
                seed: 11,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.0,
                scale: 40.0,
            },
            flatness_radius: 1,
            flatness_sensitivity: 0.0052,
            min_spawn_height: 0.05,
            max_spawn_height: 0.7,
            spawn_density: 0.1,
            spawn_threshold: 0.3,
            max_spawns_per_step: 64,
            prefabs: vec![
                PrefabSpec::new("pine", (2, 2), (0, 0), 500),
                PrefabSpec::new("oak", (2, 2), (1, 1), 800),
            ],
            palette: Palette::default(),
            extension: CategoryExtension::Tree,
        }
    }

    /// Default detail configuration.
    pub fn details() -> Self {
        Self {
            noise: NoiseParameters {
                seed: 23,
                octaves: 1,
                persistence: 0.5,
                lacunarity: 1.8,
                scale: 12.0,
            },
            flatness_radius: 1,
            flatness_sensitivity: 0.01,
            min_spawn_height: 0.0,
            max_spawn_height: 0.8,
            spawn_density: 0.3,
            spawn_threshold: 0.2,
            max_spawns_per_step: 256,
            prefabs: vec![
                PrefabSpec::new("rock", (1, 1), (1, 1), 60),
                PrefabSpec::new("bush", (1, 1), (0, 0), 120),
            ],
            palette: Palette {
                primary: [107, 142, 35, 255],
                ..Palette::default()
            },
            extension: CategoryExtension::Detail,
        }
    }
}

impl Default for ObjectPlacementConfig {
    fn default() -> Self {
        Self::trees()
    }
}
