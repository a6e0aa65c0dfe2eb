/// Constants for terrain generation and placement search
/// Elevation thresholds for terrain classification (normalized 0..1)
pub const WATER_THRESHOLD: f32 = 0.2;
pub const PLAINS_THRESHOLD: f32 = 0.45;
pub const FOREST_THRESHOLD: f32 = 0.6;
pub const HILLS_THRESHOLD: f32 = 0.8;

/// Feature extraction
pub const PEAK_ELEVATION: f32 = 0.9;
pub const MAX_PEAK_FEATURES: usize = 6;
pub const MAX_LAKE_FEATURES: usize = 4;
pub const DEFAULT_FEATURE_FOOTPRINT: u32 = 2;

/// Buildable-area hints
pub const MAX_BUILDABLE_SLOPE: f32 = 0.25;

/// Pathfinding costs (scaled for A* integer math)
pub const ASTAR_CARDINAL_COST: u32 = 10;
pub const ASTAR_DIAGONAL_COST: u32 = 14;

/// Placement search
pub const DEFAULT_MAX_ATTEMPTS: u32 = 200;
pub const CLUSTER_SAMPLE_RADIUS: u32 = 3;
pub const CLUSTER_RELAXED_SPACING: u32 = 1;
pub const MIN_RARITY_WEIGHT: f32 = 0.05;
pub const PREFERRED_BIAS_STEP: u32 = 2;

/// Collision index bucketing
pub const DEFAULT_BUCKET_SIZE: u32 = 8;

/// Fallback seed when a generation request carries none
pub const DEFAULT_SEED: u64 = 12345;
