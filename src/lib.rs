pub mod config;
pub mod discovery;
pub mod errors;
pub mod generator;
pub mod grid;
pub mod paths;
pub mod placement;
pub mod rules;
pub mod terrain;

// Selective re-exports for external consumers

// Errors - every caller needs the result alias
pub use errors::{WorldGenError, WorldGenResult};

// Generation - the orchestration surface consumed by world-gen callers
pub use generator::{
    CachedLayoutGenerator, GenerationFailure, GenerationRequest, Layout, LayoutGenerator,
};

// Core building blocks for callers that drive placement directly
pub use config::WorldGenConfig;
pub use discovery::DiscoveryIndex;
pub use grid::{Cell, Coord, EntityId, Grid, GridTopology};
pub use paths::{PathGenerator, PathSegment};
pub use placement::{CollisionIndex, PlacedEntity, PlacementCache, PlacementEngine};
pub use rules::{
    BuildingDistribution, Category, GenerationParameterCalculator, GenerationParams,
    PlacementRule, Template,
};
pub use terrain::{TerrainAlgorithm, TerrainGenerator, TerrainModel, TerrainType};
