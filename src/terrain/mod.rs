use crate::grid::{Coord, Grid, GridTopology};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod constants;
pub mod generator;

pub use generator::{TerrainAlgorithm, TerrainGenerator};

use constants::MAX_BUILDABLE_SLOPE;

/// Terrain classification for a world cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TerrainType {
    Water,
    Plains,
    Forest,
    Hills,
    Mountain,
    Desert,
    Swamp,
}

impl TerrainType {
    /// Water is the only terrain that blocks walking outright; steep cells
    /// are handled by buildable hints instead.
    pub fn is_walkable(&self) -> bool {
        !matches!(self, TerrainType::Water)
    }

    /// Terrains that paths must route around even when technically adjacent
    pub fn blocks_paths(&self) -> bool {
        matches!(self, TerrainType::Water)
    }
}

/// Named terrain features with a footprint and an elevation delta relative
/// to the surrounding cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    Lake,
    Peak,
    Grove,
    Marsh,
}

impl FeatureType {
    /// The terrain a feature stamps on the cells it covers. Used by the
    /// placement search to honor avoided-terrain feature radii.
    pub fn terrain(&self) -> TerrainType {
        match self {
            FeatureType::Lake => TerrainType::Water,
            FeatureType::Peak => TerrainType::Mountain,
            FeatureType::Grove => TerrainType::Forest,
            FeatureType::Marsh => TerrainType::Swamp,
        }
    }
}

/// Immutable once terrain generation completes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainFeature {
    pub feature_type: FeatureType,
    pub position: Coord,
    pub footprint_size: u32,
    pub elevation_delta: f32,
}

/// What a coordinate looks like: terrain, elevation, and whether the cell
/// is a sensible build site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainProfile {
    pub terrain: TerrainType,
    pub elevation: f32,
    pub buildable: bool,
}

/// Summary statistics over a generated terrain, used to derive generation
/// parameters and reported by the benchmark tool.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainAnalysis {
    pub cell_counts: BTreeMap<TerrainType, usize>,
    pub min_elevation: f32,
    pub max_elevation: f32,
    pub buildable_fraction: f32,
}

/// Height map companion to the grid: named features plus buildable-area
/// hints derived from slope and terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainModel {
    width: u32,
    height: u32,
    topology: GridTopology,
    features: Vec<TerrainFeature>,
    buildable: Vec<bool>,
}

impl TerrainModel {
    /// Derive a model from a finished grid. Buildable hints require a
    /// walkable cell whose steepest neighbor slope stays under the limit.
    pub fn from_grid(grid: &Grid, features: Vec<TerrainFeature>) -> Self {
        let mut buildable = Vec::with_capacity((grid.width * grid.height) as usize);
        for coord in grid.coords() {
            buildable.push(Self::cell_buildable(grid, coord));
        }
        Self {
            width: grid.width,
            height: grid.height,
            topology: grid.topology,
            features,
            buildable,
        }
    }

    fn cell_buildable(grid: &Grid, coord: Coord) -> bool {
        let Some(cell) = grid.cell(coord) else {
            return false;
        };
        if !cell.walkable {
            return false;
        }
        for neighbor in grid.neighbors(coord) {
            if let Some(other) = grid.cell(neighbor) {
                if (other.elevation - cell.elevation).abs() > MAX_BUILDABLE_SLOPE {
                    return false;
                }
            }
        }
        true
    }

    pub fn features(&self) -> &[TerrainFeature] {
        &self.features
    }

    /// Features whose footprint comes within `radius` of the coordinate.
    /// A footprint of 1 covers only the feature's own cell.
    pub fn features_near(&self, coord: Coord, radius: u32) -> Vec<&TerrainFeature> {
        self.features
            .iter()
            .filter(|f| {
                self.topology.distance(f.position, coord)
                    <= radius + f.footprint_size.saturating_sub(1)
            })
            .collect()
    }

    pub fn is_buildable(&self, coord: Coord) -> bool {
        if coord.x < 0
            || coord.y < 0
            || coord.x as u32 >= self.width
            || coord.y as u32 >= self.height
        {
            return false;
        }
        self.buildable[(coord.y as u32 * self.width + coord.x as u32) as usize]
    }

    /// Answer "what does this coordinate look like"
    pub fn profile(&self, grid: &Grid, coord: Coord) -> Option<TerrainProfile> {
        grid.cell(coord).map(|cell| TerrainProfile {
            terrain: cell.terrain,
            elevation: cell.elevation,
            buildable: self.is_buildable(coord),
        })
    }

    pub fn analyze(&self, grid: &Grid) -> TerrainAnalysis {
        let mut cell_counts: BTreeMap<TerrainType, usize> = BTreeMap::new();
        let mut min_elevation = f32::INFINITY;
        let mut max_elevation = f32::NEG_INFINITY;
        let mut buildable_count = 0usize;

        for coord in grid.coords() {
            let cell = grid.cell(coord).expect("coordinate in range");
            *cell_counts.entry(cell.terrain).or_insert(0) += 1;
            min_elevation = min_elevation.min(cell.elevation);
            max_elevation = max_elevation.max(cell.elevation);
            if self.is_buildable(coord) {
                buildable_count += 1;
            }
        }

        let total = (grid.width * grid.height) as f32;
        TerrainAnalysis {
            cell_counts,
            min_elevation,
            max_elevation,
            buildable_fraction: buildable_count as f32 / total,
        }
    }
}
