use crate::errors::WorldGenResult;
use crate::grid::{Cell, Coord, Grid, GridTopology};
use crate::terrain::constants::*;
use crate::terrain::{FeatureType, TerrainFeature, TerrainModel, TerrainType};
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Terrain generation algorithms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerrainAlgorithm {
    /// Uniform terrain at a fixed elevation, mostly for tests and benches
    Flat {
        terrain: TerrainType,
        elevation: f32,
    },
    /// Octaved Perlin noise classified through elevation thresholds
    Fractal {
        amplitude: f32,
        frequency: f32,
        octaves: u32,
    },
}

impl Default for TerrainAlgorithm {
    fn default() -> Self {
        TerrainAlgorithm::Fractal {
            amplitude: 1.0,
            frequency: 0.08,
            octaves: 4,
        }
    }
}

/// Seeded terrain generator producing a grid and its companion model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainGenerator {
    pub seed: u32,
    pub algorithm: TerrainAlgorithm,
}

impl TerrainGenerator {
    pub fn new(seed: u32, algorithm: TerrainAlgorithm) -> Self {
        Self { seed, algorithm }
    }

    /// Generate the world grid and terrain model for the given dimensions.
    pub fn generate(
        &self,
        width: u32,
        height: u32,
        topology: GridTopology,
    ) -> WorldGenResult<(Grid, TerrainModel)> {
        let grid = match &self.algorithm {
            TerrainAlgorithm::Flat { terrain, elevation } => Grid::filled(
                width,
                height,
                topology,
                Cell::new(*terrain, *elevation),
            )?,
            TerrainAlgorithm::Fractal {
                amplitude,
                frequency,
                octaves,
            } => self.generate_fractal(width, height, topology, *amplitude, *frequency, *octaves)?,
        };

        let features = self.extract_features(&grid);
        info!(
            width,
            height,
            features = features.len(),
            walkable = grid.walkable_count(),
            "generated terrain"
        );
        let model = TerrainModel::from_grid(&grid, features);
        Ok((grid, model))
    }

    fn generate_fractal(
        &self,
        width: u32,
        height: u32,
        topology: GridTopology,
        amplitude: f32,
        frequency: f32,
        octaves: u32,
    ) -> WorldGenResult<Grid> {
        let perlin = Perlin::new(self.seed);
        let mut cells = Vec::with_capacity((width * height) as usize);

        for y in 0..height {
            for x in 0..width {
                let mut noise_value = 0.0;
                let mut current_amplitude = amplitude as f64;
                let mut current_frequency = frequency as f64;
                let mut max_value = 0.0;

                for _ in 0..octaves {
                    noise_value += perlin.get([
                        x as f64 * current_frequency,
                        y as f64 * current_frequency,
                    ]) * current_amplitude;
                    max_value += current_amplitude;
                    current_amplitude *= 0.5; // Persistence
                    current_frequency *= 2.0; // Lacunarity
                }

                // Normalize from [-max, max] to [0, 1]
                let elevation = ((noise_value / max_value + 1.0) / 2.0) as f32;
                let terrain = classify_terrain(elevation);
                cells.push(Cell::new(terrain, elevation));
            }
        }

        Grid::from_cells(width, height, topology, cells)
    }

    /// Derive named features from terrain extremes: the highest mountain
    /// cells become peaks, the deepest water cells become lakes. Scanning
    /// row-major keeps extraction deterministic for a given grid.
    fn extract_features(&self, grid: &Grid) -> Vec<TerrainFeature> {
        let mut peaks: Vec<(Coord, f32)> = Vec::new();
        let mut lakes: Vec<(Coord, f32)> = Vec::new();

        for coord in grid.coords() {
            let cell = grid.cell(coord).expect("coordinate in range");
            match cell.terrain {
                TerrainType::Mountain if cell.elevation >= PEAK_ELEVATION => {
                    peaks.push((coord, cell.elevation));
                }
                TerrainType::Water => lakes.push((coord, cell.elevation)),
                _ => {}
            }
        }

        peaks.sort_by(|a, b| b.1.total_cmp(&a.1));
        lakes.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut features = Vec::new();
        for (position, elevation) in peaks.into_iter().take(MAX_PEAK_FEATURES) {
            features.push(TerrainFeature {
                feature_type: FeatureType::Peak,
                position,
                footprint_size: DEFAULT_FEATURE_FOOTPRINT,
                elevation_delta: elevation - HILLS_THRESHOLD,
            });
        }
        for (position, elevation) in lakes.into_iter().take(MAX_LAKE_FEATURES) {
            features.push(TerrainFeature {
                feature_type: FeatureType::Lake,
                position,
                footprint_size: DEFAULT_FEATURE_FOOTPRINT,
                elevation_delta: elevation - WATER_THRESHOLD,
            });
        }
        features
    }
}

/// Map a normalized elevation to its terrain band
pub fn classify_terrain(elevation: f32) -> TerrainType {
    if elevation < WATER_THRESHOLD {
        TerrainType::Water
    } else if elevation < PLAINS_THRESHOLD {
        TerrainType::Plains
    } else if elevation < FOREST_THRESHOLD {
        TerrainType::Forest
    } else if elevation < HILLS_THRESHOLD {
        TerrainType::Hills
    } else {
        TerrainType::Mountain
    }
}
