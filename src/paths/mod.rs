use crate::errors::{WorldGenError, WorldGenResult};
use crate::grid::{Coord, Grid, GridTopology};
use crate::terrain::constants::{ASTAR_CARDINAL_COST, ASTAR_DIAGONAL_COST};
use crate::terrain::{TerrainModel, TerrainType};
use pathfinding::prelude::astar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// An ordered walk across the grid. Consecutive points are grid-adjacent
/// and every cell on the walk is walkable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub points: Vec<Coord>,
}

impl PathSegment {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Grid-native shortest-walk search between placed coordinates. Paths need
/// only be walkable and obstacle-avoiding, not globally optimal.
#[derive(Debug, Clone, PartialEq)]
pub struct PathGenerator {
    /// Terrain that paths route around even when a cell is within reach of
    /// a feature footprint (water for land routes)
    obstacle_terrain: BTreeSet<TerrainType>,
}

impl Default for PathGenerator {
    fn default() -> Self {
        Self {
            obstacle_terrain: BTreeSet::from([TerrainType::Water]),
        }
    }
}

impl PathGenerator {
    pub fn new(obstacle_terrain: BTreeSet<TerrainType>) -> Self {
        Self { obstacle_terrain }
    }

    /// Produce a walkable cell sequence from one coordinate to another.
    /// Reported as `Unreachable` when no route exists; never retried here.
    pub fn connect(
        &self,
        from: Coord,
        to: Coord,
        grid: &Grid,
        terrain: &TerrainModel,
    ) -> WorldGenResult<PathSegment> {
        let unreachable = || WorldGenError::Unreachable { from, to };

        if !self.is_traversable(from, grid, terrain) || !self.is_traversable(to, grid, terrain) {
            return Err(unreachable());
        }

        let result = astar(
            &from,
            |&coord| {
                grid.neighbors(coord)
                    .into_iter()
                    .filter(|&n| self.is_traversable(n, grid, terrain))
                    .map(|n| (n, step_cost(grid.topology, coord, n)))
                    .collect::<Vec<_>>()
            },
            |&coord| grid.distance(coord, to) * ASTAR_CARDINAL_COST,
            |&coord| coord == to,
        );

        match result {
            Some((points, cost)) => {
                debug!(
                    from_x = from.x,
                    from_y = from.y,
                    to_x = to.x,
                    to_y = to.y,
                    steps = points.len(),
                    cost,
                    "connected path"
                );
                Ok(PathSegment { points })
            }
            None => Err(unreachable()),
        }
    }

    fn is_traversable(&self, coord: Coord, grid: &Grid, terrain: &TerrainModel) -> bool {
        let Some(cell) = grid.cell(coord) else {
            return false;
        };
        if !cell.walkable || self.obstacle_terrain.contains(&cell.terrain) {
            return false;
        }
        terrain
            .features_near(coord, 0)
            .iter()
            .all(|f| !self.obstacle_terrain.contains(&f.feature_type.terrain()))
    }
}

fn step_cost(topology: GridTopology, from: Coord, to: Coord) -> u32 {
    match topology {
        GridTopology::Square => {
            let diagonal = from.x != to.x && from.y != to.y;
            if diagonal {
                ASTAR_DIAGONAL_COST
            } else {
                ASTAR_CARDINAL_COST
            }
        }
        // All six hex steps cost the same
        GridTopology::Hex => ASTAR_CARDINAL_COST,
    }
}
