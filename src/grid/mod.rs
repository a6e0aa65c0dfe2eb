use crate::errors::{WorldGenError, WorldGenResult};
use crate::terrain::TerrainType;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Identifier for a placed POI or resource node
pub type EntityId = u64;

/// Grid coordinates. Square grids use (x, y); hex grids store axial (q, r)
/// in the same fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Cell neighborhoods: 8-directional for square grids (diagonals included),
/// the 6 axial directions for hex grids.
const SQUARE_OFFSETS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
];
const HEX_OFFSETS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridTopology {
    Square,
    Hex,
}

impl Default for GridTopology {
    fn default() -> Self {
        GridTopology::Square
    }
}

impl GridTopology {
    /// Distance in whole cells: Chebyshev for square grids, axial distance
    /// for hex grids. Adjacent cells are always at distance 1.
    pub fn distance(&self, a: Coord, b: Coord) -> u32 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        match self {
            GridTopology::Square => dx.abs().max(dy.abs()) as u32,
            GridTopology::Hex => ((dx.abs() + dy.abs() + (dx + dy).abs()) / 2) as u32,
        }
    }

    pub fn neighbor_offsets(&self) -> &'static [(i32, i32)] {
        match self {
            GridTopology::Square => &SQUARE_OFFSETS,
            GridTopology::Hex => &HEX_OFFSETS,
        }
    }
}

/// A single world cell. Occupancy is mutated only by the placement engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub terrain: TerrainType,
    pub elevation: f32,
    pub walkable: bool,
    pub occupied: bool,
    pub occupant: Option<EntityId>,
}

impl Cell {
    pub fn new(terrain: TerrainType, elevation: f32) -> Self {
        Self {
            terrain,
            elevation,
            walkable: terrain.is_walkable(),
            occupied: false,
            occupant: None,
        }
    }
}

/// World grid: row-major cell storage with exactly one cell per in-range
/// coordinate. Hex grids store an axial parallelogram of q in 0..width,
/// r in 0..height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub width: u32,
    pub height: u32,
    pub topology: GridTopology,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create a grid filled with the given cell. Zero-size grids are a
    /// structural error.
    pub fn filled(
        width: u32,
        height: u32,
        topology: GridTopology,
        cell: Cell,
    ) -> WorldGenResult<Self> {
        if width == 0 || height == 0 {
            return Err(WorldGenError::InvalidGrid {
                width,
                height,
                reason: "dimensions must be nonzero".to_string(),
            });
        }
        Ok(Self {
            width,
            height,
            topology,
            cells: vec![cell; (width * height) as usize],
        })
    }

    /// Create a grid from row-major cells.
    pub fn from_cells(
        width: u32,
        height: u32,
        topology: GridTopology,
        cells: Vec<Cell>,
    ) -> WorldGenResult<Self> {
        if width == 0 || height == 0 {
            return Err(WorldGenError::InvalidGrid {
                width,
                height,
                reason: "dimensions must be nonzero".to_string(),
            });
        }
        let expected = (width * height) as usize;
        if cells.len() != expected {
            return Err(WorldGenError::InvalidGrid {
                width,
                height,
                reason: format!("expected {expected} cells, got {}", cells.len()),
            });
        }
        Ok(Self {
            width,
            height,
            topology,
            cells,
        })
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as u32) < self.width
            && (coord.y as u32) < self.height
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some((coord.y as u32 * self.width + coord.x as u32) as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, coord: Coord) -> Option<&Cell> {
        self.index(coord).map(|i| &self.cells[i])
    }

    pub fn cell_mut(&mut self, coord: Coord) -> Option<&mut Cell> {
        self.index(coord).map(move |i| &mut self.cells[i])
    }

    pub fn distance(&self, a: Coord, b: Coord) -> u32 {
        self.topology.distance(a, b)
    }

    /// In-bounds neighbors of a coordinate under this grid's topology.
    pub fn neighbors(&self, coord: Coord) -> Vec<Coord> {
        self.topology
            .neighbor_offsets()
            .iter()
            .map(|&(dx, dy)| Coord::new(coord.x + dx, coord.y + dy))
            .filter(|&c| self.in_bounds(c))
            .collect()
    }

    /// Iterate every in-range coordinate in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Coord::new(x, y)))
    }

    pub fn random_coord<R: Rng>(&self, rng: &mut R) -> Coord {
        Coord::new(
            rng.gen_range(0..self.width as i32),
            rng.gen_range(0..self.height as i32),
        )
    }

    /// Mark a cell occupied by an entity. Returns false if the coordinate is
    /// out of bounds or the cell already holds an occupant.
    pub fn occupy(&mut self, coord: Coord, id: EntityId) -> bool {
        match self.cell_mut(coord) {
            Some(cell) if !cell.occupied => {
                cell.occupied = true;
                cell.occupant = Some(id);
                true
            }
            _ => false,
        }
    }

    pub fn release(&mut self, coord: Coord) {
        if let Some(cell) = self.cell_mut(coord) {
            cell.occupied = false;
            cell.occupant = None;
        }
    }

    pub fn walkable_count(&self) -> usize {
        self.cells.iter().filter(|c| c.walkable).count()
    }

    /// Deterministic content signature over dimensions, topology, terrain
    /// and elevation. Occupancy is excluded so the signature is stable
    /// across a generation pass.
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.topology.hash(&mut hasher);
        for cell in &self.cells {
            cell.terrain.hash(&mut hasher);
            cell.elevation.to_bits().hash(&mut hasher);
            cell.walkable.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plains_grid(width: u32, height: u32, topology: GridTopology) -> Grid {
        Grid::filled(width, height, topology, Cell::new(TerrainType::Plains, 0.5)).unwrap()
    }

    #[test]
    fn test_zero_size_grid_rejected() {
        let result = Grid::filled(0, 5, GridTopology::Square, Cell::new(TerrainType::Plains, 0.0));
        assert!(result.is_err());
        let result = Grid::filled(5, 0, GridTopology::Hex, Cell::new(TerrainType::Plains, 0.0));
        assert!(result.is_err());
    }

    #[test]
    fn test_cell_count_mismatch_rejected() {
        let cells = vec![Cell::new(TerrainType::Plains, 0.0); 8];
        let result = Grid::from_cells(3, 3, GridTopology::Square, cells);
        assert!(result.is_err());
    }

    #[test]
    fn test_every_coordinate_has_one_cell() {
        let grid = plains_grid(4, 3, GridTopology::Square);
        let coords: Vec<Coord> = grid.coords().collect();
        assert_eq!(coords.len(), 12);
        for coord in coords {
            assert!(grid.cell(coord).is_some());
        }
        assert!(grid.cell(Coord::new(4, 0)).is_none());
        assert!(grid.cell(Coord::new(0, 3)).is_none());
        assert!(grid.cell(Coord::new(-1, 0)).is_none());
    }

    #[test]
    fn test_square_distance_is_chebyshev() {
        let topology = GridTopology::Square;
        assert_eq!(topology.distance(Coord::new(0, 0), Coord::new(3, 4)), 4);
        assert_eq!(topology.distance(Coord::new(2, 2), Coord::new(3, 3)), 1);
        assert_eq!(topology.distance(Coord::new(5, 5), Coord::new(5, 5)), 0);
    }

    #[test]
    fn test_hex_distance_is_axial() {
        let topology = GridTopology::Hex;
        // Straight line along an axis
        assert_eq!(topology.distance(Coord::new(0, 0), Coord::new(3, 0)), 3);
        // (1, -1) is a single axial step
        assert_eq!(topology.distance(Coord::new(0, 0), Coord::new(1, -1)), 1);
        // (1, 1) requires two steps on a hex grid
        assert_eq!(topology.distance(Coord::new(0, 0), Coord::new(1, 1)), 2);
    }

    #[test]
    fn test_neighbors_are_at_distance_one() {
        for topology in [GridTopology::Square, GridTopology::Hex] {
            let grid = plains_grid(8, 8, topology);
            let center = Coord::new(4, 4);
            let neighbors = grid.neighbors(center);
            let expected = match topology {
                GridTopology::Square => 8,
                GridTopology::Hex => 6,
            };
            assert_eq!(neighbors.len(), expected);
            for n in neighbors {
                assert_eq!(grid.distance(center, n), 1);
            }
        }
    }

    #[test]
    fn test_corner_neighbors_clipped() {
        let grid = plains_grid(4, 4, GridTopology::Square);
        assert_eq!(grid.neighbors(Coord::new(0, 0)).len(), 3);
    }

    #[test]
    fn test_occupy_and_release() {
        let mut grid = plains_grid(4, 4, GridTopology::Square);
        let coord = Coord::new(1, 2);
        assert!(grid.occupy(coord, 7));
        assert!(grid.cell(coord).unwrap().occupied);
        assert_eq!(grid.cell(coord).unwrap().occupant, Some(7));

        // Double occupancy is refused
        assert!(!grid.occupy(coord, 8));
        assert_eq!(grid.cell(coord).unwrap().occupant, Some(7));

        grid.release(coord);
        assert!(!grid.cell(coord).unwrap().occupied);
        assert!(grid.occupy(coord, 8));
    }

    #[test]
    fn test_signature_ignores_occupancy() {
        let mut grid = plains_grid(5, 5, GridTopology::Square);
        let before = grid.signature();
        grid.occupy(Coord::new(2, 2), 1);
        assert_eq!(grid.signature(), before);
    }

    #[test]
    fn test_signature_tracks_terrain() {
        let mut grid = plains_grid(5, 5, GridTopology::Square);
        let before = grid.signature();
        grid.cell_mut(Coord::new(2, 2)).unwrap().terrain = TerrainType::Mountain;
        assert_ne!(grid.signature(), before);
    }
}
