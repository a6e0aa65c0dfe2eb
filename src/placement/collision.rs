use crate::grid::{Coord, EntityId, GridTopology};
use crate::rules::Category;
use crate::terrain::constants::DEFAULT_BUCKET_SIZE;
use std::collections::HashMap;

/// A registered entity as seen by spacing queries
#[derive(Debug, Clone, PartialEq)]
pub struct Occupant {
    pub id: EntityId,
    pub coord: Coord,
    pub category: Category,
    pub min_spacing: u32,
    pub footprint: u32,
}

/// Cells covered by an entity: everything within footprint - 1 of its
/// center under the given topology.
pub fn footprint_cells(topology: GridTopology, center: Coord, footprint: u32) -> Vec<Coord> {
    let radius = footprint.saturating_sub(1) as i32;
    if radius == 0 {
        return vec![center];
    }
    let mut cells = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let coord = Coord::new(center.x + dx, center.y + dy);
            if topology.distance(center, coord) <= radius as u32 {
                cells.push(coord);
            }
        }
    }
    cells
}

/// Tracks occupied footprints and answers overlap/spacing queries.
///
/// An exact coordinate map gives O(1) overlap checks; a coarse bucket grid
/// bounds spacing queries to nearby buckets instead of scanning every
/// registered entity.
#[derive(Debug, Clone)]
pub struct CollisionIndex {
    topology: GridTopology,
    bucket_size: u32,
    by_cell: HashMap<Coord, EntityId>,
    occupants: HashMap<EntityId, Occupant>,
    buckets: HashMap<(i32, i32), Vec<EntityId>>,
}

impl CollisionIndex {
    pub fn new(topology: GridTopology) -> Self {
        Self {
            topology,
            bucket_size: DEFAULT_BUCKET_SIZE,
            by_cell: HashMap::new(),
            occupants: HashMap::new(),
            buckets: HashMap::new(),
        }
    }

    fn bucket_of(&self, coord: Coord) -> (i32, i32) {
        (
            coord.x.div_euclid(self.bucket_size as i32),
            coord.y.div_euclid(self.bucket_size as i32),
        )
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn is_occupied(&self, coord: Coord) -> bool {
        self.by_cell.contains_key(&coord)
    }

    /// Occupants whose center lies within `radius` of the coordinate.
    /// Inspects only the buckets the radius can reach.
    pub fn neighbors_within(&self, coord: Coord, radius: u32) -> Vec<&Occupant> {
        let span = radius.div_ceil(self.bucket_size) as i32 + 1;
        let (bx, by) = self.bucket_of(coord);
        let mut found = Vec::new();
        for dy in -span..=span {
            for dx in -span..=span {
                let Some(ids) = self.buckets.get(&(bx + dx, by + dy)) else {
                    continue;
                };
                for id in ids {
                    let occupant = &self.occupants[id];
                    if self.topology.distance(occupant.coord, coord) <= radius {
                        found.push(occupant);
                    }
                }
            }
        }
        found
    }

    /// True when the footprint overlaps nothing and every nearby occupant
    /// keeps the pairwise spacing. Between two rules the stricter (smaller)
    /// minimum is the one enforced.
    pub fn fits(&self, coord: Coord, footprint: u32, min_spacing: u32) -> bool {
        for cell in footprint_cells(self.topology, coord, footprint) {
            if self.by_cell.contains_key(&cell) {
                return false;
            }
        }
        // Any pair violating min(a, b) lies within our own minimum
        for occupant in self.neighbors_within(coord, min_spacing) {
            let enforced = min_spacing.min(occupant.min_spacing);
            if self.topology.distance(occupant.coord, coord) < enforced {
                return false;
            }
        }
        true
    }

    pub fn register(&mut self, occupant: Occupant) {
        for cell in footprint_cells(self.topology, occupant.coord, occupant.footprint) {
            self.by_cell.insert(cell, occupant.id);
        }
        self.buckets
            .entry(self.bucket_of(occupant.coord))
            .or_default()
            .push(occupant.id);
        self.occupants.insert(occupant.id, occupant);
    }

    pub fn unregister(&mut self, id: EntityId) -> Option<Occupant> {
        let occupant = self.occupants.remove(&id)?;
        for cell in footprint_cells(self.topology, occupant.coord, occupant.footprint) {
            if self.by_cell.get(&cell) == Some(&id) {
                self.by_cell.remove(&cell);
            }
        }
        let bucket = self.bucket_of(occupant.coord);
        if let Some(ids) = self.buckets.get_mut(&bucket) {
            ids.retain(|&other| other != id);
            if ids.is_empty() {
                self.buckets.remove(&bucket);
            }
        }
        Some(occupant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupant(id: EntityId, x: i32, y: i32, min_spacing: u32) -> Occupant {
        Occupant {
            id,
            coord: Coord::new(x, y),
            category: Category::Social,
            min_spacing,
            footprint: 1,
        }
    }

    #[test]
    fn test_occupied_cell_never_reported_free() {
        let mut index = CollisionIndex::new(GridTopology::Square);
        index.register(occupant(1, 5, 5, 0));
        assert!(index.is_occupied(Coord::new(5, 5)));
        assert!(!index.fits(Coord::new(5, 5), 1, 0));
    }

    #[test]
    fn test_spacing_uses_stricter_minimum() {
        let mut index = CollisionIndex::new(GridTopology::Square);
        // Existing entity wants 5 cells of clearance
        index.register(occupant(1, 10, 10, 5));

        // Candidate with minimum 2: enforced pair minimum is min(2, 5) = 2
        assert!(!index.fits(Coord::new(11, 10), 1, 2));
        assert!(index.fits(Coord::new(12, 10), 1, 2));

        // Candidate with minimum 8: enforced pair minimum is min(8, 5) = 5
        assert!(!index.fits(Coord::new(14, 10), 1, 8));
        assert!(index.fits(Coord::new(15, 10), 1, 8));
    }

    #[test]
    fn test_footprint_overlap() {
        let mut index = CollisionIndex::new(GridTopology::Square);
        index.register(Occupant {
            id: 1,
            coord: Coord::new(4, 4),
            category: Category::Dungeon,
            min_spacing: 0,
            footprint: 2,
        });
        // The footprint covers neighbors of (4,4)
        assert!(index.is_occupied(Coord::new(5, 4)));
        assert!(!index.fits(Coord::new(5, 5), 1, 0));
        assert!(index.fits(Coord::new(7, 7), 1, 0));
    }

    #[test]
    fn test_footprint_cells_hex() {
        let cells = footprint_cells(GridTopology::Hex, Coord::new(0, 0), 2);
        // Center plus the six axial neighbors
        assert_eq!(cells.len(), 7);
    }

    #[test]
    fn test_unregister_frees_cells() {
        let mut index = CollisionIndex::new(GridTopology::Square);
        index.register(occupant(1, 3, 3, 4));
        assert!(!index.fits(Coord::new(4, 4), 1, 4));

        index.unregister(1);
        assert!(index.is_empty());
        assert!(index.fits(Coord::new(4, 4), 1, 4));
        assert!(index.fits(Coord::new(3, 3), 1, 4));
    }

    #[test]
    fn test_neighbor_query_spans_buckets() {
        let mut index = CollisionIndex::new(GridTopology::Square);
        index.register(occupant(1, 0, 0, 2));
        index.register(occupant(2, 20, 0, 2));
        index.register(occupant(3, 9, 0, 2));

        // Radius 10 from (8,0) reaches ids 1 and 3 but not 2
        let nearby = index.neighbors_within(Coord::new(8, 0), 10);
        let mut ids: Vec<EntityId> = nearby.iter().map(|o| o.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_hex_spacing_distance() {
        let mut index = CollisionIndex::new(GridTopology::Hex);
        index.register(Occupant {
            id: 1,
            coord: Coord::new(0, 0),
            category: Category::Resource,
            min_spacing: 2,
            footprint: 1,
        });
        // (1, 1) is hex distance 2: acceptable at pair minimum 2
        assert!(index.fits(Coord::new(1, 1), 1, 2));
        // (1, 0) is hex distance 1: too close
        assert!(!index.fits(Coord::new(1, 0), 1, 2));
    }
}
