use crate::generator::Layout;
use crate::grid::{Coord, EntityId, GridTopology};
use crate::placement::PlacedEntity;
use std::collections::BTreeMap;
use tracing::debug;

/// Runtime view over placed entities: tracks discovered/depleted state and
/// answers radius queries under the grid's own distance metric.
///
/// The fog-of-war invariant lives here: queries never expose an
/// undiscovered POI or a depleted resource, regardless of proximity.
#[derive(Debug, Clone)]
pub struct DiscoveryIndex {
    topology: GridTopology,
    pois: BTreeMap<EntityId, PlacedEntity>,
    resources: BTreeMap<EntityId, PlacedEntity>,
}

impl DiscoveryIndex {
    pub fn new(topology: GridTopology) -> Self {
        Self {
            topology,
            pois: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    /// Index a finished layout for runtime queries.
    pub fn from_layout(topology: GridTopology, layout: &Layout) -> Self {
        let mut index = Self::new(topology);
        for entity in &layout.placed {
            index.insert(entity.clone());
        }
        index
    }

    pub fn insert(&mut self, entity: PlacedEntity) {
        if entity.category.is_resource() {
            self.resources.insert(entity.id, entity);
        } else {
            self.pois.insert(entity.id, entity);
        }
    }

    pub fn poi_count(&self) -> usize {
        self.pois.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Mark every POI within the radius as discovered. Returns how many
    /// flipped state.
    pub fn discover_pois(&mut self, center: Coord, radius: u32) -> usize {
        let topology = self.topology;
        let mut newly = 0;
        for poi in self.pois.values_mut() {
            if !poi.discovered && topology.distance(poi.coordinate, center) <= radius {
                poi.discovered = true;
                newly += 1;
            }
        }
        debug!(newly, "discovered pois");
        newly
    }

    /// Mark every resource within the radius as discovered and available.
    pub fn discover_resources(&mut self, center: Coord, radius: u32) -> usize {
        let topology = self.topology;
        let mut newly = 0;
        for resource in self.resources.values_mut() {
            if topology.distance(resource.coordinate, center) <= radius {
                if !resource.discovered {
                    newly += 1;
                }
                resource.discovered = true;
                resource.depleted = false;
            }
        }
        debug!(newly, "discovered resources");
        newly
    }

    /// Exhaust a resource node; it drops out of queries until replenished.
    pub fn deplete_resource(&mut self, id: EntityId) -> bool {
        match self.resources.get_mut(&id) {
            Some(resource) => {
                resource.depleted = true;
                true
            }
            None => false,
        }
    }

    pub fn replenish_resource(&mut self, id: EntityId) -> bool {
        match self.resources.get_mut(&id) {
            Some(resource) => {
                resource.depleted = false;
                true
            }
            None => false,
        }
    }

    /// Discovered POIs within the radius. Undiscovered POIs stay hidden.
    pub fn query_nearby_pois(&self, center: Coord, radius: u32) -> Vec<&PlacedEntity> {
        self.pois
            .values()
            .filter(|poi| {
                poi.discovered && self.topology.distance(poi.coordinate, center) <= radius
            })
            .collect()
    }

    /// Discovered, non-depleted resources within the radius.
    pub fn query_nearby_resources(&self, center: Coord, radius: u32) -> Vec<&PlacedEntity> {
        self.resources
            .values()
            .filter(|resource| {
                resource.discovered
                    && !resource.depleted
                    && self.topology.distance(resource.coordinate, center) <= radius
            })
            .collect()
    }
}
