use crate::errors::{WorldGenError, WorldGenResult};
use crate::grid::{Coord, EntityId, Grid};
use crate::rules::{Category, PlacementRequest, PlacementRule, Template};
use crate::terrain::constants::*;
use crate::terrain::TerrainModel;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod cache;
pub mod collision;

pub use cache::PlacementCache;
pub use collision::{CollisionIndex, Occupant};

/// A successfully placed POI or resource node. Ownership transfers to the
/// caller once returned; the engine keeps no collection of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedEntity {
    pub id: EntityId,
    pub template_id: String,
    pub category: Category,
    pub coordinate: Coord,
    pub footprint: u32,
    pub discovered: bool,
    pub depleted: bool,
    /// Yield for resource nodes, None for POIs
    pub amount: Option<u32>,
}

/// An open cluster: subsequent placements of the same category hug the
/// anchor with relaxed spacing until the cluster fills up.
#[derive(Debug, Clone)]
struct ClusterState {
    category: Category,
    anchor: Coord,
    remaining: u32,
}

/// Rule-driven rejection-sampling search for valid placement coordinates.
/// One engine instance serves one generation pass; it is not synchronized
/// for concurrent use against a shared grid.
#[derive(Debug)]
pub struct PlacementEngine {
    max_attempts: u32,
    next_id: EntityId,
    cluster: Option<ClusterState>,
}

impl Default for PlacementEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl PlacementEngine {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            next_id: 1,
            cluster: None,
        }
    }

    /// Find a valid coordinate for one entity of the given template.
    ///
    /// On success the footprint is marked occupied on the grid and the
    /// entity registered with the collision index. On exhaustion of the
    /// attempt budget the caller may skip, relax, or abort this entity.
    pub fn place<R: Rng>(
        &mut self,
        request: &PlacementRequest,
        template: &Template,
        grid: &mut Grid,
        terrain: &TerrainModel,
        collisions: &mut CollisionIndex,
        rng: &mut R,
    ) -> WorldGenResult<PlacedEntity> {
        let rule = &request.rule;
        rule.validate_for(request.category)?;

        let in_cluster = self
            .cluster
            .as_ref()
            .is_some_and(|c| c.category == request.category && c.remaining > 0);
        // Members of an open cluster intentionally relax spacing so the
        // group stays tight; the registered minimum stays unrelaxed so the
        // next cluster keeps its distance.
        let candidate_spacing = if in_cluster {
            CLUSTER_RELAXED_SPACING
        } else {
            rule.min_spacing
        };

        for attempt in 0..self.max_attempts {
            let coord = self.sample_candidate(request, grid, rng, attempt, in_cluster);
            if !self.is_valid(
                coord,
                rule,
                template.footprint,
                candidate_spacing,
                request.category,
                grid,
                terrain,
                collisions,
            ) {
                continue;
            }

            let id = self.next_id;
            self.next_id += 1;

            for cell in collision::footprint_cells(grid.topology, coord, template.footprint) {
                grid.occupy(cell, id);
            }
            collisions.register(Occupant {
                id,
                coord,
                category: request.category,
                min_spacing: rule.min_spacing,
                footprint: template.footprint,
            });
            self.advance_cluster(request.category, rule, coord, rng);

            let amount = template
                .amount
                .map(|(min, max)| rng.gen_range(min..=max));
            debug!(
                template = %template.id,
                category = %request.category,
                x = coord.x,
                y = coord.y,
                attempt,
                "placed entity"
            );
            return Ok(PlacedEntity {
                id,
                template_id: template.id.clone(),
                category: request.category,
                coordinate: coord,
                footprint: template.footprint,
                discovered: false,
                depleted: false,
                amount,
            });
        }

        Err(WorldGenError::NoValidPosition {
            category: request.category,
            attempts: self.max_attempts,
        })
    }

    /// Place up to `count` entities, drawing template variants
    /// rarity-weighted from the pool. Per-entity failures are collected so
    /// the pass degrades to a partial result instead of aborting.
    pub fn place_batch<R: Rng>(
        &mut self,
        category: Category,
        rule: &PlacementRule,
        templates: &[Template],
        count: u32,
        grid: &mut Grid,
        terrain: &TerrainModel,
        collisions: &mut CollisionIndex,
        rng: &mut R,
    ) -> (Vec<PlacedEntity>, Vec<WorldGenError>) {
        let mut placed = Vec::new();
        let mut failures = Vec::new();
        let pool: Vec<&Template> = templates.iter().filter(|t| t.category == category).collect();
        if pool.is_empty() {
            return (placed, failures);
        }

        let mut consecutive_failures = 0u32;
        for _ in 0..count {
            let template = select_template(&pool, rng);
            let request = PlacementRequest::new(
                category,
                template.effective_rule(rule).clone(),
            );
            match self.place(&request, template, grid, terrain, collisions, rng) {
                Ok(entity) => {
                    consecutive_failures = 0;
                    placed.push(entity);
                }
                Err(err) if err.is_recoverable() => {
                    warn!(category = %category, "placement attempt exhausted: {err}");
                    failures.push(err);
                    consecutive_failures += 1;
                    // A saturated grid keeps failing; stop burning attempts
                    if consecutive_failures >= 2 {
                        break;
                    }
                }
                Err(err) => {
                    failures.push(err);
                    break;
                }
            }
        }
        (placed, failures)
    }

    fn sample_candidate<R: Rng>(
        &self,
        request: &PlacementRequest,
        grid: &Grid,
        rng: &mut R,
        attempt: u32,
        in_cluster: bool,
    ) -> Coord {
        if in_cluster {
            let anchor = self.cluster.as_ref().expect("cluster checked open").anchor;
            return jitter(anchor, CLUSTER_SAMPLE_RADIUS, rng);
        }
        if let Some(preferred) = request.preferred_position {
            // Search outward from the preferred position as attempts burn
            let radius = 1 + attempt / PREFERRED_BIAS_STEP;
            return jitter(preferred, radius, rng);
        }
        grid.random_coord(rng)
    }

    #[allow(clippy::too_many_arguments)]
    fn is_valid(
        &self,
        coord: Coord,
        rule: &PlacementRule,
        footprint: u32,
        spacing: u32,
        category: Category,
        grid: &Grid,
        terrain: &TerrainModel,
        collisions: &CollisionIndex,
    ) -> bool {
        let Some(cell) = grid.cell(coord) else {
            return false;
        };
        if !cell.walkable || cell.occupied {
            return false;
        }
        if !rule.preferred_terrain.is_empty() && !rule.preferred_terrain.contains(&cell.terrain) {
            return false;
        }
        if rule.avoided_terrain.contains(&cell.terrain) {
            return false;
        }
        // Avoided terrain extends over nearby feature footprints
        if !rule.avoided_terrain.is_empty() {
            for feature in terrain.features_near(coord, 1) {
                if rule.avoided_terrain.contains(&feature.feature_type.terrain()) {
                    return false;
                }
            }
        }
        if cell.elevation < rule.min_elevation || cell.elevation > rule.max_elevation {
            return false;
        }
        // POIs stick to buildable ground; resource nodes may sit anywhere
        // walkable (an ore vein on a slope is fine)
        if !category.is_resource() && !terrain.is_buildable(coord) {
            return false;
        }
        collisions.fits(coord, footprint, spacing)
    }

    fn advance_cluster<R: Rng>(
        &mut self,
        category: Category,
        rule: &PlacementRule,
        coord: Coord,
        rng: &mut R,
    ) {
        if !rule.clustering_enabled() {
            return;
        }
        match &mut self.cluster {
            Some(cluster) if cluster.category == category && cluster.remaining > 0 => {
                cluster.remaining -= 1;
                if cluster.remaining == 0 {
                    self.cluster = None;
                }
            }
            _ => {
                let size = rng.gen_range(rule.cluster_min_size.max(1)..=rule.cluster_max_size);
                if size > 1 {
                    self.cluster = Some(ClusterState {
                        category,
                        anchor: coord,
                        remaining: size - 1,
                    });
                } else {
                    self.cluster = None;
                }
            }
        }
    }
}

/// Rarity-weighted variant selection: lower rarity means a heavier weight,
/// so common variants dominate while rare ones still appear.
pub fn select_template<'a, R: Rng>(pool: &[&'a Template], rng: &mut R) -> &'a Template {
    let weights: Vec<f32> = pool
        .iter()
        .map(|t| (1.0 - t.rarity).max(MIN_RARITY_WEIGHT))
        .collect();
    let total: f32 = weights.iter().sum();
    let mut roll = rng.r#gen::<f32>() * total;
    for (template, weight) in pool.iter().zip(&weights) {
        if roll < *weight {
            return template;
        }
        roll -= weight;
    }
    pool.last().expect("pool checked non-empty")
}

fn jitter<R: Rng>(center: Coord, radius: u32, rng: &mut R) -> Coord {
    let r = radius as i32;
    Coord::new(
        center.x + rng.gen_range(-r..=r),
        center.y + rng.gen_range(-r..=r),
    )
}
