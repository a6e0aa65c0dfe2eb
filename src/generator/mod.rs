use crate::errors::{WorldGenError, WorldGenResult};
use crate::grid::{Grid, GridTopology};
use crate::paths::{PathGenerator, PathSegment};
use crate::placement::cache::PlacementCache;
use crate::placement::{select_template, CollisionIndex, PlacedEntity, PlacementEngine};
use crate::rules::{Category, PlacementRequest, PlacementRule, Template};
use crate::terrain::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_SEED};
use crate::terrain::{TerrainAlgorithm, TerrainGenerator, TerrainModel};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// One world-generation request as consumed from orchestration. Identical
/// requests (same grid, rules, seed) reproduce identical layouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub width: u32,
    pub height: u32,
    pub topology: GridTopology,
    pub terrain: TerrainAlgorithm,
    pub category_rules: BTreeMap<Category, PlacementRule>,
    pub templates: Vec<Template>,
    pub seed: Option<u64>,
    /// Cap on placed POIs
    pub max_entities: u32,
    /// Cap on placed resource nodes
    pub resource_nodes: u32,
    pub connect_paths: bool,
}

impl GenerationRequest {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            topology: GridTopology::Square,
            terrain: TerrainAlgorithm::default(),
            category_rules: BTreeMap::new(),
            templates: Vec::new(),
            seed: None,
            max_entities: 10,
            resource_nodes: 0,
            connect_paths: true,
        }
    }

    pub fn seed_value(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    /// Structural validation, run before any search begins.
    pub fn validate(&self) -> WorldGenResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(WorldGenError::InvalidGrid {
                width: self.width,
                height: self.height,
                reason: "dimensions must be nonzero".to_string(),
            });
        }
        for (category, rule) in &self.category_rules {
            rule.validate_for(*category)?;
        }
        for template in &self.templates {
            template.validate()?;
        }
        Ok(())
    }
}

/// A recoverable failure collected during a run; the layout it belongs to
/// is still usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub category: Option<Category>,
    pub reason: String,
}

impl From<&WorldGenError> for GenerationFailure {
    fn from(err: &WorldGenError) -> Self {
        let category = match err {
            WorldGenError::NoValidPosition { category, .. } => Some(*category),
            _ => None,
        };
        Self {
            category,
            reason: err.to_string(),
        }
    }
}

/// Everything a generation run produced. Handed to the external store for
/// durability; the core keeps nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub placed: Vec<PlacedEntity>,
    pub paths: Vec<PathSegment>,
    pub failures: Vec<GenerationFailure>,
}

impl Layout {
    pub fn pois(&self) -> impl Iterator<Item = &PlacedEntity> {
        self.placed.iter().filter(|e| !e.category.is_resource())
    }

    pub fn resources(&self) -> impl Iterator<Item = &PlacedEntity> {
        self.placed.iter().filter(|e| e.category.is_resource())
    }
}

/// The naïve generator: every call runs the full placement search.
#[derive(Debug)]
pub struct LayoutGenerator {
    max_attempts: u32,
    path_generator: PathGenerator,
    invocations: AtomicU64,
}

impl Default for LayoutGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl LayoutGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            path_generator: PathGenerator::default(),
            invocations: AtomicU64::new(0),
        }
    }

    /// How many times the placement search actually ran. The cached wrapper
    /// holds this constant on hits.
    pub fn invocation_count(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Build the grid and terrain model a request describes.
    pub fn build_world(&self, request: &GenerationRequest) -> WorldGenResult<(Grid, TerrainModel)> {
        request.validate()?;
        let generator = TerrainGenerator::new(request.seed_value() as u32, request.terrain.clone());
        generator.generate(request.width, request.height, request.topology)
    }

    /// Run the placement search against an already-built world. Recoverable
    /// failures are collected; the layout is partial rather than aborted.
    pub fn populate(
        &self,
        request: &GenerationRequest,
        grid: &mut Grid,
        terrain: &TerrainModel,
    ) -> Layout {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let mut rng = Pcg64::seed_from_u64(request.seed_value());
        let mut engine = PlacementEngine::new(self.max_attempts);
        let mut collisions = CollisionIndex::new(grid.topology);
        let mut placed = Vec::new();
        let mut failures = Vec::new();
        let fallback_rule = PlacementRule::default();

        // POIs: draw variants rarity-weighted from the whole POI pool
        let poi_pool: Vec<&Template> = request
            .templates
            .iter()
            .filter(|t| !t.category.is_resource())
            .collect();
        if !poi_pool.is_empty() {
            let mut consecutive_failures = 0u32;
            for _ in 0..request.max_entities {
                let template = select_template(&poi_pool, &mut rng);
                let rule = template
                    .effective_rule(
                        request
                            .category_rules
                            .get(&template.category)
                            .unwrap_or(&fallback_rule),
                    )
                    .clone();
                let placement = PlacementRequest::new(template.category, rule);
                match engine.place(&placement, template, grid, terrain, &mut collisions, &mut rng)
                {
                    Ok(entity) => {
                        consecutive_failures = 0;
                        placed.push(entity);
                    }
                    Err(err) => {
                        warn!("poi placement failed: {err}");
                        failures.push(GenerationFailure::from(&err));
                        if !err.is_recoverable() {
                            break;
                        }
                        consecutive_failures += 1;
                        if consecutive_failures >= 2 {
                            break;
                        }
                    }
                }
            }
        }

        // Resource nodes share the placement contract
        let resource_rule = request
            .category_rules
            .get(&Category::Resource)
            .unwrap_or(&fallback_rule);
        let (resources, resource_failures) = engine.place_batch(
            Category::Resource,
            resource_rule,
            &request.templates,
            request.resource_nodes,
            grid,
            terrain,
            &mut collisions,
            &mut rng,
        );
        placed.extend(resources);
        failures.extend(resource_failures.iter().map(GenerationFailure::from));

        // Connect consecutive POIs with walkable paths
        let mut paths = Vec::new();
        if request.connect_paths {
            let poi_coords: Vec<_> = placed
                .iter()
                .filter(|e| !e.category.is_resource())
                .map(|e| e.coordinate)
                .collect();
            for pair in poi_coords.windows(2) {
                match self.path_generator.connect(pair[0], pair[1], grid, terrain) {
                    Ok(segment) => paths.push(segment),
                    Err(err) => {
                        warn!("path connection failed: {err}");
                        failures.push(GenerationFailure::from(&err));
                    }
                }
            }
        }

        info!(
            placed = placed.len(),
            paths = paths.len(),
            failures = failures.len(),
            "generation pass complete"
        );
        Layout {
            placed,
            paths,
            failures,
        }
    }

    pub fn generate(&self, request: &GenerationRequest) -> WorldGenResult<Layout> {
        let (mut grid, terrain) = self.build_world(request)?;
        Ok(self.populate(request, &mut grid, &terrain))
    }
}

/// Deterministic cache key over the grid signature and the full request
/// (rule configuration and parameters).
pub fn layout_cache_key(grid_signature: u64, request: &GenerationRequest) -> u64 {
    let bytes = bincode::serde::encode_to_vec(request, bincode::config::standard())
        .expect("request serialization is infallible");
    let mut hasher = DefaultHasher::new();
    grid_signature.hash(&mut hasher);
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// The optimized generator: identical results to [`LayoutGenerator`], but
/// repeated requests are served from the placement cache.
#[derive(Debug)]
pub struct CachedLayoutGenerator {
    inner: LayoutGenerator,
    cache: PlacementCache,
}

impl Default for CachedLayoutGenerator {
    fn default() -> Self {
        Self::new(LayoutGenerator::default())
    }
}

impl CachedLayoutGenerator {
    pub fn new(inner: LayoutGenerator) -> Self {
        Self {
            inner,
            cache: PlacementCache::new(),
        }
    }

    pub fn get_or_generate(&self, request: &GenerationRequest) -> WorldGenResult<Layout> {
        let (mut grid, terrain) = self.inner.build_world(request)?;
        let key = layout_cache_key(grid.signature(), request);
        if let Some(layout) = self.cache.get(key) {
            return Ok(layout);
        }
        // Simultaneous misses may both compute; the last insert wins and
        // both computed layouts are identical for identical inputs.
        let layout = self.inner.populate(request, &mut grid, &terrain);
        self.cache.insert(key, layout.clone());
        Ok(layout)
    }

    pub fn inner(&self) -> &LayoutGenerator {
        &self.inner
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_hit_ratio(&self) -> f64 {
        self.cache.hit_ratio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainType;
    use std::collections::BTreeSet;

    fn flat_request(width: u32, height: u32) -> GenerationRequest {
        let mut request = GenerationRequest::new(width, height);
        request.terrain = TerrainAlgorithm::Flat {
            terrain: TerrainType::Plains,
            elevation: 0.5,
        };
        request
    }

    fn village_ruin_request() -> GenerationRequest {
        let village_rule = PlacementRule {
            min_spacing: 2,
            preferred_terrain: BTreeSet::from([TerrainType::Plains, TerrainType::Forest]),
            ..Default::default()
        };
        let ruin_rule = PlacementRule {
            min_spacing: 1,
            preferred_terrain: BTreeSet::from([TerrainType::Plains, TerrainType::Mountain]),
            ..Default::default()
        };
        let mut request = flat_request(5, 5);
        request.templates = vec![
            Template::new("village", Category::Social, 0.2).with_rule(village_rule),
            Template::new("ruin", Category::Exploration, 0.8).with_rule(ruin_rule),
        ];
        request.seed = Some(1);
        request.max_entities = 5;
        request
    }

    #[test]
    fn test_end_to_end_scenario() {
        let generator = LayoutGenerator::default();
        let layout = generator.generate(&village_ruin_request()).unwrap();
        assert!(!layout.placed.is_empty());

        let allowed = [
            TerrainType::Plains,
            TerrainType::Forest,
            TerrainType::Mountain,
        ];
        let request = village_ruin_request();
        let (grid, _) = generator.build_world(&request).unwrap();
        for entity in &layout.placed {
            let terrain = grid.cell(entity.coordinate).unwrap().terrain;
            assert!(allowed.contains(&terrain));
        }

        // Pairwise distance honors the stricter of the two minimums
        let min_spacing_of = |e: &PlacedEntity| match e.template_id.as_str() {
            "village" => 2,
            _ => 1,
        };
        for a in &layout.placed {
            for b in &layout.placed {
                if a.id != b.id {
                    let enforced = min_spacing_of(a).min(min_spacing_of(b));
                    assert!(
                        grid.distance(a.coordinate, b.coordinate) >= enforced,
                        "{} and {} too close",
                        a.template_id,
                        b.template_id
                    );
                }
            }
        }
    }

    #[test]
    fn test_determinism_byte_identical() {
        let generator = LayoutGenerator::default();
        let request = village_ruin_request();
        let a = generator.generate(&request).unwrap();
        let b = generator.generate(&request).unwrap();
        assert_eq!(a, b);

        let bytes_a = bincode::serde::encode_to_vec(&a, bincode::config::standard()).unwrap();
        let bytes_b = bincode::serde::encode_to_vec(&b, bincode::config::standard()).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn test_different_seeds_change_layout() {
        let generator = LayoutGenerator::default();
        let mut request = village_ruin_request();
        request.width = 20;
        request.height = 20;
        let a = generator.generate(&request).unwrap();
        request.seed = Some(2);
        let b = generator.generate(&request).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rarity_distribution_over_run() {
        let generator = LayoutGenerator::default();
        let mut request = village_ruin_request();
        request.width = 40;
        request.height = 40;
        request.max_entities = 20;
        let layout = generator.generate(&request).unwrap();

        let villages = layout
            .placed
            .iter()
            .filter(|e| e.template_id == "village")
            .count();
        let ruins = layout
            .placed
            .iter()
            .filter(|e| e.template_id == "ruin")
            .count();
        assert!(
            villages > ruins,
            "rarity 0.2 village ({villages}) should outnumber rarity 0.8 ruin ({ruins})"
        );
    }

    #[test]
    fn test_paths_connect_pois() {
        let generator = LayoutGenerator::default();
        let mut request = village_ruin_request();
        request.width = 16;
        request.height = 16;
        request.max_entities = 4;
        let layout = generator.generate(&request).unwrap();
        let (grid, _) = generator.build_world(&request).unwrap();

        let poi_count = layout.pois().count();
        if poi_count >= 2 {
            assert!(!layout.paths.is_empty());
        }
        for path in &layout.paths {
            for pair in path.points.windows(2) {
                assert_eq!(grid.distance(pair[0], pair[1]), 1);
            }
            for point in &path.points {
                assert!(grid.cell(*point).unwrap().walkable);
            }
        }
    }

    #[test]
    fn test_zero_grid_is_structural_error() {
        let generator = LayoutGenerator::default();
        let request = GenerationRequest::new(0, 10);
        assert!(matches!(
            generator.generate(&request),
            Err(WorldGenError::InvalidGrid { .. })
        ));
    }

    #[test]
    fn test_invalid_rule_is_structural_error() {
        let generator = LayoutGenerator::default();
        let mut request = flat_request(10, 10);
        request.category_rules.insert(
            Category::Social,
            PlacementRule {
                min_spacing: 9,
                max_spacing: Some(3),
                ..Default::default()
            },
        );
        assert!(matches!(
            generator.generate(&request),
            Err(WorldGenError::InvalidRuleConfiguration { .. })
        ));
    }

    #[test]
    fn test_overfull_request_degrades_gracefully() {
        let generator = LayoutGenerator::default();
        let mut request = village_ruin_request();
        request.max_entities = 50; // far more than a 5x5 grid can hold
        let layout = generator.generate(&request).unwrap();
        assert!(!layout.placed.is_empty());
        assert!(!layout.failures.is_empty());
        assert!(layout.placed.len() < 50);
    }

    #[test]
    fn test_resource_nodes_placed() {
        let generator = LayoutGenerator::default();
        let mut request = flat_request(20, 20);
        request.templates = vec![
            Template::new("iron-vein", Category::Resource, 0.3).with_amount(5, 15),
            Template::new("herb-patch", Category::Resource, 0.6).with_amount(1, 4),
        ];
        request.max_entities = 0;
        request.resource_nodes = 6;
        let layout = generator.generate(&request).unwrap();

        assert_eq!(layout.resources().count(), 6);
        for resource in layout.resources() {
            assert!(resource.amount.is_some());
            assert!(!resource.depleted);
        }
    }

    #[test]
    fn test_cache_idempotence() {
        let generator = CachedLayoutGenerator::default();
        let request = village_ruin_request();

        let first = generator.get_or_generate(&request).unwrap();
        assert_eq!(generator.inner().invocation_count(), 1);

        let second = generator.get_or_generate(&request).unwrap();
        assert_eq!(first, second);
        // Second call is a pure cache hit
        assert_eq!(generator.inner().invocation_count(), 1);
        assert_eq!(generator.cache_len(), 1);
        assert!(generator.cache_hit_ratio() > 0.0);
    }

    #[test]
    fn test_cache_and_naive_agree() {
        let request = village_ruin_request();
        let naive = LayoutGenerator::default().generate(&request).unwrap();
        let cached = CachedLayoutGenerator::default()
            .get_or_generate(&request)
            .unwrap();
        assert_eq!(naive, cached);
    }

    #[test]
    fn test_cache_clear_forces_regeneration() {
        let generator = CachedLayoutGenerator::default();
        let request = village_ruin_request();
        generator.get_or_generate(&request).unwrap();
        generator.clear_cache();
        assert_eq!(generator.cache_len(), 0);
        generator.get_or_generate(&request).unwrap();
        assert_eq!(generator.inner().invocation_count(), 2);
    }

    #[test]
    fn test_cache_distinguishes_requests() {
        let generator = CachedLayoutGenerator::default();
        let request = village_ruin_request();
        let mut other = request.clone();
        other.seed = Some(99);

        generator.get_or_generate(&request).unwrap();
        generator.get_or_generate(&other).unwrap();
        assert_eq!(generator.cache_len(), 2);
        assert_eq!(generator.inner().invocation_count(), 2);
    }

    #[test]
    fn test_concurrent_generation_against_shared_cache() {
        use std::sync::Arc;

        let generator = Arc::new(CachedLayoutGenerator::default());
        let request = village_ruin_request();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let generator = Arc::clone(&generator);
                let request = request.clone();
                scope.spawn(move || {
                    let layout = generator.get_or_generate(&request).unwrap();
                    assert!(!layout.placed.is_empty());
                });
            }
        });

        // Thundering-herd misses may duplicate work, but the store stays
        // consistent: one entry, identical layout
        assert_eq!(generator.cache_len(), 1);
        let layout = generator.get_or_generate(&request).unwrap();
        assert_eq!(
            layout,
            LayoutGenerator::default().generate(&request).unwrap()
        );
    }
}
