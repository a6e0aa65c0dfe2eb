use crate::rules::Category;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A density value constrained to [0.1, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, From, Serialize, Deserialize)]
pub struct Density(f32);

impl Density {
    const MIN: f32 = 0.1;
    const MAX: f32 = 1.0;

    pub fn new(value: f32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

/// An organization factor constrained to [0.1, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, From, Serialize, Deserialize)]
pub struct OrganizationFactor(f32);

impl OrganizationFactor {
    const MIN: f32 = 0.1;
    const MAX: f32 = 1.0;

    pub fn new(value: f32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

/// A road density constrained to [0.1, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, From, Serialize, Deserialize)]
pub struct RoadDensity(f32);

impl RoadDensity {
    const MIN: f32 = 0.1;
    const MAX: f32 = 1.0;

    pub fn new(value: f32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

/// Building variants a settlement layout can request
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
pub enum BuildingType {
    Inn,
    Shop,
    Tavern,
    GuildHall,
    Home,
    Barracks,
    GuardPost,
    Vault,
    Shrine,
    Camp,
    Watchtower,
}

/// High-level narrative/danger inputs for a generation pass
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Clamped to 1..=10
    pub danger_level: u8,
    pub category: Category,
    pub narrative_context: Vec<String>,
    pub area_width: u32,
    pub area_height: u32,
}

/// Concrete density and spacing values derived from the inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDistribution {
    pub density: Density,
    pub organization_factor: OrganizationFactor,
    pub counts_by_type: BTreeMap<BuildingType, u32>,
    pub min_spacing: u32,
    pub road_density: RoadDensity,
}

const BASE_DENSITY: f32 = 0.25;
const DANGER_DENSITY_FACTOR: f32 = 0.04;
const MIN_TOTAL_BUILDINGS: u32 = 3;
const MAX_TOTAL_BUILDINGS: u32 = 40;
const BUILDING_AREA_FACTOR: f32 = 0.02;
const SPACING_BASE: f32 = 2.0;
const SPACING_ORGANIZATION_FACTOR: f32 = 4.0;

/// Multiplicative keyword adjustments. Multiple matches compose.
const DENSITY_KEYWORDS: [(&str, f32); 3] =
    [("crowded", 1.2), ("sparse", 0.8), ("abandoned", 0.6)];
const ORGANIZATION_KEYWORDS: [(&str, f32); 2] = [("organized", 1.2), ("chaotic", 0.8)];
const COUNT_KEYWORDS: [(&str, BuildingType, f32); 3] = [
    ("commercial", BuildingType::Shop, 1.3),
    ("residential", BuildingType::Home, 1.3),
    ("pious", BuildingType::Shrine, 1.3),
];

/// Derives density, organization, per-type counts, spacing, and road
/// density from narrative/danger inputs. Out-of-range inputs are clamped,
/// never rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationParameterCalculator;

impl GenerationParameterCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(&self, params: &GenerationParams) -> BuildingDistribution {
        let danger = params.danger_level.clamp(1, 10) as f32;
        let area = (params.area_width.max(1) * params.area_height.max(1)) as f32;

        // Larger areas support proportionally fewer buildings per cell
        let area_scale = (area.log10() / 4.0).clamp(0.5, 1.0);
        let category_factor = category_density_factor(params.category);

        let mut density = (BASE_DENSITY + danger * DANGER_DENSITY_FACTOR)
            * area_scale
            * category_factor;
        let mut organization = category_organization(params.category);

        for keyword in &params.narrative_context {
            let keyword = keyword.to_lowercase();
            for (needle, factor) in DENSITY_KEYWORDS {
                if keyword.contains(needle) {
                    density *= factor;
                }
            }
            for (needle, factor) in ORGANIZATION_KEYWORDS {
                if keyword.contains(needle) {
                    organization *= factor;
                }
            }
        }

        let total_estimate = (area * density * BUILDING_AREA_FACTOR)
            .round()
            .clamp(MIN_TOTAL_BUILDINGS as f32, MAX_TOTAL_BUILDINGS as f32);

        let mut shares: Vec<(BuildingType, f32)> = category_ratios(params.category)
            .iter()
            .map(|&(building, ratio)| (building, total_estimate * ratio))
            .collect();

        for keyword in &params.narrative_context {
            let keyword = keyword.to_lowercase();
            for (needle, building, factor) in COUNT_KEYWORDS {
                if keyword.contains(needle) {
                    for (b, share) in shares.iter_mut() {
                        if *b == building {
                            *share *= factor;
                        }
                    }
                }
            }
        }

        let mut counts_by_type: BTreeMap<BuildingType, u32> = shares
            .iter()
            .map(|&(b, share)| (b, share.round().max(0.0) as u32))
            .collect();

        // Validation pass: clamp everything into range and rescale counts
        // whose sum blew past the global maximum.
        let density = Density::new(density);
        let organization = OrganizationFactor::new(organization);
        let road_density =
            RoadDensity::new(density.get() * 0.4 + organization.get() * 0.4);

        let sum: u32 = counts_by_type.values().sum();
        if sum > MAX_TOTAL_BUILDINGS {
            let scale = MAX_TOTAL_BUILDINGS as f32 / sum as f32;
            for count in counts_by_type.values_mut() {
                *count = ((*count as f32) * scale).floor() as u32;
            }
        }

        let spacing_cap = (params.area_width.min(params.area_height) / 4).max(1);
        let min_spacing = ((SPACING_BASE
            + organization.get() * SPACING_ORGANIZATION_FACTOR)
            .round() as u32)
            .clamp(1, spacing_cap);

        debug!(
            category = %params.category,
            density = density.get(),
            organization = organization.get(),
            min_spacing,
            "derived generation parameters"
        );

        BuildingDistribution {
            density,
            organization_factor: organization,
            counts_by_type,
            min_spacing,
            road_density,
        }
    }
}

fn category_density_factor(category: Category) -> f32 {
    match category {
        Category::Social => 1.2,
        Category::Dungeon => 1.0,
        Category::Resource => 0.9,
        Category::Exploration => 0.8,
    }
}

fn category_organization(category: Category) -> f32 {
    match category {
        Category::Social => 0.8,
        Category::Dungeon => 0.6,
        Category::Resource => 0.4,
        Category::Exploration => 0.3,
    }
}

fn category_ratios(category: Category) -> &'static [(BuildingType, f32)] {
    match category {
        Category::Social => &[
            (BuildingType::Inn, 0.2),
            (BuildingType::Shop, 0.3),
            (BuildingType::Tavern, 0.2),
            (BuildingType::GuildHall, 0.1),
            (BuildingType::Home, 0.2),
        ],
        Category::Dungeon => &[
            (BuildingType::Barracks, 0.3),
            (BuildingType::GuardPost, 0.3),
            (BuildingType::Vault, 0.2),
            (BuildingType::Shrine, 0.2),
        ],
        Category::Exploration => &[
            (BuildingType::Camp, 0.4),
            (BuildingType::Watchtower, 0.3),
            (BuildingType::Shrine, 0.3),
        ],
        // Resource nodes carry no building program
        Category::Resource => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(category: Category, danger: u8, context: &[&str]) -> GenerationParams {
        GenerationParams {
            danger_level: danger,
            category,
            narrative_context: context.iter().map(|s| s.to_string()).collect(),
            area_width: 50,
            area_height: 50,
        }
    }

    #[test]
    fn test_category_ordering() {
        let calc = GenerationParameterCalculator::new();
        let social = calc.calculate(&params(Category::Social, 5, &[]));
        let dungeon = calc.calculate(&params(Category::Dungeon, 5, &[]));
        let exploration = calc.calculate(&params(Category::Exploration, 5, &[]));

        assert!(social.density > dungeon.density);
        assert!(dungeon.density > exploration.density);
        assert!(social.organization_factor > exploration.organization_factor);
    }

    #[test]
    fn test_danger_raises_density() {
        let calc = GenerationParameterCalculator::new();
        let calm = calc.calculate(&params(Category::Dungeon, 1, &[]));
        let deadly = calc.calculate(&params(Category::Dungeon, 10, &[]));
        assert!(deadly.density > calm.density);
    }

    #[test]
    fn test_social_count_split() {
        let calc = GenerationParameterCalculator::new();
        let dist = calc.calculate(&params(Category::Social, 5, &[]));

        // Shop holds the largest share of the social split
        let shops = dist.counts_by_type[&BuildingType::Shop];
        let guild_halls = dist.counts_by_type[&BuildingType::GuildHall];
        assert!(shops > guild_halls);
        assert!(dist.counts_by_type.contains_key(&BuildingType::Inn));
        assert!(dist.counts_by_type.contains_key(&BuildingType::Home));
    }

    #[test]
    fn test_keywords_compose_multiplicatively() {
        let calc = GenerationParameterCalculator::new();
        let plain = calc.calculate(&params(Category::Social, 5, &[]));
        let crowded = calc.calculate(&params(Category::Social, 5, &["a crowded city"]));
        let both = calc.calculate(
            &params(Category::Social, 5, &["a crowded city", "crowded streets"]),
        );

        assert!(crowded.density >= plain.density);
        assert!(both.density >= crowded.density);

        let commercial =
            calc.calculate(&params(Category::Social, 5, &["commercial district"]));
        assert!(
            commercial.counts_by_type[&BuildingType::Shop]
                >= plain.counts_by_type[&BuildingType::Shop]
        );
    }

    #[test]
    fn test_organized_keyword() {
        let calc = GenerationParameterCalculator::new();
        let plain = calc.calculate(&params(Category::Exploration, 5, &[]));
        let organized = calc.calculate(&params(Category::Exploration, 5, &["organized"]));
        assert!(organized.organization_factor > plain.organization_factor);
    }

    #[test]
    fn test_no_error_path_on_extreme_inputs() {
        let calc = GenerationParameterCalculator::new();
        let dist = calc.calculate(&GenerationParams {
            danger_level: 255,
            category: Category::Social,
            narrative_context: vec!["crowded".to_string(); 20],
            area_width: 3,
            area_height: 3,
        });

        assert!(dist.density.get() <= 1.0);
        assert!(dist.organization_factor.get() <= 1.0);
        assert!(dist.road_density.get() <= 1.0);
        // Spacing never exceeds a quarter of the short side (floor 1)
        assert_eq!(dist.min_spacing, 1);
        let total: u32 = dist.counts_by_type.values().sum();
        assert!(total <= MAX_TOTAL_BUILDINGS);
    }

    #[test]
    fn test_spacing_clamped_to_quarter_side() {
        let calc = GenerationParameterCalculator::new();
        let dist = calc.calculate(&GenerationParams {
            danger_level: 5,
            category: Category::Social,
            narrative_context: vec![],
            area_width: 16,
            area_height: 100,
        });
        assert!(dist.min_spacing <= 4);
    }

    #[test]
    fn test_resource_category_has_no_buildings() {
        let calc = GenerationParameterCalculator::new();
        let dist = calc.calculate(&params(Category::Resource, 5, &[]));
        assert!(dist.counts_by_type.is_empty());
    }
}
