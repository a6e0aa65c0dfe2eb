use crate::errors::{WorldGenError, WorldGenResult};
use crate::grid::Coord;
use crate::terrain::TerrainType;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

pub mod calculator;

pub use calculator::{
    BuildingDistribution, BuildingType, Density, GenerationParameterCalculator, GenerationParams,
    OrganizationFactor, RoadDensity,
};

/// Closed set of placement categories. POI categories share the placement
/// contract with resource nodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
pub enum Category {
    Social,
    Dungeon,
    Exploration,
    Resource,
}

impl Category {
    pub fn is_resource(&self) -> bool {
        matches!(self, Category::Resource)
    }
}

/// Declarative per-category constraints, validated at construction time so
/// a malformed rule never reaches the search loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PlacementRule {
    /// Minimum distance to any other spacing-aware entity
    pub min_spacing: u32,
    /// Upper bound for neighbor queries; None means unbounded
    pub max_spacing: Option<u32>,
    pub min_elevation: f32,
    pub max_elevation: f32,
    /// Empty set means any walkable terrain is acceptable
    pub preferred_terrain: BTreeSet<TerrainType>,
    pub avoided_terrain: BTreeSet<TerrainType>,
    /// Zero disables clustering
    pub cluster_min_size: u32,
    pub cluster_max_size: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub rarity: f32,
}

impl Default for PlacementRule {
    fn default() -> Self {
        Self {
            min_spacing: 2,
            max_spacing: None,
            min_elevation: 0.0,
            max_elevation: 1.0,
            preferred_terrain: BTreeSet::new(),
            avoided_terrain: BTreeSet::new(),
            cluster_min_size: 0,
            cluster_max_size: 0,
            rarity: 0.5,
        }
    }
}

impl PlacementRule {
    /// Reject structurally invalid rules before any search begins.
    pub fn validate_for(&self, category: Category) -> WorldGenResult<()> {
        let invalid = |reason: String| WorldGenError::InvalidRuleConfiguration {
            category,
            reason,
        };

        if self.validate().is_err() {
            return Err(invalid(format!(
                "rarity {} outside [0, 1]",
                self.rarity
            )));
        }
        if self.min_elevation > self.max_elevation {
            return Err(invalid(format!(
                "min_elevation {} > max_elevation {}",
                self.min_elevation, self.max_elevation
            )));
        }
        if let Some(max_spacing) = self.max_spacing {
            if self.min_spacing > max_spacing {
                return Err(invalid(format!(
                    "min_spacing {} > max_spacing {max_spacing}",
                    self.min_spacing
                )));
            }
        }
        if self.cluster_min_size > self.cluster_max_size {
            return Err(invalid(format!(
                "cluster_min_size {} > cluster_max_size {}",
                self.cluster_min_size, self.cluster_max_size
            )));
        }
        Ok(())
    }

    pub fn clustering_enabled(&self) -> bool {
        self.cluster_max_size > 0
    }
}

/// A placeable POI or resource variant. A template may carry its own rule;
/// otherwise the category rule from the request applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub category: Category,
    /// Higher rarity biases selection toward other variants
    pub rarity: f32,
    pub rule: Option<PlacementRule>,
    /// Cells occupied around the center; 1 is a single cell
    pub footprint: u32,
    /// Yield range for resource nodes, unused for POIs
    pub amount: Option<(u32, u32)>,
}

impl Template {
    pub fn new(id: impl Into<String>, category: Category, rarity: f32) -> Self {
        Self {
            id: id.into(),
            category,
            rarity,
            rule: None,
            footprint: 1,
            amount: None,
        }
    }

    pub fn with_rule(mut self, rule: PlacementRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn with_footprint(mut self, footprint: u32) -> Self {
        self.footprint = footprint.max(1);
        self
    }

    pub fn with_amount(mut self, min: u32, max: u32) -> Self {
        self.amount = Some((min, max));
        self
    }

    pub fn validate(&self) -> WorldGenResult<()> {
        if !(0.0..=1.0).contains(&self.rarity) {
            return Err(WorldGenError::InvalidTemplate {
                template_id: self.id.clone(),
                reason: format!("rarity {} outside [0, 1]", self.rarity),
            });
        }
        if self.footprint == 0 {
            return Err(WorldGenError::InvalidTemplate {
                template_id: self.id.clone(),
                reason: "footprint must be at least 1".to_string(),
            });
        }
        if let Some((min, max)) = self.amount {
            if min > max {
                return Err(WorldGenError::InvalidTemplate {
                    template_id: self.id.clone(),
                    reason: format!("amount range {min}..{max} is inverted"),
                });
            }
        }
        if let Some(rule) = &self.rule {
            rule.validate_for(self.category)?;
        }
        Ok(())
    }

    /// The rule governing this template: its own, or the category fallback.
    pub fn effective_rule<'a>(&'a self, fallback: &'a PlacementRule) -> &'a PlacementRule {
        self.rule.as_ref().unwrap_or(fallback)
    }
}

/// A single placement call. Created per call; not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRequest {
    pub category: Category,
    pub rule: PlacementRule,
    pub preferred_position: Option<Coord>,
}

impl PlacementRequest {
    pub fn new(category: Category, rule: PlacementRule) -> Self {
        Self {
            category,
            rule,
            preferred_position: None,
        }
    }

    pub fn near(mut self, position: Coord) -> Self {
        self.preferred_position = Some(position);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule_is_valid() {
        PlacementRule::default()
            .validate_for(Category::Social)
            .unwrap();
    }

    #[test]
    fn test_inverted_elevation_rejected() {
        let rule = PlacementRule {
            min_elevation: 0.8,
            max_elevation: 0.2,
            ..Default::default()
        };
        let err = rule.validate_for(Category::Dungeon).unwrap_err();
        assert!(matches!(
            err,
            WorldGenError::InvalidRuleConfiguration { .. }
        ));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_inverted_spacing_rejected() {
        let rule = PlacementRule {
            min_spacing: 10,
            max_spacing: Some(4),
            ..Default::default()
        };
        assert!(rule.validate_for(Category::Social).is_err());
    }

    #[test]
    fn test_inverted_cluster_rejected() {
        let rule = PlacementRule {
            cluster_min_size: 5,
            cluster_max_size: 2,
            ..Default::default()
        };
        assert!(rule.validate_for(Category::Resource).is_err());
    }

    #[test]
    fn test_out_of_range_rarity_rejected() {
        let rule = PlacementRule {
            rarity: 1.5,
            ..Default::default()
        };
        assert!(rule.validate_for(Category::Social).is_err());
    }

    #[test]
    fn test_template_rule_override() {
        let fallback = PlacementRule::default();
        let own = PlacementRule {
            min_spacing: 9,
            ..Default::default()
        };
        let plain = Template::new("camp", Category::Exploration, 0.3);
        assert_eq!(plain.effective_rule(&fallback).min_spacing, 2);

        let custom = Template::new("fort", Category::Exploration, 0.3).with_rule(own);
        assert_eq!(custom.effective_rule(&fallback).min_spacing, 9);
    }

    #[test]
    fn test_template_validation() {
        assert!(Template::new("ore", Category::Resource, 0.4)
            .with_amount(10, 5)
            .validate()
            .is_err());
        assert!(Template::new("ore", Category::Resource, 2.0)
            .validate()
            .is_err());
        assert!(Template::new("ore", Category::Resource, 0.4)
            .with_amount(5, 10)
            .validate()
            .is_ok());
    }
}
