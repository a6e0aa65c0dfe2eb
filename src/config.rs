use crate::errors::{WorldGenError, WorldGenResult};
use crate::generator::GenerationRequest;
use crate::grid::GridTopology;
use crate::rules::{Category, PlacementRule, Template};
use crate::terrain::TerrainAlgorithm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use validator::Validate;

/// TOML-loadable generation configuration for the benchmark tool and for
/// callers that prefer files over building requests in code.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorldGenConfig {
    #[validate(range(min = 1, max = 2048))]
    pub width: u32,
    #[validate(range(min = 1, max = 2048))]
    pub height: u32,
    pub topology: GridTopology,
    pub terrain: TerrainAlgorithm,
    pub seed: Option<u64>,
    #[validate(range(min = 0, max = 10_000))]
    pub max_entities: u32,
    #[validate(range(min = 0, max = 10_000))]
    pub resource_nodes: u32,
    pub connect_paths: bool,
    #[serde(default)]
    pub category_rules: BTreeMap<Category, PlacementRule>,
    #[serde(default)]
    pub templates: Vec<Template>,
}

impl Default for WorldGenConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            topology: GridTopology::Square,
            terrain: TerrainAlgorithm::default(),
            seed: None,
            max_entities: 12,
            resource_nodes: 8,
            connect_paths: true,
            category_rules: BTreeMap::new(),
            templates: vec![
                Template::new("village", Category::Social, 0.2),
                Template::new("ruin", Category::Exploration, 0.8),
                Template::new("dungeon", Category::Dungeon, 0.6),
                Template::new("iron-vein", Category::Resource, 0.4).with_amount(5, 25),
            ],
        }
    }
}

impl WorldGenConfig {
    pub fn from_toml_str(contents: &str) -> WorldGenResult<Self> {
        let config: WorldGenConfig = toml::from_str(contents)?;
        config.validated()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> WorldGenResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    fn validated(self) -> WorldGenResult<Self> {
        self.validate().map_err(|validation_errors| {
            let details = validation_errors
                .field_errors()
                .iter()
                .map(|(field, errors)| {
                    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                    format!("{field}: {}", messages.join(", "))
                })
                .collect::<Vec<String>>()
                .join("; ");
            WorldGenError::ConfigValidationFailed { reason: details }
        })?;
        for (category, rule) in &self.category_rules {
            rule.validate_for(*category)?;
        }
        for template in &self.templates {
            template.validate()?;
        }
        Ok(self)
    }

    pub fn to_request(&self) -> GenerationRequest {
        GenerationRequest {
            width: self.width,
            height: self.height,
            topology: self.topology,
            terrain: self.terrain.clone(),
            category_rules: self.category_rules.clone(),
            templates: self.templates.clone(),
            seed: self.seed,
            max_entities: self.max_entities,
            resource_nodes: self.resource_nodes,
            connect_paths: self.connect_paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let config = WorldGenConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed = WorldGenConfig::from_toml_str(&toml).unwrap();
        assert_eq!(parsed.width, config.width);
        assert_eq!(parsed.templates.len(), config.templates.len());
    }

    #[test]
    fn test_minimal_toml() {
        let config = WorldGenConfig::from_toml_str(
            r#"
            width = 32
            height = 32
            topology = "Hex"
            seed = 7
            max_entities = 5
            resource_nodes = 0
            connect_paths = false

            [terrain.Flat]
            terrain = "Plains"
            elevation = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.topology, GridTopology::Hex);
        assert_eq!(config.seed, Some(7));
        assert!(config.templates.is_empty());
    }

    #[test]
    fn test_zero_width_rejected() {
        let result = WorldGenConfig::from_toml_str(
            r#"
            width = 0
            height = 32
            topology = "Square"
            max_entities = 5
            resource_nodes = 0
            connect_paths = true

            [terrain.Flat]
            terrain = "Plains"
            elevation = 0.5
            "#,
        );
        assert!(matches!(
            result,
            Err(WorldGenError::ConfigValidationFailed { .. })
        ));
    }

    #[test]
    fn test_bad_rule_in_config_rejected() {
        let mut config = WorldGenConfig::default();
        config.category_rules.insert(
            Category::Social,
            PlacementRule {
                min_elevation: 0.9,
                max_elevation: 0.1,
                ..Default::default()
            },
        );
        assert!(config.validated().is_err());
    }

    #[test]
    fn test_request_conversion() {
        let config = WorldGenConfig::default();
        let request = config.to_request();
        assert_eq!(request.width, config.width);
        assert_eq!(request.max_entities, config.max_entities);
        request.validate().unwrap();
    }
}
