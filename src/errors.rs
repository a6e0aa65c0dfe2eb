use crate::grid::Coord;
use crate::rules::Category;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorldGenError {
    // Structural errors: raised before any search begins
    #[error("Invalid grid dimensions {width}x{height}: {reason}")]
    InvalidGrid {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("Invalid placement rule for {category}: {reason}")]
    InvalidRuleConfiguration { category: Category, reason: String },

    #[error("Invalid template '{template_id}': {reason}")]
    InvalidTemplate { template_id: String, reason: String },

    // Recoverable, per-entity / per-path errors
    #[error("No valid position for {category} after {attempts} attempts")]
    NoValidPosition { category: Category, attempts: u32 },

    #[error("No walkable route from {from:?} to {to:?}")]
    Unreachable { from: Coord, to: Coord },

    // Config-related errors
    #[error("Failed to read config file: {0}")]
    ConfigReadFailed(#[from] std::io::Error),

    #[error("Failed to deserialize config: {0}")]
    ConfigParseFailed(#[from] toml::de::Error),

    #[error("Config validation failed: {reason}")]
    ConfigValidationFailed { reason: String },
}

impl WorldGenError {
    /// Recoverable errors are collected alongside successes; anything else
    /// aborts the generation run before search begins.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WorldGenError::NoValidPosition { .. } | WorldGenError::Unreachable { .. }
        )
    }
}

/// Result type alias for all operations
pub type WorldGenResult<T> = Result<T, WorldGenError>;
