// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine configuration, stored as RON.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The text is not valid RON for [`EngineConfig`]
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),
}

/// Tunables of the graph engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Warn for every connection dropped by the activation refresh
    pub warn_on_connection_removal: bool,
    /// Maximum node executions per run before execution is aborted
    pub max_execution_steps: usize,
    /// Warn when activation meets an entity id it cannot remap
    pub warn_on_unmapped_entities: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            warn_on_connection_removal: true,
            max_execution_steps: 100_000,
            warn_on_unmapped_entities: true,
        }
    }
}

impl EngineConfig {
    /// Parse from RON text
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    /// Load from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = EngineConfig::from_ron("(max_execution_steps: 10)").unwrap();
        assert_eq!(config.max_execution_steps, 10);
        assert!(config.warn_on_connection_removal);
        assert!(config.warn_on_unmapped_entities);
    }

    #[test]
    fn test_pretty_output_parses_back() {
        let config = EngineConfig {
            warn_on_connection_removal: false,
            ..EngineConfig::default()
        };
        let text = config.to_ron().unwrap();
        assert_eq!(EngineConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_text_is_an_error() {
        assert!(matches!(EngineConfig::from_ron("(max_execution_steps: \"x\")"), Err(ConfigError::Parse(_))));
        assert!(matches!(EngineConfig::load("/nonexistent/engine.ron"), Err(ConfigError::Io(_))));
    }
}
