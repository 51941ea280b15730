//! Configuration for the regridder cache.

use serde::{Deserialize, Serialize};

/// Configuration for regridder construction and caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegridderConfig {
    /// Maximum number of operators held in memory.
    pub cache_capacity: usize,

    /// Sub-samples per target cell edge for cubed-sphere sources.
    /// `None` picks a count from the source/target resolution ratio.
    pub samples_per_cell: Option<usize>,

    /// Write newly generated weights into the weights directory.
    pub persist_weights: bool,
}

impl Default for RegridderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 32,
            samples_per_cell: None,
            persist_weights: true,
        }
    }
}

impl RegridderConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("REGRID_CACHE_CAPACITY") {
            if let Ok(size) = val.parse() {
                config.cache_capacity = size;
            }
        }

        if let Ok(val) = std::env::var("REGRID_SAMPLES_PER_CELL") {
            if let Ok(samples) = val.parse() {
                config.samples_per_cell = Some(samples);
            }
        }

        if let Ok(val) = std::env::var("REGRID_PERSIST_WEIGHTS") {
            config.persist_weights = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }

        if let Some(samples) = self.samples_per_cell {
            if samples == 0 || samples > 64 {
                return Err("samples_per_cell must be 1-64".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegridderConfig::default();
        assert_eq!(config.cache_capacity, 32);
        assert!(config.samples_per_cell.is_none());
        assert!(config.persist_weights);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RegridderConfig::default();
        config.cache_capacity = 0;
        assert!(config.validate().is_err());

        config = RegridderConfig::default();
        config.samples_per_cell = Some(0);
        assert!(config.validate().is_err());

        config.samples_per_cell = Some(65);
        assert!(config.validate().is_err());

        config.samples_per_cell = Some(4);
        assert!(config.validate().is_ok());
    }
}
