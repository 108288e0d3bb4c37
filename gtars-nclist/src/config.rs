use std::fs::read_to_string;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_SIZE_THRESHOLD;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LazyConfig {
    /// Chunk fill trigger, in the units of the caller's size estimator.
    #[serde(default = "default_size_threshold")]
    pub size_threshold: usize,
}

fn default_size_threshold() -> usize {
    DEFAULT_SIZE_THRESHOLD
}

impl Default for LazyConfig {
    fn default() -> Self {
        LazyConfig {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
        }
    }
}

impl LazyConfig {
    ///
    /// Load a config from disk.
    ///
    /// # Arguments
    /// - path: Path to the config file (a .toml) file.
    pub fn try_from(path: &Path) -> Result<LazyConfig> {
        let toml_str = read_to_string(path)?;
        let config: LazyConfig = toml::from_str(&toml_str)?;

        Ok(config)
    }

    pub fn new(size_threshold: usize) -> LazyConfig {
        LazyConfig { size_threshold }
    }
}
