use std::fs;
use std::path::{Path, PathBuf};

use robosim_shared::SimConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML from {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Parse a YAML config. Missing fields take their defaults.
pub fn parse_config(content: &str) -> Result<SimConfig, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(SimConfig::default());
    }
    serde_yaml::from_str(content)
}

/// Load a YAML config file.
pub fn load_config(path: &Path) -> Result<SimConfig, ConfigError> {
    log::debug!("loading config from {:?}", path);
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}
