use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Query parameter holding one filter token per occurrence
    pub query_key: String,
    /// Storage key of the saved filter envelope
    pub storage_key: String,
    /// Filters used when neither the address nor storage selects any
    pub default_filters: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_key: "q".to_string(),
            storage_key: "savedFilters".to_string(),
            default_filters: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_default_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_filters = filters.into_iter().map(Into::into).collect();
        self
    }
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<EngineConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    toml::from_str::<EngineConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })
}

pub fn default_config() -> &'static EngineConfig {
    static DEFAULT_CONFIG: LazyLock<EngineConfig> = LazyLock::new(EngineConfig::default);
    &DEFAULT_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: EngineConfig = toml::from_str(r#"default_filters = ["severity=critical"]"#)
            .expect("valid toml");
        assert_eq!(config.query_key, "q");
        assert_eq!(config.storage_key, "savedFilters");
        assert_eq!(config.default_filters, vec!["severity=critical"]);
    }

    #[test]
    fn test_load_config_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(&config, default_config());
    }
}
