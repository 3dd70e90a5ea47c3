use crate::error::DoctrineError;
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Quiescence delay before a debounced full-graph scan fires.
    pub debounce_ms: u64,
    /// When false, registering a node never arms the full-scan timer.
    pub enabled: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            debounce_ms: 1000,
            enabled: true,
        }
    }
}

/// Defaults for the query surface when the caller gives no explicit threshold or limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    pub tension_threshold: f64,
    pub strength_threshold: f64,
    pub event_limit: usize,
    pub resolution_limit: usize,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        QueryDefaults {
            tension_threshold: 0.7,
            strength_threshold: 0.7,
            event_limit: 50,
            resolution_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub queries: QueryDefaults,
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, DoctrineError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML config file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DoctrineError> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read engine config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(EngineConfig::default());
        }
        Self::from_toml_str(&read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> Result<String, DoctrineError> {
        Ok(toml::to_string(self)?)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.detection.debounce_ms)
    }

    fn validate(&self) -> Result<(), DoctrineError> {
        for (name, value) in [
            ("queries.tension_threshold", self.queries.tension_threshold),
            ("queries.strength_threshold", self.queries.strength_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DoctrineError::Config(format!(
                    "{name} must lie within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Where an engine's configuration lives.
pub trait EngineConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<EngineConfig, DoctrineError>;
    fn set_config(&self, config: &EngineConfig) -> Result<(), DoctrineError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EngineConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<EngineConfig, DoctrineError> {
        EngineConfig::load(&self.path)
    }

    fn set_config(&self, config: &EngineConfig) -> Result<(), DoctrineError> {
        tracing::debug!("Attempting to write engine config to: {:?}", &self.path);
        config.validate()?;
        write(&self.path, config.to_toml_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_log::test;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
[detection]
debounce_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert!(config.detection.enabled);
        assert_eq!(config.queries, QueryDefaults::default());
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
[queries]
tension_threshold = 1.5
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DoctrineError::Config(_)));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig::load(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_provider_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let provider = TomlConfigProvider::new(temp_dir.path().join("engine.toml"));

        let mut config = EngineConfig::default();
        config.detection.debounce_ms = 20;
        config.queries.event_limit = 5;
        provider.set_config(&config).unwrap();

        assert_eq!(provider.get_config().unwrap(), config);
    }
}
