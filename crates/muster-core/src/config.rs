//! Configuration loading and typed config structures for Muster.
//!
//! The configuration lives in a small YAML file (by default `muster.yaml`
//! in the working directory). Every field has a default, so an absent file
//! or an empty document yields a usable configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Muster configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MusterConfig {
    /// Event store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Game-data catalog settings.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// View cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MusterConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `MUSTER_DB` overrides `store.path`
    /// - `MUSTER_CATALOG` overrides `catalog.path`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` when it exists, otherwise fall back to defaults.
    ///
    /// Environment overrides apply in both cases.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override file locations with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MUSTER_DB") {
            self.store.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("MUSTER_CATALOG") {
            self.catalog.path = PathBuf::from(val);
        }
    }
}

/// Which event store backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Volatile in-process store.
    Memory,
    /// `SQLite` database file at `store.path`.
    #[default]
    Sqlite,
}

/// Event store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database file path (ignored by the memory backend).
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

/// Game-data catalog configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogConfig {
    /// Path of the JSON catalog document.
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

/// View cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// When false, every view is rebuilt from the log.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("muster.db")
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("gamedata.json")
}

const fn default_cache_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let mut config = MusterConfig::parse("").unwrap();
        // Environment overrides are not under test here.
        config.store.path = default_store_path();
        config.catalog.path = default_catalog_path();
        assert_eq!(config, MusterConfig::default());
    }

    #[test]
    fn partial_document_fills_remaining_fields() {
        let yaml = "
store:
  backend: memory
logging:
  level: debug
  format: json
cache:
  enabled: false
";
        let config = MusterConfig::parse(yaml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result = MusterConfig::parse("store:\n  backend: postgres\n");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MusterConfig::load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
    }
}
