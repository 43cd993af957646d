/// Application configuration
///
/// Loaded from a TOML file. Every section and field is optional; a
/// missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::handoff::DEFAULT_WHATSAPP_NUMBER;
use crate::media::{CompressOptions, DEFAULT_MAX_IMAGES, DEFAULT_MAX_SIZE_BYTES, MAX_DIMENSION};
use crate::state::data::Currency;
use crate::state::garage::DEFAULT_STORAGE_KEY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub compression: CompressionConfig,
    pub handoff: HandoffConfig,
    pub display: DisplayConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file; the user data directory when unset
    pub db_path: Option<PathBuf>,
    /// Key the garage is stored under
    pub key: String,
    /// Total bytes allowed, unlimited when unset
    pub quota_bytes: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            key: DEFAULT_STORAGE_KEY.to_string(),
            quota_bytes: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CompressionConfig {
    pub max_size_bytes: usize,
    pub max_dimension: u32,
    /// Images per listing form
    pub max_images: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            max_dimension: MAX_DIMENSION,
            max_images: DEFAULT_MAX_IMAGES,
        }
    }
}

impl CompressionConfig {
    pub fn options(&self) -> CompressOptions {
        CompressOptions {
            max_size_bytes: self.max_size_bytes,
            max_dimension: self.max_dimension,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HandoffConfig {
    pub whatsapp_number: String,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            whatsapp_number: DEFAULT_WHATSAPP_NUMBER.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub currency: Currency,
    /// GHS per USD
    pub exchange_rate: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            exchange_rate: 15.0,
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(|reason| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        })?;
        info!("Configuration loaded from: {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Values that parse but cannot drive the compressor
    pub fn validate(&self) -> Result<(), String> {
        if self.compression.max_dimension == 0 {
            return Err("compression.max_dimension must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage.key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.compression.options(), CompressOptions::default());
    }

    #[test]
    fn test_partial_file_overrides_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garage.toml");
        std::fs::write(
            &path,
            r#"
            [storage]
            quota_bytes = 5242880

            [compression]
            max_size_bytes = 100000

            [display]
            currency = "USD"
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.quota_bytes, Some(5_242_880));
        assert_eq!(config.storage.key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.compression.max_size_bytes, 100_000);
        assert_eq!(config.compression.max_images, DEFAULT_MAX_IMAGES);
        assert_eq!(config.display.currency, Currency::Usd);
        assert_eq!(config.display.exchange_rate, 15.0);
        assert_eq!(config.handoff.whatsapp_number, DEFAULT_WHATSAPP_NUMBER);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[compression\nmax_size_bytes = ").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_zero_max_dimension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.toml");
        std::fs::write(&path, "[compression]\nmax_dimension = 0\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("max_dimension"));
    }
}
