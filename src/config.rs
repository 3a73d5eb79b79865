//! Build configuration.
//!
//! Stored as JSON alongside the dataset. Every field has a default, so an
//! empty object `{}` is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::format::MAX_SIZE_EXPONENT;

/// Knobs for `ImageBuilder`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    /// Smallest accepted ROM size exponent (2^11 = 2 KiB).
    pub min_size_exponent: u8,
    /// Largest accepted ROM size exponent (2^23 = 8 MiB).
    pub max_size_exponent: u8,
    /// zlib level for descriptions, 0-9.
    pub compression_level: u32,
    /// Compress and verify descriptions on the rayon pool.
    pub parallel: bool,
    /// Drop machines without ROMs and names/manufacturers nothing uses.
    pub prune_unreferenced: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            min_size_exponent: 11,
            max_size_exponent: 23,
            compression_level: 9,
            parallel: true,
            prune_unreferenced: true,
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(Error::Config)
    }

    /// First problem with the settings, as a message.
    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        if self.min_size_exponent > self.max_size_exponent {
            return Err(format!(
                "min_size_exponent {} > max_size_exponent {}",
                self.min_size_exponent, self.max_size_exponent
            ));
        }
        if self.max_size_exponent > MAX_SIZE_EXPONENT {
            return Err(format!(
                "max_size_exponent {} exceeds {}",
                self.max_size_exponent, MAX_SIZE_EXPONENT
            ));
        }
        if self.compression_level > 9 {
            return Err(format!("compression_level {} exceeds 9", self.compression_level));
        }
        Ok(())
    }

    /// Read and validate a config file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BuildConfig::default();
        config.validate().unwrap();
        assert_eq!(config.min_size_exponent, 11);
        assert_eq!(config.max_size_exponent, 23);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: BuildConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BuildConfig::default());

        let config: BuildConfig = serde_json::from_str(r#"{"parallel": false}"#).unwrap();
        assert!(!config.parallel);
        assert_eq!(config.compression_level, 9);
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let config = BuildConfig {
            min_size_exponent: 20,
            max_size_exponent: 10,
            ..BuildConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_size_exponent"));
    }

    #[test]
    fn test_validate_rejects_level() {
        let config = BuildConfig {
            compression_level: 10,
            ..BuildConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.json");
        let config = BuildConfig {
            min_size_exponent: 8,
            parallel: false,
            ..BuildConfig::default()
        };
        config.write_to(&path).unwrap();
        assert_eq!(BuildConfig::read_from(&path).unwrap(), config);
    }
}
