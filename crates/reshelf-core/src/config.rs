//! reshelf configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/reshelf/config.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Missing keys in an override file keep their default values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/reshelf.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    pub page_size: i64,
    /// Run recompute after every mapping change made through the CLI
    pub recompute_after_mapping: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("reshelf.db"),
            page_size: 50,
            recompute_after_mapping: true,
        }
    }
}

impl Config {
    /// Load config, preferring `override_path`, then the data-dir override,
    /// then the embedded defaults
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let path = override_path
            .map(Path::to_path_buf)
            .or_else(default_config_path)
            .filter(|p| p.exists());

        match path {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                let defaults = Self::parse(DEFAULT_CONFIG)?;
                defaults.merged(&content)
            }
            None => Self::parse(DEFAULT_CONFIG),
        }
    }

    /// Parse a full config from TOML, filling gaps with built-in defaults
    pub fn parse(content: &str) -> Result<Self> {
        Self::default().merged(content)
    }

    fn merged(self, content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = self;
        if let Some(db) = raw.database {
            if let Some(path) = db.path {
                config.database_path = path;
            }
        }
        if let Some(listing) = raw.listing {
            if let Some(size) = listing.page_size {
                if size <= 0 {
                    return Err(Error::Config(format!(
                        "listing.page_size must be positive, got {}",
                        size
                    )));
                }
                config.page_size = size;
            }
        }
        if let Some(recompute) = raw.recompute {
            if let Some(after) = recompute.after_mapping {
                config.recompute_after_mapping = after;
            }
        }
        Ok(config)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("reshelf").join("config.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    database: Option<RawDatabase>,
    listing: Option<RawListing>,
    recompute: Option<RawRecompute>,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawListing {
    page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawRecompute {
    after_mapping: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_default_parses() {
        let config = Config::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::parse("[listing]\npage_size = 10\n").unwrap();
        assert_eq!(config.page_size, 10);
        assert!(config.recompute_after_mapping);
        assert_eq!(config.database_path, PathBuf::from("reshelf.db"));
    }

    #[test]
    fn test_invalid_page_size() {
        let err = Config::parse("[listing]\npage_size = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::parse("[listing\n").is_err());
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\npath = \"/tmp/other.db\"\n[recompute]\nafter_mapping = false").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert!(!config.recompute_after_mapping);
        assert_eq!(config.page_size, 50);
    }
}
