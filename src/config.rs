//! Application settings
//!
//! Layered with the `config` crate, later sources win:
//!
//! ```text
//! built-in defaults
//!   └─→ codepool.toml (or --config FILE)
//!        └─→ CODEPOOL_* environment variables
//! ```

use crate::error::{Error, Result};
use crate::storage::{StoreOptions, DEFAULT_POOL_SIZE};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default settings file, looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "codepool";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CODEPOOL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the journal
    pub database_path: PathBuf,
    /// Pool size
    pub total_codes: u32,
    /// Number of designated winning codes, used for the hit estimate
    pub winning_codes: u32,
    /// Fsync every journal batch
    pub sync_writes: bool,
    /// Compact the journal on open past this many batches
    pub compact_threshold: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/codes"),
            total_codes: DEFAULT_POOL_SIZE,
            winning_codes: 88,
            sync_writes: true,
            compact_threshold: 1024,
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment
    ///
    /// An explicit `path` must exist; otherwise `codepool.toml` in the
    /// working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .set_default("database_path", defaults.database_path.to_string_lossy().as_ref())
            .and_then(|b| b.set_default("total_codes", i64::from(defaults.total_codes)))
            .and_then(|b| b.set_default("winning_codes", i64::from(defaults.winning_codes)))
            .and_then(|b| b.set_default("sync_writes", defaults.sync_writes))
            .and_then(|b| b.set_default("compact_threshold", defaults.compact_threshold as i64))
            .map_err(|e| Error::Config(format!("Invalid default: {}", e)))?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| Error::Config(format!("Failed to load settings: {}", e)))?
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.total_codes == 0 {
            return Err(Error::Config("total_codes must be positive".to_string()));
        }
        if self.total_codes > DEFAULT_POOL_SIZE {
            return Err(Error::Config(format!(
                "total_codes {} exceeds the four-digit space of {}",
                self.total_codes, DEFAULT_POOL_SIZE
            )));
        }
        if self.winning_codes > self.total_codes {
            return Err(Error::Config(format!(
                "winning_codes {} exceeds total_codes {}",
                self.winning_codes, self.total_codes
            )));
        }
        Ok(())
    }

    /// Store options derived from these settings
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            total: self.total_codes,
            sync_writes: self.sync_writes,
            compact_threshold: self.compact_threshold,
        }
    }

    /// Render as TOML, in the same shape `load` reads
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(format!("Failed to render settings: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.store_options().total, 10_000);
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        let zero = Settings {
            total_codes: 0,
            ..Settings::default()
        };
        assert!(matches!(zero.validate(), Err(Error::Config(_))));

        let too_big = Settings {
            total_codes: 10_001,
            ..Settings::default()
        };
        assert!(matches!(too_big.validate(), Err(Error::Config(_))));

        let too_many_winners = Settings {
            total_codes: 50,
            winning_codes: 51,
            ..Settings::default()
        };
        assert!(matches!(too_many_winners.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/pool\"\ntotal_codes = 500\nwinning_codes = 5\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path))?;
        assert_eq!(settings.database_path, PathBuf::from("/tmp/pool"));
        assert_eq!(settings.total_codes, 500);
        assert_eq!(settings.winning_codes, 5);
        assert!(settings.sync_writes);
        Ok(())
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = Settings::load(Some(&dir.path().join("missing.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_output_loads_back() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roundtrip.toml");
        let original = Settings {
            total_codes: 1_000,
            winning_codes: 10,
            sync_writes: false,
            ..Settings::default()
        };
        std::fs::write(&path, original.to_toml()?).unwrap();

        assert_eq!(Settings::load(Some(&path))?, original);
        Ok(())
    }
}
