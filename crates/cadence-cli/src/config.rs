//! CLI configuration
//!
//! Resolution order for each setting: command-line flag, then environment
//! variable, then the config file, then the built-in default.
//!
//! The config file is JSON:
//!
//! ```json
//! {
//!   "dataDir": "/home/me/.cadence",
//!   "scheduler": { "initialDifficulty": 5.5 }
//! }
//! ```

use std::path::{Path, PathBuf};

use cadence_core::{ConfigError, Scheduler, SchedulerConfig};
use directories::ProjectDirs;
use serde::Deserialize;

/// Overrides the database directory
pub const DATA_DIR_ENV: &str = "CADENCE_DATA_DIR";

/// Overrides the config file location
pub const CONFIG_ENV: &str = "CADENCE_CONFIG";

/// Database file name inside the data directory
pub const DB_FILE_NAME: &str = "cadence.db";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid scheduler configuration: {0}")]
    Scheduler(#[from] ConfigError),
}

/// On-disk config file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl FileConfig {
    /// Load and parse a config file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Database path; `None` means the platform default
    pub db_path: Option<PathBuf>,
    pub scheduler: Scheduler,
    /// Config file that was read, if any
    pub config_path: Option<PathBuf>,
}

/// Platform default config file (`<config dir>/config.json`)
fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "cadence", "cadence").map(|dirs| dirs.config_dir().join("config.json"))
}

impl Settings {
    /// Resolve settings from flags and the process environment
    pub fn resolve(
        data_dir: Option<PathBuf>,
        config: Option<PathBuf>,
    ) -> Result<Self, SettingsError> {
        Self::resolve_with(data_dir, config, |key| std::env::var(key).ok(), default_config_path())
    }

    /// Resolve settings with an explicit environment lookup
    ///
    /// An explicitly named config file must exist; the fallback location is
    /// only read when present.
    pub fn resolve_with<F>(
        data_dir: Option<PathBuf>,
        config: Option<PathBuf>,
        env: F,
        fallback_config: Option<PathBuf>,
    ) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let explicit_config = config.or_else(|| non_empty(CONFIG_ENV).map(PathBuf::from));
        let config_path = match explicit_config {
            Some(path) => Some(path),
            None => fallback_config.filter(|p| p.is_file()),
        };

        let file = match &config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let data_dir = data_dir
            .or_else(|| non_empty(DATA_DIR_ENV).map(PathBuf::from))
            .or(file.data_dir);

        let scheduler = Scheduler::new(file.scheduler)?;

        if let Some(path) = &config_path {
            tracing::debug!(path = %path.display(), "Loaded config file");
        }

        Ok(Self {
            db_path: data_dir.map(|dir| dir.join(DB_FILE_NAME)),
            scheduler,
            config_path,
        })
    }
}
