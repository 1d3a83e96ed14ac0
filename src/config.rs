//! TOML configuration.
//!
//! ```toml
//! [storage]
//! root = "./log/settings_standard"
//!
//! [ingest]
//! window_days = 14
//! lock = true
//! ```
//!
//! `raw_dir`, `series_dir` and `reports_dir` default to `raw/`, `repos/`
//! and `analytics/` under `storage.root`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub raw_dir: Option<PathBuf>,
    #[serde(default)]
    pub series_dir: Option<PathBuf>,
    #[serde(default)]
    pub reports_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Directory of raw `YYYY-MM-DD.csv` snapshots.
    pub fn raw_dir(&self) -> PathBuf {
        self.raw_dir
            .clone()
            .unwrap_or_else(|| self.root.join("raw"))
    }

    /// Directory holding one subdirectory of series files per entity.
    pub fn series_dir(&self) -> PathBuf {
        self.series_dir
            .clone()
            .unwrap_or_else(|| self.root.join("repos"))
    }

    /// Directory of per-date diff reports.
    pub fn reports_dir(&self) -> PathBuf {
        self.reports_dir
            .clone()
            .unwrap_or_else(|| self.root.join("analytics"))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join("ingest.lock")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Length of the trailing window covered by daily breakdowns.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Hold an exclusive lock on the storage root while ingesting.
    #[serde(default = "default_lock")]
    pub lock: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            lock: default_lock(),
        }
    }
}

/// Upper bound for `ingest.window_days`.
pub const MAX_WINDOW_DAYS: u32 = 366;

fn default_window_days() -> u32 {
    14
}
fn default_lock() -> bool {
    true
}

impl Config {
    /// Defaults for a storage root, used when no config file is present.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                root: root.into(),
                raw_dir: None,
                series_dir: None,
                reports_dir: None,
            },
            ingest: IngestConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.ingest.window_days == 0 {
            anyhow::bail!("ingest.window_days must be > 0");
        }
        if self.ingest.window_days > MAX_WINDOW_DAYS {
            anyhow::bail!("ingest.window_days must be <= {}", MAX_WINDOW_DAYS);
        }
        if self.storage.root.as_os_str().is_empty() {
            anyhow::bail!("storage.root must not be empty");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Resolve the effective configuration for the CLI.
///
/// `data_dir` overrides `storage.root`. When it is given and the config
/// file does not exist, defaults are used instead of failing.
pub fn resolve(path: &Path, data_dir: Option<&Path>) -> Result<Config> {
    let config = match data_dir {
        Some(dir) if !path.exists() => Config::for_root(dir),
        Some(dir) => {
            let mut config = load_config(path)?;
            config.storage.root = dir.to_path_buf();
            config
        }
        None => load_config(path)?,
    };
    config.validate()?;
    Ok(config)
}
