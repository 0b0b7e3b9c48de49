//! Runtime configuration: CLI values, an optional TOML file, and built-in
//! defaults. A value present in the file wins over the CLI.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{DEFAULT_API_BASE, MAX_PAGE_SIZE};
use crate::ingest::Pacing;
use crate::models::Table;
use crate::retry::RetryPolicy;
use crate::store::IncrementalStore;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct FileConfig {
    pub data_dir: Option<String>,
    pub api_base_url: Option<String>,
    pub page_size: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub pacing_success_ms: Option<u64>,
    pub pacing_failure_ms: Option<u64>,

    pub retry: Option<RetryConfig>,
    pub exports: Option<ExportConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
}

/// Per-table export file overrides. Unset tables export into the data dir.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub artists: Option<String>,
    pub songs: Option<String>,
    pub contributor_credits: Option<String>,
}

impl ExportConfig {
    fn into_overrides(self) -> Vec<(Table, PathBuf)> {
        [
            (Table::Artists, self.artists),
            (Table::Songs, self.songs),
            (Table::ContributorCredits, self.contributor_credits),
        ]
        .into_iter()
        .filter_map(|(table, path)| path.map(|p| (table, PathBuf::from(p))))
        .collect()
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

/// Settings that can come from command-line flags.
#[derive(Debug, Default, Clone)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub api_base_url: Option<String>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub api_base_url: String,
    pub page_size: u32,
    pub request_timeout: Duration,
    pub pacing: Pacing,
    pub retry: RetryPolicy,
    pub export_overrides: Vec<(Table, PathBuf)>,
}

impl AppConfig {
    pub fn resolve(cli: CliConfig, file: FileConfig) -> Result<Self> {
        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or(cli.data_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let api_base_url = file
            .api_base_url
            .or(cli.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let page_size = file.page_size.or(cli.page_size).unwrap_or(MAX_PAGE_SIZE);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            bail!("page_size must be between 1 and {}, got {}", MAX_PAGE_SIZE, page_size);
        }

        let defaults = Pacing::default();
        let pacing = Pacing {
            on_success: file
                .pacing_success_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.on_success),
            on_failure: file
                .pacing_failure_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.on_failure),
        };

        let retry_file = file.retry.unwrap_or_default();
        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: retry_file.max_retries.unwrap_or(retry_defaults.max_retries),
            initial_backoff_ms: retry_file
                .initial_backoff_ms
                .unwrap_or(retry_defaults.initial_backoff_ms),
            max_backoff_ms: retry_file
                .max_backoff_ms
                .unwrap_or(retry_defaults.max_backoff_ms),
            backoff_multiplier: retry_file
                .backoff_multiplier
                .unwrap_or(retry_defaults.backoff_multiplier),
        };
        if retry.backoff_multiplier < 1.0 {
            bail!("retry.backoff_multiplier must be at least 1.0");
        }

        Ok(Self {
            data_dir,
            api_base_url,
            page_size,
            request_timeout: Duration::from_secs(
                file.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
            pacing,
            retry,
            export_overrides: file.exports.unwrap_or_default().into_overrides(),
        })
    }

    /// Resolve against `config_path` when given, CLI and defaults otherwise.
    pub fn load(cli: CliConfig, config_path: Option<&Path>) -> Result<Self> {
        let file = match config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    /// Open the store in `data_dir` with the configured export overrides.
    pub fn open_store(&self) -> Result<IncrementalStore> {
        let mut store = IncrementalStore::open(&self.data_dir)
            .with_context(|| format!("Failed to open catalog in {:?}", self.data_dir))?;
        for (table, path) in &self.export_overrides {
            store
                .set_export_path(*table, path.clone())
                .with_context(|| format!("Invalid export path for {}", table.name()))?;
        }
        Ok(store)
    }
}
