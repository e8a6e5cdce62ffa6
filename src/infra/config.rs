//! Configuration loading from TOML files
//!
//! The binary selects the file via `--config <path>`, then the CONFIG_FILE
//! environment variable, then `config/dev.toml`.
//!
//! Every section is optional. Thresholds read here are handed to the
//! checkers as explicit arguments; the checkers never see this struct.

use crate::services::duration::DEFAULT_MAX_HOURS;
use crate::services::transfer_gap::DEFAULT_MAX_GAP_MINUTES;
use crate::services::validator::Thresholds;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    /// Maximum unrefrigerated transfer between stations (minutes)
    #[serde(default = "default_max_gap_minutes")]
    pub max_gap_minutes: u32,
    /// Maximum first-to-last event span (hours)
    #[serde(default = "default_max_hours")]
    pub max_hours: u32,
}

fn default_max_gap_minutes() -> u32 {
    DEFAULT_MAX_GAP_MINUTES
}

fn default_max_hours() -> u32 {
    DEFAULT_MAX_HOURS
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self { max_gap_minutes: default_max_gap_minutes(), max_hours: default_max_hours() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// JSONL record store path
    #[serde(default = "default_source_path")]
    pub path: String,
}

fn default_source_path() -> String {
    "records.jsonl".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { path: default_source_path() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Write JSONL reports
    #[serde(default = "default_report_enabled")]
    pub enabled: bool,
    /// File path for report egress (JSONL format)
    #[serde(default = "default_report_file")]
    pub file: String,
}

fn default_report_enabled() -> bool {
    true
}

fn default_report_file() -> String {
    "reports.jsonl".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { enabled: default_report_enabled(), file: default_report_file() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Shipments validated at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: default_max_concurrency() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    max_gap_minutes: u32,
    max_hours: u32,
    source_path: String,
    report_enabled: bool,
    report_file: String,
    max_concurrency: usize,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        Self {
            max_gap_minutes: toml_config.thresholds.max_gap_minutes,
            max_hours: toml_config.thresholds.max_hours,
            source_path: toml_config.source.path,
            report_enabled: toml_config.report.enabled,
            report_file: toml_config.report.file,
            max_concurrency: toml_config.batch.max_concurrency,
            config_file: config_file.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration from a path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    /// Thresholds to pass into each check call
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(self.max_gap_minutes, self.max_hours)
    }

    pub fn max_gap_minutes(&self) -> u32 {
        self.max_gap_minutes
    }

    pub fn max_hours(&self) -> u32 {
        self.max_hours
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn report_enabled(&self) -> bool {
        self.report_enabled
    }

    pub fn report_file(&self) -> &str {
        &self.report_file
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    pub fn with_max_gap_minutes(mut self, minutes: u32) -> Self {
        self.max_gap_minutes = minutes;
        self
    }

    pub fn with_max_hours(mut self, hours: u32) -> Self {
        self.max_hours = hours;
        self
    }

    pub fn with_source_path(mut self, path: &str) -> Self {
        self.source_path = path.to_string();
        self
    }

    pub fn with_report_file(mut self, file: &str) -> Self {
        self.report_file = file.to_string();
        self
    }

    pub fn without_report(mut self) -> Self {
        self.report_enabled = false;
        self
    }
}
