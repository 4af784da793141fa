//! Scanner configuration.
//!
//! Loaded from a YAML file with `${VAR}` and `${VAR:-default}` substitution,
//! then overridden by command-line arguments.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fmrc_inventory::InventoryConfig;
use serde::{Deserialize, Serialize};

/// Suffixes scanned when neither the config nor the definition names any.
pub const DEFAULT_SUFFIXES: &[&str] = &[".json", ".yaml", ".yml"];

// ============================================================================
// Configuration file
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Collection name used in reports and derived definitions.
    pub name: String,

    /// Directory holding run summaries; walked recursively.
    pub data_dir: PathBuf,

    /// Expected-inventory definition (XML).
    #[serde(default)]
    pub definition: Option<PathBuf>,

    /// File name suffixes to pick up. A definition's `suffixFilter`
    /// replaces these.
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,

    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `json`, `yaml` or `text`.
    #[serde(default = "default_format")]
    pub format: String,

    /// Report destination; stdout when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Where to write a definition derived from the scanned runs.
    #[serde(default)]
    pub derived_definition: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            path: None,
            derived_definition: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

fn default_suffixes() -> Vec<String> {
    DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

fn default_format() -> String {
    "json".to_string()
}

impl ScanConfig {
    /// A configuration for `data_dir` with every other setting at its default.
    pub fn for_dir(name: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            data_dir: data_dir.into(),
            definition: None,
            suffixes: default_suffixes(),
            inventory: InventoryConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load and validate a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read scan config from {:?}", path.as_ref()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid scan config {:?}", path.as_ref()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: ScanConfig =
            serde_yaml::from_str(&expanded).context("Failed to parse scan config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.name.is_empty(), "Collection name cannot be empty");
        anyhow::ensure!(
            !self.data_dir.as_os_str().is_empty(),
            "Data directory cannot be empty"
        );
        anyhow::ensure!(
            self.suffixes.iter().all(|s| !s.is_empty()),
            "File suffixes cannot be empty strings"
        );

        let valid_formats = ["json", "yaml", "text"];
        anyhow::ensure!(
            valid_formats.contains(&self.output.format.as_str()),
            "Invalid output format: {}. Must be one of: {:?}",
            self.output.format,
            valid_formats
        );

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        anyhow::ensure!(
            valid_levels.contains(&self.logging.level.as_str()),
            "Invalid log level: {}. Must be one of: {:?}",
            self.logging.level,
            valid_levels
        );

        let valid_log_formats = ["json", "pretty"];
        anyhow::ensure!(
            valid_log_formats.contains(&self.logging.format.as_str()),
            "Invalid log format: {}. Must be one of: {:?}",
            self.logging.format,
            valid_log_formats
        );
        Ok(())
    }
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` references.
fn expand_env_vars(content: &str) -> Result<String> {
    shellexpand::env(content)
        .map(|expanded| expanded.into_owned())
        .map_err(|e| anyhow::anyhow!("Environment variable {} not set: {}", e.var_name, e.cause))
}
