//! Configuration handling for the mmbind CLI
//!
//! Supports loading configuration from mmbind.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use mmbind_core::{MapOptions, NativeBridge, Preset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub align: AlignConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Worker threads, one aligner each
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Reads handed to the engine per call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Options struct overrides, applied on top of the preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignConfig {
    #[serde(default = "default_preset", skip_serializing_if = "Option::is_none")]
    pub preset: Option<Preset>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch_score: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_open: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_extend: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_n: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_chain_score: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_dp_max: Option<i32>,

    /// Flag bits OR-ed into the engine's flags
    #[serde(default)]
    pub extra_flags: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_batch_size() -> usize { 500 }
fn default_preset() -> Option<Preset> { Some(Preset::MapOnt) }
fn default_format() -> OutputFormat { OutputFormat::Tsv }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { threads: default_threads(), batch_size: default_batch_size() }
    }
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            bandwidth: None,
            match_score: None,
            mismatch_score: None,
            gap_open: None,
            gap_extend: None,
            best_n: None,
            min_chain_score: None,
            min_dp_max: None,
            extra_flags: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { format: default_format() }
    }
}

impl AlignConfig {
    /// Write the configured overrides into an engine-created options struct.
    pub fn apply<B: NativeBridge>(&self, opts: &mut MapOptions<'_, B>) {
        if let Some(v) = self.bandwidth { opts.set_bandwidth(v); }
        if let Some(v) = self.match_score { opts.set_match_score(v); }
        if let Some(v) = self.mismatch_score { opts.set_mismatch_score(v); }
        if let Some(v) = self.gap_open { opts.set_gap_open(v); }
        if let Some(v) = self.gap_extend { opts.set_gap_extend(v); }
        if let Some(v) = self.best_n { opts.set_best_n(v); }
        if let Some(v) = self.min_chain_score { opts.set_min_chain_score(v); }
        if let Some(v) = self.min_dp_max { opts.set_min_dp_max(v); }
        if self.extra_flags != 0 {
            opts.set_flag(self.extra_flags);
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from("mmbind.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: mmbind.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.threads == 0 {
            return Err(crate::error::CliError::config("threads must be at least 1").into());
        }
        if self.general.batch_size == 0 {
            return Err(crate::error::CliError::config("batch_size must be at least 1").into());
        }
        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default configuration")
    }
}
