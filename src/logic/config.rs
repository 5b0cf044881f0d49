//! Detector Configuration
//!
//! Precedence: CLI flag > environment variable > TOML file > default.
//!
//! ```toml
//! [models]
//! dir = "/opt/sentinel/models"
//!
//! [source]
//! meter = "sentinel-meter"
//! meter_args = ["--idle-timeout", "120"]
//!
//! [features.aliases]
//! dst_port = "Destination Port"
//!
//! [loop]
//! stats_interval = 5000
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;
use crate::logic::features::layout::is_canonical;
use crate::logic::features::FieldAliases;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// FILE SECTIONS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub models: ModelsConfig,
    pub source: SourceConfig,
    pub features: FeaturesConfig,
    #[serde(rename = "loop")]
    pub analysis: LoopConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub meter: Option<String>,
    pub meter_args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// source field name → canonical feature name
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub stats_interval: Option<u64>,
}

// ============================================================================
// OVERRIDES
// ============================================================================

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub models: Option<PathBuf>,
    pub meter: Option<String>,
}

/// Values read from `SENTINEL_*` environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub model_dir: Option<PathBuf>,
    pub meter: Option<String>,
    pub stats_interval: Option<u64>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            model_dir: constants::get_model_dir_override(),
            meter: constants::get_meter_override(),
            stats_interval: constants::get_stats_interval_override(),
        }
    }
}

/// Final settings handed to the loop
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub model_dir: PathBuf,
    pub meter: String,
    pub meter_args: Vec<String>,
    pub aliases: FieldAliases,
    pub stats_interval: u64,
}

impl DetectorConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: DetectorConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(meter) = &self.source.meter {
            if meter.trim().is_empty() {
                return Err(ConfigError::Invalid("source.meter is empty".to_string()));
            }
        }

        for (source, canonical) in &self.features.aliases {
            if !is_canonical(canonical) {
                return Err(ConfigError::Invalid(format!(
                    "alias '{}' targets unknown feature '{}'",
                    source, canonical
                )));
            }
        }

        Ok(())
    }

    pub fn resolve(self, cli: &CliOverrides, env: &EnvOverrides) -> ResolvedConfig {
        let model_dir = cli
            .models
            .clone()
            .or_else(|| env.model_dir.clone())
            .or(self.models.dir)
            .unwrap_or_else(constants::resolve_model_dir);

        let meter = cli
            .meter
            .clone()
            .or_else(|| env.meter.clone())
            .or(self.source.meter)
            .unwrap_or_else(|| constants::DEFAULT_METER.to_string());

        let stats_interval = env
            .stats_interval
            .or(self.analysis.stats_interval)
            .unwrap_or(constants::DEFAULT_STATS_INTERVAL);

        ResolvedConfig {
            model_dir,
            meter,
            meter_args: self.source.meter_args,
            aliases: FieldAliases::new(self.features.aliases),
            stats_interval,
        }
    }
}
