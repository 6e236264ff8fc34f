//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::aggregation::{AggregationError, TimeAggregator, Unit};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default unit combination for new aggregators
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AggregatorConfig {
    /// Units from coarsest to finest, the last one indexes the counters
    #[serde(default = "default_units")]
    pub units: Vec<Unit>,
}

fn default_units() -> Vec<Unit> {
    vec![Unit::Year, Unit::Month, Unit::Hour]
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            units: default_units(),
        }
    }
}

impl AggregatorConfig {
    /// Create an empty aggregator with the configured units
    pub fn build(&self) -> Result<TimeAggregator, ConfigError> {
        Ok(TimeAggregator::new(&self.units)?)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Parse a comma separated unit list such as `year,month,hour`
pub fn parse_units(list: &str) -> Result<Vec<Unit>, ConfigError> {
    list.split(',')
        .filter(|name| !name.trim().is_empty())
        .map(|name| name.parse::<Unit>().map_err(ConfigError::InvalidUnit))
        .collect()
}

impl Config {
    /// Files `load_default` looks at, first match wins
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(3);
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("tally").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/tally/config.toml"));
        paths.push(PathBuf::from("./tally.toml"));
        paths
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Config::default().with_env_overrides()
    }

    /// Load a file, then apply environment overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        Self::load(path).map(Self::with_env_overrides)
    }

    /// First readable file from [`search_paths`](Self::search_paths), or
    /// defaults when none loads
    pub fn load_default() -> Self {
        let loaded = Self::search_paths()
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::load_with_env(&path) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!("Skipping config {:?}: {}", path, e);
                    None
                }
            });

        loaded.unwrap_or_else(|| {
            tracing::debug!("No config file found, using defaults");
            Self::from_env()
        })
    }

    fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    /// Apply `TALLY_*` overrides read through `lookup`
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(units) = lookup("TALLY_UNITS") {
            match parse_units(&units) {
                Ok(units) if !units.is_empty() => self.aggregator.units = units,
                Ok(_) => tracing::warn!("Ignoring empty TALLY_UNITS"),
                Err(e) => tracing::warn!("Ignoring TALLY_UNITS: {}", e),
            }
        }
        if let Some(level) = lookup("TALLY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("TALLY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid unit list: {0}")]
    InvalidUnit(String),

    #[error("Unusable unit combination: {0}")]
    Units(#[from] AggregationError),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Tally Configuration
#
# Environment variables override these settings:
# - TALLY_UNITS (comma separated, e.g. "year,month,hour")
# - TALLY_LOG_LEVEL
# - TALLY_LOG_FORMAT

[aggregator]
# Units for new aggregators, coarsest first. The last unit indexes the
# counters, the others group them into periods.
# Known units: year, month, week, day, yearday, weekday, hour, minute, second
units = ["year", "month", "hour"]

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
