//! Service and training configuration.
//!
//! Precedence, lowest first: built-in defaults, TOML file, `HEARTGUARD_*`
//! environment variables, command-line flags (applied by the binaries).
//! Invalid environment values are ignored with a warning.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::application::TrainingOptions;
use crate::server::DEFAULT_MAX_CONNECTIONS;

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "HEARTGUARD_CONFIG";

/// Default request body limit (64 KiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse an override, warning (and keeping the current value) when invalid.
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring invalid environment override");
            None
        }
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring invalid environment override");
            None
        }
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Prediction server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Socket address to listen on
    pub bind_addr: String,
    /// Fitted pipeline artifact to serve
    pub artifact_path: PathBuf,
    /// Also return the positive-class probability
    pub include_probability: bool,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// Connections served at once; extra clients wait
    pub max_connections: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            artifact_path: PathBuf::from("models/heart_model.json"),
            include_probability: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl ServiceConfig {
    /// Load from a TOML file; missing keys take their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    /// Defaults or `path`, then the process environment.
    ///
    /// # Errors
    /// Returns error if a config file is given but unusable.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        cfg.apply_env(process_env);
        Ok(cfg)
    }

    /// Apply `HEARTGUARD_*` overrides from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HEARTGUARD_BIND_ADDR") {
            self.bind_addr = v.trim().to_string();
        }
        if let Some(v) = lookup("HEARTGUARD_ARTIFACT_PATH") {
            self.artifact_path = PathBuf::from(v.trim());
        }
        if let Some(v) = parse_flag(&lookup, "HEARTGUARD_INCLUDE_PROBABILITY") {
            self.include_probability = v;
        }
        if let Some(v) = parse_var::<usize>(&lookup, "HEARTGUARD_MAX_BODY_BYTES") {
            if v > 0 {
                self.max_body_bytes = v;
            } else {
                tracing::warn!("Ignoring zero HEARTGUARD_MAX_BODY_BYTES");
            }
        }
        if let Some(v) = parse_var::<usize>(&lookup, "HEARTGUARD_MAX_CONNECTIONS") {
            if v > 0 {
                self.max_connections = v;
            } else {
                tracing::warn!("Ignoring zero HEARTGUARD_MAX_CONNECTIONS");
            }
        }
    }
}

/// Offline training settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Labeled CSV dataset
    pub data_path: PathBuf,
    pub label_column: String,
    /// Where the fitted artifact is written
    pub artifact_path: PathBuf,
    /// Root directory of the experiment tracker
    pub tracking_dir: PathBuf,
    pub experiment_name: String,
    pub test_fraction: f64,
    pub seed: u64,
    pub max_iterations: usize,
    pub regularization_strength: f64,
    pub learning_rate: f64,
    pub tolerance: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let options = TrainingOptions::default();
        Self {
            data_path: PathBuf::from("data/raw/heart.csv"),
            label_column: "target".to_string(),
            artifact_path: PathBuf::from("models/heart_model.json"),
            tracking_dir: PathBuf::from("mlruns"),
            experiment_name: "heart_disease_prediction".to_string(),
            test_fraction: options.test_fraction,
            seed: options.seed,
            max_iterations: options.max_iterations,
            regularization_strength: options.regularization_strength,
            learning_rate: options.learning_rate,
            tolerance: options.tolerance,
        }
    }
}

impl TrainingConfig {
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    /// # Errors
    /// Returns error if a config file is given but unusable.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        cfg.apply_env(process_env);
        Ok(cfg)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HEARTGUARD_DATA_PATH") {
            self.data_path = PathBuf::from(v.trim());
        }
        if let Some(v) = lookup("HEARTGUARD_LABEL_COLUMN") {
            self.label_column = v.trim().to_string();
        }
        if let Some(v) = lookup("HEARTGUARD_ARTIFACT_PATH") {
            self.artifact_path = PathBuf::from(v.trim());
        }
        if let Some(v) = lookup("HEARTGUARD_TRACKING_DIR") {
            self.tracking_dir = PathBuf::from(v.trim());
        }
        if let Some(v) = lookup("HEARTGUARD_EXPERIMENT_NAME") {
            self.experiment_name = v.trim().to_string();
        }
        if let Some(v) = parse_var(&lookup, "HEARTGUARD_TEST_FRACTION") {
            self.test_fraction = v;
        }
        if let Some(v) = parse_var(&lookup, "HEARTGUARD_SEED") {
            self.seed = v;
        }
        if let Some(v) = parse_var(&lookup, "HEARTGUARD_MAX_ITERATIONS") {
            self.max_iterations = v;
        }
        if let Some(v) = parse_var(&lookup, "HEARTGUARD_REGULARIZATION_STRENGTH") {
            self.regularization_strength = v;
        }
        if let Some(v) = parse_var(&lookup, "HEARTGUARD_LEARNING_RATE") {
            self.learning_rate = v;
        }
        if let Some(v) = parse_var(&lookup, "HEARTGUARD_TOLERANCE") {
            self.tolerance = v;
        }
    }

    /// Split and optimizer settings for the training service.
    #[must_use]
    pub fn options(&self) -> TrainingOptions {
        TrainingOptions {
            test_fraction: self.test_fraction,
            seed: self.seed,
            max_iterations: self.max_iterations,
            regularization_strength: self.regularization_strength,
            learning_rate: self.learning_rate,
            tolerance: self.tolerance,
        }
    }
}
