//! Experiment tracker port: scalar metrics and artifact blobs for a run.

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("tracker serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid metric `{name}`: {value}")]
    InvalidMetric { name: String, value: f64 },
}

/// Trait for recording a training run.
pub trait ExperimentTracker {
    /// Identifier of the active run.
    fn run_id(&self) -> &str;

    /// Record a scalar metric.
    ///
    /// # Errors
    /// Returns error if the value is not finite or cannot be recorded.
    fn log_metric(&self, name: &str, value: f64) -> Result<(), TrackerError>;

    /// Record a configuration parameter of the run.
    ///
    /// # Errors
    /// Returns error if the parameter cannot be recorded.
    fn log_param(&self, name: &str, value: &str) -> Result<(), TrackerError>;

    /// Attach a file produced by the run.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or stored.
    fn store_artifact(&self, name: &str, path: &Path) -> Result<(), TrackerError>;
}
