//! File tracker adapter: Implementation of ExperimentTracker.
//!
//! Each run gets its own directory:
//!
//! ```text
//! <root>/<experiment>/<run_id>/
//!     run.json         run metadata
//!     metrics.jsonl    one {"name","value","timestamp"} object per line
//!     params.jsonl     one {"name","value","timestamp"} object per line
//!     artifacts/       copies of stored files
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::ports::{ExperimentTracker, TrackerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunMetadata {
    run_id: String,
    experiment: String,
    started_at: DateTime<Utc>,
}

/// One line of `metrics.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ParamEntry<'a> {
    name: &'a str,
    value: &'a str,
    timestamp: DateTime<Utc>,
}

/// Generate a sortable run identifier: UTC timestamp plus random suffix.
fn new_run_id() -> String {
    let mut rng = ChaCha20Rng::from_entropy();
    let suffix: u32 = rng.gen();
    format!("{}-{suffix:08x}", Utc::now().format("%Y%m%dT%H%M%S"))
}

/// Experiment tracker writing JSON lines under a local directory.
#[derive(Debug, Clone)]
pub struct FileTracker {
    run_id: String,
    run_dir: PathBuf,
}

impl FileTracker {
    /// Start a new run of `experiment` under `root`.
    ///
    /// # Errors
    /// Returns error if the run directory cannot be created.
    pub fn start_run(root: &Path, experiment: &str) -> Result<Self, TrackerError> {
        let run_id = new_run_id();
        let run_dir = root.join(experiment).join(&run_id);
        fs::create_dir_all(run_dir.join("artifacts"))?;

        let metadata = RunMetadata {
            run_id: run_id.clone(),
            experiment: experiment.to_string(),
            started_at: Utc::now(),
        };
        fs::write(run_dir.join("run.json"), serde_json::to_vec_pretty(&metadata)?)?;

        tracing::info!("Started tracking run {} in {:?}", run_id, run_dir);
        Ok(Self { run_id, run_dir })
    }

    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Read back every metric logged in this run.
    ///
    /// # Errors
    /// Returns error if the metrics file cannot be read or parsed.
    pub fn metrics(&self) -> Result<Vec<MetricEntry>, TrackerError> {
        let path = self.run_dir.join("metrics.jsonl");
        if !path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(path)?
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(TrackerError::from))
            .collect()
    }

    fn append_line(&self, file: &str, line: &[u8]) -> Result<(), TrackerError> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.run_dir.join(file))?;
        f.write_all(line)?;
        f.write_all(b"\n")?;
        Ok(())
    }
}

impl ExperimentTracker for FileTracker {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn log_metric(&self, name: &str, value: f64) -> Result<(), TrackerError> {
        if !value.is_finite() {
            return Err(TrackerError::InvalidMetric {
                name: name.to_string(),
                value,
            });
        }

        let entry = MetricEntry {
            name: name.to_string(),
            value,
            timestamp: Utc::now(),
        };
        self.append_line("metrics.jsonl", &serde_json::to_vec(&entry)?)?;
        tracing::debug!("run {}: {} = {:.6}", self.run_id, name, value);
        Ok(())
    }

    fn log_param(&self, name: &str, value: &str) -> Result<(), TrackerError> {
        let entry = ParamEntry {
            name,
            value,
            timestamp: Utc::now(),
        };
        self.append_line("params.jsonl", &serde_json::to_vec(&entry)?)
    }

    fn store_artifact(&self, name: &str, path: &Path) -> Result<(), TrackerError> {
        let target = self.run_dir.join("artifacts").join(name);
        fs::copy(path, &target)?;
        tracing::debug!("run {}: stored artifact {:?}", self.run_id, target);
        Ok(())
    }
}
