//! Offline training: dataset → fitted parameters → artifact.
//!
//! The fit reuses `preprocess::transform_values`, so training and serving
//! see identical feature vectors.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use super::evaluation::{EvaluationError, EvaluationReport};
use crate::domain::classifier::{self, sigmoid};
use crate::domain::preprocess::transform_values;
use crate::domain::schema::{CONTINUOUS_FEATURES, NUM_FEATURES};
use crate::domain::{
    ClassifierError, Feature, FittedPipelineParameters, LabeledRow, NumericFeatureVector,
    ParameterError,
};
use crate::ports::{
    ArtifactError, ArtifactStore, DatasetError, DatasetSource, ExperimentTracker, TrackerError,
};

/// Training failures.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("fitted parameters are invalid: {0}")]
    Parameters(#[from] ParameterError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("dataset has no usable rows")]
    EmptyDataset,

    #[error("class {label} has {found} rows; at least 2 are needed to split")]
    InsufficientClass { label: u8, found: usize },

    #[error("feature `{0}` has no observed values in the training split")]
    NoObservations(Feature),

    #[error("optimization diverged: {0}")]
    DegenerateFit(String),

    #[error("invalid training option `{name}`: {value}")]
    InvalidOption { name: &'static str, value: String },
}

/// Split and optimizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingOptions {
    /// Fraction of each class held out for evaluation
    pub test_fraction: f64,
    pub seed: u64,
    pub max_iterations: usize,
    /// L2 penalty on the weights (bias is not penalized)
    pub regularization_strength: f64,
    pub learning_rate: f64,
    /// Stop once the gradient norm falls below this
    pub tolerance: f64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            max_iterations: 1000,
            regularization_strength: 0.01,
            learning_rate: 0.1,
            tolerance: 1e-6,
        }
    }
}

impl TrainingOptions {
    /// # Errors
    /// Returns `TrainingError::InvalidOption` for the first out-of-range value.
    pub fn check(&self) -> Result<(), TrainingError> {
        let invalid = |name: &'static str, value: String| {
            Err(TrainingError::InvalidOption { name, value })
        };

        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return invalid("test_fraction", self.test_fraction.to_string());
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations", "0".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid("learning_rate", self.learning_rate.to_string());
        }
        if !(self.regularization_strength.is_finite() && self.regularization_strength >= 0.0) {
            return invalid(
                "regularization_strength",
                self.regularization_strength.to_string(),
            );
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return invalid("tolerance", self.tolerance.to_string());
        }
        Ok(())
    }
}

/// Imputation and scaling statistics for the continuous features.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerFit {
    pub medians: Vec<f64>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

/// Result of gradient descent.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticFit {
    pub weights: Vec<f64>,
    pub bias: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Final regularized mean log-loss
    pub loss: f64,
}

/// Summary of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub run_id: String,
    pub params: FittedPipelineParameters,
    pub report: EvaluationReport,
    pub train_rows: usize,
    pub test_rows: usize,
    pub dropped_rows: usize,
    pub iterations: usize,
    pub converged: bool,
}

/// Drop rows whose passthrough features have missing values.
///
/// Returns the kept rows and the number dropped.
#[must_use]
pub fn drop_incomplete(rows: &[LabeledRow]) -> (Vec<LabeledRow>, usize) {
    let mut kept = Vec::with_capacity(rows.len());
    let mut dropped = 0;
    for (i, row) in rows.iter().enumerate() {
        match row.missing_passthrough() {
            Some(feature) => {
                tracing::debug!(row = i + 1, feature = %feature, "Dropping incomplete row");
                dropped += 1;
            }
            None => kept.push(row.clone()),
        }
    }
    if dropped > 0 {
        tracing::warn!(dropped, "Dropped rows with missing categorical values");
    }
    (kept, dropped)
}

/// Seeded per-class split into (train, test).
///
/// Each class contributes `round(n * test_fraction)` rows to the test split,
/// clamped so both splits keep at least one row of every class. Rows keep
/// their original relative order within each split.
///
/// # Errors
/// Returns `TrainingError::InsufficientClass` if a class has fewer than two
/// rows.
pub fn stratified_split(
    rows: &[LabeledRow],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<LabeledRow>, Vec<LabeledRow>), TrainingError> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut train_idx = Vec::with_capacity(rows.len());
    let mut test_idx = Vec::new();

    for label in [0u8, 1] {
        let mut members: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.label == label)
            .map(|(i, _)| i)
            .collect();
        if members.len() < 2 {
            return Err(TrainingError::InsufficientClass {
                label,
                found: members.len(),
            });
        }

        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_fraction).round() as usize)
            .clamp(1, members.len() - 1);
        test_idx.extend_from_slice(&members[..n_test]);
        train_idx.extend_from_slice(&members[n_test..]);
    }

    train_idx.sort_unstable();
    test_idx.sort_unstable();
    let pick = |idx: &[usize]| -> Vec<LabeledRow> { idx.iter().map(|i| rows[*i].clone()).collect() };
    Ok((pick(&train_idx), pick(&test_idx)))
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Fit medians on observed values, impute, then fit mean and population std.
///
/// A column that is constant after imputation gets a standard deviation of
/// exactly zero.
///
/// # Errors
/// Returns `TrainingError::NoObservations` if a continuous column is entirely
/// missing.
pub fn fit_scaler(rows: &[LabeledRow]) -> Result<ScalerFit, TrainingError> {
    let mut fit = ScalerFit {
        medians: Vec::with_capacity(CONTINUOUS_FEATURES.len()),
        means: Vec::with_capacity(CONTINUOUS_FEATURES.len()),
        stds: Vec::with_capacity(CONTINUOUS_FEATURES.len()),
    };

    for feature in CONTINUOUS_FEATURES {
        let col = feature.column();
        let mut observed: Vec<f64> = rows.iter().filter_map(|r| r.values[col]).collect();
        if observed.is_empty() {
            return Err(TrainingError::NoObservations(feature));
        }
        observed.sort_by(f64::total_cmp);
        let median = median_of_sorted(&observed);

        let imputed: Vec<f64> = rows
            .iter()
            .map(|r| r.values[col].unwrap_or(median))
            .collect();
        let n = imputed.len() as f64;
        let mean = imputed.iter().sum::<f64>() / n;
        let std = if imputed.iter().all(|x| *x == imputed[0]) {
            0.0
        } else {
            (imputed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt()
        };

        fit.medians.push(median);
        fit.means.push(mean);
        fit.stds.push(std);
    }

    Ok(fit)
}

fn regularized_log_loss(x: &[NumericFeatureVector], y: &[u8], w: &[f64], b: f64, lambda: f64) -> f64 {
    const EPS: f64 = 1e-15;
    let n = x.len() as f64;
    let data_loss: f64 = x
        .iter()
        .zip(y)
        .map(|(row, label)| {
            let score: f64 = w.iter().zip(row.as_slice()).map(|(w, v)| w * v).sum::<f64>() + b;
            let p = sigmoid(score).clamp(EPS, 1.0 - EPS);
            if *label == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    let penalty: f64 = w.iter().map(|w| w * w).sum();
    data_loss / n + lambda / 2.0 * penalty
}

/// Full-batch gradient descent on the L2-regularized mean log-loss.
///
/// Starts from all-zero weights, so the result depends only on the data and
/// the options.
///
/// # Errors
/// Returns `TrainingError::EmptyDataset` for no rows and
/// `TrainingError::DegenerateFit` if the weights stop being finite.
pub fn fit_logistic(
    x: &[NumericFeatureVector],
    y: &[u8],
    options: &TrainingOptions,
) -> Result<LogisticFit, TrainingError> {
    if x.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }
    if x.len() != y.len() {
        return Err(TrainingError::DegenerateFit(format!(
            "{} rows but {} labels",
            x.len(),
            y.len()
        )));
    }

    let n = x.len() as f64;
    let lambda = options.regularization_strength;
    let mut weights = vec![0.0; NUM_FEATURES];
    let mut bias = 0.0;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        let mut grad_w = vec![0.0; NUM_FEATURES];
        let mut grad_b = 0.0;

        for (row, label) in x.iter().zip(y) {
            let score: f64 = weights
                .iter()
                .zip(row.as_slice())
                .map(|(w, v)| w * v)
                .sum::<f64>()
                + bias;
            let err = sigmoid(score) - f64::from(*label);
            for (g, v) in grad_w.iter_mut().zip(row.as_slice()) {
                *g += err * v;
            }
            grad_b += err;
        }

        for (g, w) in grad_w.iter_mut().zip(&weights) {
            *g = *g / n + lambda * w;
        }
        grad_b /= n;

        let norm = (grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b).sqrt();
        if !norm.is_finite() {
            return Err(TrainingError::DegenerateFit(format!(
                "gradient is not finite after {iterations} iterations"
            )));
        }
        if norm < options.tolerance {
            converged = true;
            break;
        }

        for (w, g) in weights.iter_mut().zip(&grad_w) {
            *w -= options.learning_rate * g;
        }
        bias -= options.learning_rate * grad_b;
        iterations += 1;
    }

    if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
        return Err(TrainingError::DegenerateFit(
            "weights are not finite".to_string(),
        ));
    }

    let loss = regularized_log_loss(x, y, &weights, bias, lambda);
    Ok(LogisticFit {
        weights,
        bias,
        iterations,
        converged,
        loss,
    })
}

/// Score held-out rows with fitted parameters.
///
/// # Errors
/// Returns error if a score is unusable or the metrics are undefined.
pub fn evaluate(
    params: &FittedPipelineParameters,
    rows: &[LabeledRow],
) -> Result<EvaluationReport, TrainingError> {
    let mut probabilities = Vec::with_capacity(rows.len());
    for row in rows {
        let vector = transform_values(&row.raw_values(), params);
        probabilities.push(classifier::predict(&vector, params)?.probability);
    }
    let labels: Vec<u8> = rows.iter().map(|r| r.label).collect();
    Ok(EvaluationReport::compute(&labels, &probabilities)?)
}

/// Fits, evaluates, persists and tracks a model.
pub struct TrainingService<D, A, T>
where
    D: DatasetSource,
    A: ArtifactStore,
    T: ExperimentTracker,
{
    source: D,
    store: A,
    tracker: T,
    options: TrainingOptions,
}

impl<D, A, T> TrainingService<D, A, T>
where
    D: DatasetSource,
    A: ArtifactStore,
    T: ExperimentTracker,
{
    pub fn new(source: D, store: A, tracker: T, options: TrainingOptions) -> Self {
        Self {
            source,
            store,
            tracker,
            options,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Run the full training pipeline and write the artifact to `artifact_path`.
    ///
    /// # Errors
    /// Returns error if any step fails; nothing is tracked for a failed fit.
    pub fn run(&self, artifact_path: &Path) -> Result<TrainingOutcome, TrainingError> {
        self.options.check()?;

        let dataset = self.source.load()?;
        tracing::info!(rows = dataset.len(), "Loaded training data");

        let (rows, dropped_rows) = drop_incomplete(dataset.rows());
        if rows.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }

        let (train, test) = stratified_split(&rows, self.options.test_fraction, self.options.seed)?;
        tracing::info!(
            train = train.len(),
            test = test.len(),
            seed = self.options.seed,
            "Split dataset"
        );

        let scaler = fit_scaler(&train)?;
        // Zero weights: only the scaler is used to build the design matrix.
        let scaling = FittedPipelineParameters::new(
            scaler.medians.clone(),
            scaler.means.clone(),
            scaler.stds.clone(),
            vec![0.0; NUM_FEATURES],
            0.0,
        )?;
        let x: Vec<NumericFeatureVector> = train
            .iter()
            .map(|r| transform_values(&r.raw_values(), &scaling))
            .collect();
        let y: Vec<u8> = train.iter().map(|r| r.label).collect();

        let fit = fit_logistic(&x, &y, &self.options)?;
        if !fit.converged {
            tracing::warn!(
                iterations = fit.iterations,
                "Gradient descent stopped before reaching tolerance"
            );
        }
        tracing::info!(iterations = fit.iterations, loss = fit.loss, "Fitted classifier");

        let params = FittedPipelineParameters::new(
            scaler.medians,
            scaler.means,
            scaler.stds,
            fit.weights,
            fit.bias,
        )?;
        let report = evaluate(&params, &test)?;
        tracing::info!(
            accuracy = report.accuracy,
            precision = report.precision,
            recall = report.recall,
            roc_auc = report.roc_auc,
            "Evaluated on held-out split"
        );

        self.store.save(&params, artifact_path)?;

        let outcome = TrainingOutcome {
            run_id: self.tracker.run_id().to_string(),
            params,
            report,
            train_rows: train.len(),
            test_rows: test.len(),
            dropped_rows,
            iterations: fit.iterations,
            converged: fit.converged,
        };
        self.record(&outcome, artifact_path)?;
        Ok(outcome)
    }

    fn record(&self, outcome: &TrainingOutcome, artifact_path: &Path) -> Result<(), TrainingError> {
        let o = &self.options;
        let params = [
            ("test_fraction", o.test_fraction.to_string()),
            ("seed", o.seed.to_string()),
            ("max_iterations", o.max_iterations.to_string()),
            ("regularization_strength", o.regularization_strength.to_string()),
            ("learning_rate", o.learning_rate.to_string()),
            ("tolerance", o.tolerance.to_string()),
            ("train_rows", outcome.train_rows.to_string()),
            ("test_rows", outcome.test_rows.to_string()),
            ("dropped_rows", outcome.dropped_rows.to_string()),
            ("iterations", outcome.iterations.to_string()),
        ];
        for (name, value) in &params {
            self.tracker.log_param(name, value)?;
        }
        for (name, value) in outcome.report.metrics() {
            self.tracker.log_metric(name, value)?;
        }

        let name = artifact_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("model.json");
        self.tracker.store_artifact(name, artifact_path)?;

        tracing::info!(run_id = %outcome.run_id, "Recorded training run");
        Ok(())
    }
}
