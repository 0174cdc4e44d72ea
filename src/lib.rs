//! # heartguard
//!
//! Heart disease risk prediction: an offline training pipeline and a small
//! HTTP service that scores clinical records with a fitted logistic model.
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Schema, validation, preprocessing and the classifier
//! - `ports`: Trait definitions for artifacts, datasets and experiment tracking
//! - `adapters`: JSON artifact store, CSV dataset reader, file-based tracker
//! - `application`: Inference, serving, training and evaluation use cases
//! - `server`: HTTP front end
//! - `config` / `telemetry`: Runtime configuration and logging setup

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod server;
pub mod telemetry;

pub use domain::{PatientRecord, PredictionResult, FEATURE_ORDER};

/// Result type for heartguard operations
pub type Result<T> = std::result::Result<T, HeartguardError>;

/// Main error type for heartguard
#[derive(Debug, thiserror::Error)]
pub enum HeartguardError {
    #[error("Invalid patient record: {0}")]
    Validation(#[from] domain::ValidationError),

    #[error("Model artifact error: {0}")]
    Artifact(#[from] ports::ArtifactError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] ports::DatasetError),

    #[error("Experiment tracking error: {0}")]
    Tracker(#[from] ports::TrackerError),

    #[error("Training failed: {0}")]
    Training(#[from] application::TrainingError),

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] application::EvaluationError),

    #[error("Request failed: {0}")]
    Serve(#[from] application::ServeError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
