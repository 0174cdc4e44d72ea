//! Artifact store port: persistence of fitted pipeline parameters.

use std::path::Path;

use crate::domain::{FittedPipelineParameters, ParameterError};

/// Errors raised while saving or loading an artifact.
///
/// Any of these at startup is fatal: the service must not serve without a
/// verified model.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact not found at {0}")]
    NotFound(String),

    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact is malformed: {0}")]
    Malformed(String),

    #[error("unsupported artifact format version {found} (expected {expected})")]
    UnsupportedFormat { expected: u32, found: u32 },

    #[error("artifact checksum mismatch (expected {expected}, computed {computed})")]
    ChecksumMismatch { expected: String, computed: String },

    #[error("artifact parameters rejected: {0}")]
    Parameters(#[from] ParameterError),
}

/// Trait for model artifact persistence.
pub trait ArtifactStore: Send + Sync {
    /// Persist parameters at `path`, replacing any existing artifact.
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    fn save(&self, params: &FittedPipelineParameters, path: &Path) -> Result<(), ArtifactError>;

    /// Load and verify parameters from `path`.
    ///
    /// # Errors
    /// Returns error if the artifact is missing, corrupt, or was fit against a
    /// different feature schema.
    fn load(&self, path: &Path) -> Result<FittedPipelineParameters, ArtifactError>;
}
