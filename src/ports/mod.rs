//! Ports layer: Trait definitions for external collaborators.
//!
//! The inference core only needs to load parameters; training additionally
//! reads a dataset and reports to an experiment tracker. Each boundary is a
//! trait so the application layer can be exercised with in-memory doubles.

mod artifact_store;
mod dataset_source;
mod tracker;

pub use artifact_store::{ArtifactError, ArtifactStore};
pub use dataset_source::{DatasetError, DatasetSource};
pub use tracker::{ExperimentTracker, TrackerError};
