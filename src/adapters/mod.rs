//! Adapters layer: Concrete implementations of ports.
//!
//! - `artifact`: checksummed JSON artifact store
//! - `csv_dataset`: labeled dataset from a CSV export
//! - `file_tracker`: experiment tracking to local JSON-lines files

pub mod artifact;
pub mod csv_dataset;
pub mod file_tracker;

pub use artifact::JsonArtifactStore;
pub use csv_dataset::CsvDatasetSource;
pub use file_tracker::FileTracker;
