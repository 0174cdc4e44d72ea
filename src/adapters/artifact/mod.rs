//! JSON artifact adapter: Implementation of ArtifactStore.
//!
//! The artifact is a single JSON file:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "created_at": "2026-01-01T00:00:00Z",
//!   "sha256": "<hex digest of the parameters text>",
//!   "parameters": { "schema_version": 1, "feature_order": [...], ... }
//! }
//! ```
//!
//! The digest covers the exact bytes of the `parameters` value, so any edit
//! to the parameters (including a reordered `feature_order`) is caught before
//! the parameters are parsed. The parameters are then checked against the
//! compiled feature schema.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};

use crate::domain::{FittedPipelineParameters, ParametersRepr};
use crate::ports::{ArtifactError, ArtifactStore};

/// Envelope layout version written by this adapter.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    format_version: u32,
    created_at: DateTime<Utc>,
    sha256: String,
    parameters: Box<RawValue>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// File-backed artifact store using a checksummed JSON envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArtifactStore;

impl JsonArtifactStore {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactStore for JsonArtifactStore {
    fn save(&self, params: &FittedPipelineParameters, path: &Path) -> Result<(), ArtifactError> {
        let payload = serde_json::to_string(params)
            .map_err(|e| ArtifactError::Malformed(format!("Failed to serialize parameters: {e}")))?;
        let sha256 = sha256_hex(payload.as_bytes());
        let parameters = RawValue::from_string(payload)
            .map_err(|e| ArtifactError::Malformed(e.to_string()))?;

        let envelope = ArtifactEnvelope {
            format_version: ARTIFACT_FORMAT_VERSION,
            created_at: Utc::now(),
            sha256,
            parameters,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| ArtifactError::Malformed(format!("Failed to serialize artifact: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a truncated artifact behind.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, path)?;

        tracing::info!(
            "Saved pipeline artifact to {:?} (sha256={})",
            path,
            envelope.sha256
        );
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<FittedPipelineParameters, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.display().to_string()));
        }

        let content = fs::read(path)?;
        let envelope: ArtifactEnvelope = serde_json::from_slice(&content)
            .map_err(|e| ArtifactError::Malformed(format!("Invalid artifact envelope: {e}")))?;

        if envelope.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedFormat {
                expected: ARTIFACT_FORMAT_VERSION,
                found: envelope.format_version,
            });
        }

        let payload = envelope.parameters.get();
        let computed = sha256_hex(payload.as_bytes());
        if !computed.eq_ignore_ascii_case(envelope.sha256.trim()) {
            return Err(ArtifactError::ChecksumMismatch {
                expected: envelope.sha256,
                computed,
            });
        }

        let repr: ParametersRepr = serde_json::from_str(payload)
            .map_err(|e| ArtifactError::Malformed(format!("Invalid parameters: {e}")))?;
        let params = FittedPipelineParameters::try_from(repr)?;

        tracing::info!(
            "Loaded pipeline artifact from {:?} (schema_version={}, created_at={}, n_features={})",
            path,
            params.schema_version(),
            envelope.created_at,
            params.feature_order().len()
        );

        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preprocess::transform;
    use crate::domain::{classifier, ParameterError, PatientRecord};
    use tempfile::tempdir;

    fn fixture_records() -> Vec<PatientRecord> {
        let base = PatientRecord::reference();
        vec![
            base,
            PatientRecord {
                age: 41.0,
                sex: 0,
                cp: 1,
                trestbps: 130.0,
                chol: 204.0,
                thalach: 172.0,
                oldpeak: 1.4,
                slope: 2,
                thal: 2,
                ..base
            },
            PatientRecord {
                age: 67.0,
                cp: 0,
                chol: 286.0,
                exang: 1,
                oldpeak: 1.5,
                ca: 3.0,
                ..base
            },
        ]
    }

    fn rewrite_parameters(path: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
        let text = fs::read_to_string(path).expect("read artifact");
        let mut envelope: serde_json::Value = serde_json::from_str(&text).expect("parse");
        edit(&mut envelope["parameters"]);
        fs::write(path, serde_json::to_vec(&envelope).expect("serialize")).expect("write");
    }

    #[test]
    fn test_save_load_reproduces_predictions() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("models").join("heart_model.json");
        let store = JsonArtifactStore::new();
        let params = FittedPipelineParameters::fixture();

        store.save(&params, &path).expect("Should save");
        let loaded = store.load(&path).expect("Should load");
        assert_eq!(loaded, params);

        for record in fixture_records() {
            let before = classifier::predict(&transform(&record, &params), &params)
                .expect("predict");
            let after = classifier::predict(&transform(&record, &loaded), &loaded)
                .expect("predict");
            assert_eq!(before, after);
        }
    }

    #[test]
    fn test_missing_artifact() {
        let temp = tempdir().expect("tempdir");
        let err = JsonArtifactStore::new()
            .load(&temp.path().join("absent.json"))
            .expect_err("must fail");
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn test_garbage_artifact() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("model.json");
        fs::write(&path, b"not json").expect("write");

        let err = JsonArtifactStore::new().load(&path).expect_err("must fail");
        assert!(matches!(err, ArtifactError::Malformed(_)));
    }

    #[test]
    fn test_tampered_parameters_fail_checksum() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("model.json");
        let store = JsonArtifactStore::new();
        store
            .save(&FittedPipelineParameters::fixture(), &path)
            .expect("save");

        rewrite_parameters(&path, |params| params["bias"] = serde_json::json!(3.0));

        let err = store.load(&path).expect_err("must fail");
        assert!(matches!(err, ArtifactError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_reordered_columns_rejected_even_with_valid_checksum() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("model.json");
        let store = JsonArtifactStore::new();
        store
            .save(&FittedPipelineParameters::fixture(), &path)
            .expect("save");

        // Re-sign the edited payload so only the column check can catch it.
        let text = fs::read_to_string(&path).expect("read");
        let mut envelope: serde_json::Value = serde_json::from_str(&text).expect("parse");
        let order = envelope["parameters"]["feature_order"]
            .as_array_mut()
            .expect("array");
        order.swap(1, 2);
        let payload = serde_json::to_string(&envelope["parameters"]).expect("serialize");
        envelope["sha256"] = serde_json::json!(sha256_hex(payload.as_bytes()));
        let rewritten = format!(
            r#"{{"format_version":1,"created_at":{},"sha256":{},"parameters":{}}}"#,
            envelope["created_at"], envelope["sha256"], payload
        );
        fs::write(&path, rewritten).expect("write");

        let err = store.load(&path).expect_err("must fail");
        assert!(matches!(
            err,
            ArtifactError::Parameters(ParameterError::ColumnOrderMismatch { .. })
        ));
    }

    #[test]
    fn test_unsupported_format_version() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("model.json");
        let store = JsonArtifactStore::new();
        store
            .save(&FittedPipelineParameters::fixture(), &path)
            .expect("save");

        let text = fs::read_to_string(&path).expect("read");
        fs::write(
            &path,
            text.replacen("\"format_version\": 1", "\"format_version\": 9", 1),
        )
        .expect("write");

        let err = store.load(&path).expect_err("must fail");
        assert!(matches!(
            err,
            ArtifactError::UnsupportedFormat { found: 9, .. }
        ));
    }
}
