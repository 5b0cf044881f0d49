//! Artifact Layout - fixed on-disk structure of the pretrained models
//!
//! ```text
//! <root>/
//!   XGBoost/  sentinel_xgboost_multiclass.onnx, scaler.json, label_encoder.json
//!   LSTM/     lstm_scaler.json, lstm_threshold.json, lstm_autoencoder.onnx
//!   manifest.json   (optional checksums + layout stamp)
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::logic::features::layout::LayoutInfo;

pub const STAGE1_DIR: &str = "XGBoost";
pub const STAGE2_DIR: &str = "LSTM";

pub const CLASSIFIER_FILE: &str = "sentinel_xgboost_multiclass.onnx";
pub const CLASSIFIER_SCALER_FILE: &str = "scaler.json";
pub const LABEL_DECODER_FILE: &str = "label_encoder.json";

pub const RECONSTRUCTION_SCALER_FILE: &str = "lstm_scaler.json";
pub const THRESHOLD_FILE: &str = "lstm_threshold.json";
pub const RECONSTRUCTION_MODEL_FILE: &str = "lstm_autoencoder.onnx";
/// Trainable form; never loaded, only reported
pub const RECONSTRUCTION_TRAINABLE_FILE: &str = "lstm_autoencoder.pt";

pub const MANIFEST_FILE: &str = "manifest.json";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("checksum mismatch for {}", .0.display())]
    ChecksumMismatch(PathBuf),

    #[error("failed to load model {}: {reason}", .path.display())]
    Model { path: PathBuf, reason: String },
}

impl ArtifactError {
    pub fn invalid(path: &Path, reason: impl Into<String>) -> Self {
        ArtifactError::Invalid {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Read and parse a JSON artifact
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::Missing(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Resolved paths of every artifact under one root
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classifier(&self) -> PathBuf {
        self.root.join(STAGE1_DIR).join(CLASSIFIER_FILE)
    }

    pub fn classifier_scaler(&self) -> PathBuf {
        self.root.join(STAGE1_DIR).join(CLASSIFIER_SCALER_FILE)
    }

    pub fn label_decoder(&self) -> PathBuf {
        self.root.join(STAGE1_DIR).join(LABEL_DECODER_FILE)
    }

    pub fn reconstruction_scaler(&self) -> PathBuf {
        self.root.join(STAGE2_DIR).join(RECONSTRUCTION_SCALER_FILE)
    }

    pub fn threshold(&self) -> PathBuf {
        self.root.join(STAGE2_DIR).join(THRESHOLD_FILE)
    }

    pub fn reconstruction_model(&self) -> PathBuf {
        self.root.join(STAGE2_DIR).join(RECONSTRUCTION_MODEL_FILE)
    }

    pub fn reconstruction_trainable(&self) -> PathBuf {
        self.root.join(STAGE2_DIR).join(RECONSTRUCTION_TRAINABLE_FILE)
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Path relative to the root with `/` separators, as used in the manifest
    pub fn manifest_key(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

// ============================================================================
// MANIFEST
// ============================================================================

/// Optional integrity manifest shipped with the artifacts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactManifest {
    pub feature_version: Option<u8>,
    pub layout_hash: Option<u32>,
    /// Relative path → lowercase hex SHA-256
    #[serde(default)]
    pub sha256: HashMap<String, String>,
}

impl ArtifactManifest {
    /// Load the manifest if present. A broken manifest is ignored with a warning.
    pub fn load(layout: &ArtifactLayout) -> Option<Self> {
        let path = layout.manifest();
        if !path.exists() {
            return None;
        }

        match read_json::<ArtifactManifest>(&path) {
            Ok(manifest) => {
                manifest.check_layout();
                Some(manifest)
            }
            Err(e) => {
                log::warn!("Ignoring artifact manifest: {}", e);
                None
            }
        }
    }

    fn check_layout(&self) {
        let current = LayoutInfo::current();
        if let (Some(version), Some(hash)) = (self.feature_version, self.layout_hash) {
            if !current.is_compatible(version, hash) {
                log::warn!(
                    "Artifacts were built for feature layout v{} ({:08x}), this build uses v{} ({:08x})",
                    version,
                    hash,
                    current.version,
                    current.hash
                );
            }
        }
    }

    /// Verify one artifact. Files without a manifest entry pass.
    pub fn verify(&self, layout: &ArtifactLayout, path: &Path) -> Result<(), ArtifactError> {
        let Some(expected) = self.sha256.get(&layout.manifest_key(path)) else {
            return Ok(());
        };

        let actual = file_sha256(path)?;
        if actual.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(ArtifactError::ChecksumMismatch(path.to_path_buf()))
        }
    }
}

/// Hex SHA-256 of a file
pub fn file_sha256(path: &Path) -> Result<String, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_paths() {
        let layout = ArtifactLayout::new("/opt/models");
        assert_eq!(
            layout.classifier(),
            PathBuf::from("/opt/models/XGBoost/sentinel_xgboost_multiclass.onnx")
        );
        assert_eq!(
            layout.threshold(),
            PathBuf::from("/opt/models/LSTM/lstm_threshold.json")
        );
        assert_eq!(layout.manifest_key(&layout.label_decoder()), "XGBoost/label_encoder.json");
    }

    #[test]
    fn test_manifest_verify() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        fs::create_dir_all(dir.path().join(STAGE2_DIR)).unwrap();
        fs::write(layout.threshold(), "0.25").unwrap();

        let good = file_sha256(&layout.threshold()).unwrap();
        let manifest = ArtifactManifest {
            sha256: HashMap::from([("LSTM/lstm_threshold.json".to_string(), good)]),
            ..Default::default()
        };
        assert!(manifest.verify(&layout, &layout.threshold()).is_ok());

        let tampered = ArtifactManifest {
            sha256: HashMap::from([("LSTM/lstm_threshold.json".to_string(), "00".repeat(32))]),
            ..Default::default()
        };
        assert!(matches!(
            tampered.verify(&layout, &layout.threshold()),
            Err(ArtifactError::ChecksumMismatch(_))
        ));

        // No entry, no check
        assert!(tampered.verify(&layout, &layout.label_decoder()).is_ok());
    }

    #[test]
    fn test_read_json_missing() {
        let result = read_json::<f64>(Path::new("/nonexistent/threshold.json"));
        assert!(matches!(result, Err(ArtifactError::Missing(_))));
    }
}
