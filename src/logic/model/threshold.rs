//! Anomaly Threshold
//!
//! Decision threshold of the reconstruction stage, fixed at training time.
//! Zero is a valid configured value; only an unreadable file means "absent".

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::artifacts::{read_json, ArtifactError};

/// Threshold on mean squared reconstruction error
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub threshold: f64,
}

/// Accepted on-disk shapes
#[derive(Deserialize)]
#[serde(untagged)]
enum ThresholdFile {
    Wrapped { threshold: f64 },
    Bare(f64),
    /// 1-element array, as a saved numpy scalar often ends up
    Array([f64; 1]),
}

impl ThresholdConfig {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let threshold = match read_json::<ThresholdFile>(path)? {
            ThresholdFile::Wrapped { threshold } | ThresholdFile::Bare(threshold) => threshold,
            ThresholdFile::Array([threshold]) => threshold,
        };

        if !threshold.is_finite() {
            return Err(ArtifactError::invalid(path, "threshold is not a finite number"));
        }

        Ok(Self { threshold })
    }

    /// Strictly greater than the threshold is anomalous
    pub fn is_anomaly(&self, error: f64) -> bool {
        error > self.threshold
    }
}
