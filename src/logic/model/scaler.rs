//! Feature Scaler - input normalization fitted at training time
//!
//! Mirrors the two scikit-learn scalers the models were trained with.
//! Constant features (zero scale / zero range) pass through unscaled.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::artifacts::{read_json, ArtifactError};
use super::inference::InferenceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureScaler {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `(x - min) / (max - min)`
    MinMax { min: Vec<f64>, max: Vec<f64> },
}

impl FeatureScaler {
    pub fn dimension(&self) -> usize {
        match self {
            FeatureScaler::Standard { mean, .. } => mean.len(),
            FeatureScaler::MinMax { min, .. } => min.len(),
        }
    }

    fn check(&self) -> Result<(), String> {
        let (a, b) = match self {
            FeatureScaler::Standard { mean, scale } => (mean.len(), scale.len()),
            FeatureScaler::MinMax { min, max } => (min.len(), max.len()),
        };
        if a != b {
            return Err(format!("parameter lengths differ ({} vs {})", a, b));
        }
        if a == 0 {
            return Err("scaler has no parameters".to_string());
        }
        Ok(())
    }

    /// Load and validate a scaler for a vector of `expected_dim` values
    pub fn load(path: &Path, expected_dim: usize) -> Result<Self, ArtifactError> {
        let scaler: FeatureScaler = read_json(path)?;

        scaler.check().map_err(|reason| ArtifactError::invalid(path, reason))?;

        if scaler.dimension() != expected_dim {
            return Err(ArtifactError::invalid(
                path,
                format!("expected {} features, scaler has {}", expected_dim, scaler.dimension()),
            ));
        }

        Ok(scaler)
    }

    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>, InferenceError> {
        if values.len() != self.dimension() {
            return Err(InferenceError::DimensionMismatch {
                expected: self.dimension(),
                actual: values.len(),
            });
        }

        let scaled = match self {
            FeatureScaler::Standard { mean, scale } => values
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(&x, (&m, &s))| (x - m) / non_zero(s))
                .collect(),
            FeatureScaler::MinMax { min, max } => values
                .iter()
                .zip(min.iter().zip(max))
                .map(|(&x, (&lo, &hi))| (x - lo) / non_zero(hi - lo))
                .collect(),
        };

        Ok(scaled)
    }
}

fn non_zero(v: f64) -> f64 {
    if v == 0.0 {
        1.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_standard_transform() {
        let scaler = FeatureScaler::Standard {
            mean: vec![10.0, 0.0, 5.0],
            scale: vec![2.0, 1.0, 0.0],
        };

        let out = scaler.transform(&[14.0, -3.0, 9.0]).unwrap();
        assert_eq!(out, vec![2.0, -3.0, 4.0]);
    }

    #[test]
    fn test_min_max_transform_does_not_clamp() {
        let scaler = FeatureScaler::MinMax {
            min: vec![0.0, 10.0],
            max: vec![100.0, 10.0],
        };

        let out = scaler.transform(&[150.0, 12.0]).unwrap();
        assert_eq!(out, vec![1.5, 2.0]);
    }

    #[test]
    fn test_transform_rejects_wrong_length() {
        let scaler = FeatureScaler::Standard {
            mean: vec![0.0; 77],
            scale: vec![1.0; 77],
        };
        assert!(matches!(
            scaler.transform(&[0.0; 78]),
            Err(InferenceError::DimensionMismatch { expected: 77, actual: 78 })
        ));
    }

    #[test]
    fn test_load_checks_dimension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        fs::write(
            &path,
            r#"{"kind": "standard", "mean": [0.0, 1.0], "scale": [1.0, 1.0]}"#,
        )
        .unwrap();

        assert!(FeatureScaler::load(&path, 2).is_ok());
        assert!(matches!(
            FeatureScaler::load(&path, 78),
            Err(ArtifactError::Invalid { .. })
        ));
    }

    #[test]
    fn test_load_rejects_uneven_parameters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        fs::write(&path, r#"{"kind": "min_max", "min": [0.0], "max": [1.0, 2.0]}"#).unwrap();

        assert!(matches!(
            FeatureScaler::load(&path, 1),
            Err(ArtifactError::Invalid { .. })
        ));
    }
}
