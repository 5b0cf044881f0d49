//! Cascade Types - typed intermediate and final results

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{BENIGN_LABEL, UNKNOWN_LABEL};
use crate::logic::model::InferenceError;

/// Which stage produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classifier,
    Reconstruction,
}

/// Result of one stage for one flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub is_anomaly: bool,
    pub stage: Stage,
    /// Only set by the reconstruction stage
    pub reconstruction_error: Option<f64>,
}

impl Detection {
    /// Stage-1 detection: anything not labelled benign is an anomaly
    pub fn classified(label: impl Into<String>) -> Self {
        let label = label.into();
        let is_anomaly = !label.eq_ignore_ascii_case(BENIGN_LABEL);
        Self {
            label,
            is_anomaly,
            stage: Stage::Classifier,
            reconstruction_error: None,
        }
    }

    /// Stage-2 detection: flags anomalies but never names the class
    pub fn reconstructed(error: f64, is_anomaly: bool) -> Self {
        let label = if is_anomaly { UNKNOWN_LABEL } else { BENIGN_LABEL };
        Self {
            label: label.to_string(),
            is_anomaly,
            stage: Stage::Reconstruction,
            reconstruction_error: Some(error),
        }
    }
}

/// Outcome of one stage: no result, or a benign / anomalous detection
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    NoResult,
    Benign(Detection),
    Anomalous(Detection),
}

impl From<Detection> for StageOutcome {
    fn from(detection: Detection) -> Self {
        if detection.is_anomaly {
            StageOutcome::Anomalous(detection)
        } else {
            StageOutcome::Benign(detection)
        }
    }
}

/// One emitted record per flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(rename = "iface")]
    pub interface_name: String,
    pub label: String,
    pub is_anomaly: bool,
}

impl Verdict {
    pub fn new(interface_name: impl Into<String>, detection: Detection) -> Self {
        Self {
            interface_name: interface_name.into(),
            label: detection.label,
            is_anomaly: detection.is_anomaly,
        }
    }
}

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("no detection stage produced a result")]
    NoVerdict,

    #[error("classifier stage failed: {0}")]
    Classifier(#[source] InferenceError),

    #[error("reconstruction stage failed: {0}")]
    Reconstruction(#[source] InferenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_label_comparison_ignores_case() {
        assert!(!Detection::classified("BENIGN").is_anomaly);
        assert!(!Detection::classified("Benign").is_anomaly);
        assert!(Detection::classified("DDoS").is_anomaly);
        assert!(Detection::classified("0").is_anomaly);
    }

    #[test]
    fn test_reconstructed_labels() {
        let anomalous = Detection::reconstructed(0.9, true);
        assert_eq!(anomalous.label, "unknown");
        assert_eq!(anomalous.stage, Stage::Reconstruction);

        let benign = Detection::reconstructed(0.1, false);
        assert_eq!(benign.label, "benign");
        assert!(matches!(StageOutcome::from(benign), StageOutcome::Benign(_)));
    }

    #[test]
    fn test_verdict_wire_format() {
        let verdict = Verdict::new("eth0", Detection::classified("PortScan"));
        let line = serde_json::to_string(&verdict).unwrap();

        assert_eq!(line, r#"{"iface":"eth0","label":"PortScan","is_anomaly":true}"#);
    }
}
