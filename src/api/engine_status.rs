use serde::{Deserialize, Serialize};

use crate::constants::{APP_NAME, APP_VERSION};
use crate::logic::features::LayoutInfo;
use crate::logic::model::{ModelRepository, RepositoryStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub app: String,
    pub version: String,

    pub layout: LayoutInfo,
    pub models: RepositoryStatus,
    pub mode: DetectionMode,
}

/// Which part of the cascade can run with the loaded artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Classifier plus reconstruction fallback
    Cascade,
    ClassifierOnly,
    ReconstructionOnly,
    /// Every flow will be dropped
    Unavailable,
}

impl EngineStatus {
    pub fn snapshot(repository: &ModelRepository) -> Self {
        let models = repository.status();
        let mode = match (models.stage1_available, models.stage2_available) {
            (true, true) => DetectionMode::Cascade,
            (true, false) => DetectionMode::ClassifierOnly,
            (false, true) => DetectionMode::ReconstructionOnly,
            (false, false) => DetectionMode::Unavailable,
        };

        Self {
            app: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
            layout: LayoutInfo::current(),
            models,
            mode,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::{ClassifierStage, ReconstructionStage, ThresholdConfig};

    #[test]
    fn test_snapshot_of_empty_repository() {
        let status = EngineStatus::snapshot(&ModelRepository::empty());

        assert_eq!(status.mode, DetectionMode::Unavailable);
        assert_eq!(status.layout.stats_feature_count, 77);
        assert_eq!(status.layout.port_feature_count, 78);
    }

    #[test]
    fn test_snapshot_json() {
        let repo = ModelRepository::new(
            ClassifierStage::default(),
            ReconstructionStage {
                threshold: Some(ThresholdConfig::new(0.25)),
                ..Default::default()
            },
        );
        let status = EngineStatus::snapshot(&repo);
        assert_eq!(status.mode, DetectionMode::ReconstructionOnly);

        let json: serde_json::Value =
            serde_json::from_str(&status.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["mode"], "reconstruction_only");
        assert_eq!(json["models"]["threshold"], 0.25);
        assert_eq!(json["app"], "Flow Sentinel");
    }
}
