//! Model Repository - tolerant loading of every cascade artifact
//!
//! Each artifact is loaded on its own. A failure only marks that artifact
//! absent; `load()` itself never fails, so the caller can always proceed,
//! even with both stages unavailable.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::features::{PORT_FEATURE_COUNT, STATS_FEATURE_COUNT};

use super::artifacts::{ArtifactError, ArtifactLayout, ArtifactManifest};
use super::inference::{Classifier, OnnxAutoencoder, OnnxClassifier, Reconstructor};
use super::labels::LabelDecoder;
use super::scaler::FeatureScaler;
use super::threshold::ThresholdConfig;

// ============================================================================
// STAGE ARTIFACT SETS
// ============================================================================

/// Stage 1: classifier over the 78-vector
#[derive(Default)]
pub struct ClassifierStage {
    pub classifier: Option<Box<dyn Classifier>>,
    pub scaler: Option<FeatureScaler>,
    pub decoder: Option<LabelDecoder>,
}

impl ClassifierStage {
    /// Scaler and decoder are optional; only the classifier gates the stage
    pub fn is_available(&self) -> bool {
        self.classifier.is_some()
    }
}

/// Stage 2: reconstruction check over the 77-vector
#[derive(Default)]
pub struct ReconstructionStage {
    pub scaler: Option<FeatureScaler>,
    pub threshold: Option<ThresholdConfig>,
    pub model: Option<Box<dyn Reconstructor>>,
}

impl ReconstructionStage {
    /// Gated on the threshold alone
    pub fn is_available(&self) -> bool {
        self.threshold.is_some()
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// Load outcome of one artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStatus {
    pub name: String,
    pub path: Option<PathBuf>,
    pub loaded: bool,
    pub error: Option<String>,
}

/// Per-artifact availability for status reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryStatus {
    pub root: Option<PathBuf>,
    pub stage1_available: bool,
    pub stage2_available: bool,
    pub threshold: Option<f64>,
    pub artifacts: Vec<ArtifactStatus>,
    pub loaded_at: DateTime<Utc>,
}

// ============================================================================
// REPOSITORY
// ============================================================================

/// Owns every loaded artifact for the lifetime of the process.
/// Read-only after construction.
pub struct ModelRepository {
    pub stage1: ClassifierStage,
    pub stage2: ReconstructionStage,
    root: Option<PathBuf>,
    artifacts: Vec<ArtifactStatus>,
    loaded_at: DateTime<Utc>,
}

impl ModelRepository {
    /// Assemble a repository from already-built stages
    pub fn new(stage1: ClassifierStage, stage2: ReconstructionStage) -> Self {
        let artifacts = vec![
            in_memory("classifier", stage1.classifier.is_some()),
            in_memory("classifier_scaler", stage1.scaler.is_some()),
            in_memory("label_decoder", stage1.decoder.is_some()),
            in_memory("reconstruction_scaler", stage2.scaler.is_some()),
            in_memory("threshold", stage2.threshold.is_some()),
            in_memory("reconstruction_model", stage2.model.is_some()),
        ];

        Self {
            stage1,
            stage2,
            root: None,
            artifacts,
            loaded_at: Utc::now(),
        }
    }

    /// Repository with nothing loaded; both stages unavailable
    pub fn empty() -> Self {
        Self::new(ClassifierStage::default(), ReconstructionStage::default())
    }

    /// Load every artifact under `root`. Never fails.
    pub fn load(root: &Path) -> Self {
        log::info!("Loading detection artifacts from: {}", root.display());

        let layout = ArtifactLayout::new(root);
        let mut loader = Loader {
            manifest: ArtifactManifest::load(&layout),
            layout,
            statuses: Vec::new(),
        };

        let stage1 = ClassifierStage {
            classifier: loader
                .attempt("classifier", loader.layout.classifier(), |p| {
                    OnnxClassifier::load(p, PORT_FEATURE_COUNT)
                })
                .map(|c| Box::new(c) as Box<dyn Classifier>),
            scaler: loader.attempt("classifier_scaler", loader.layout.classifier_scaler(), |p| {
                FeatureScaler::load(p, PORT_FEATURE_COUNT)
            }),
            decoder: loader.attempt("label_decoder", loader.layout.label_decoder(), LabelDecoder::load),
        };

        let stage2 = ReconstructionStage {
            scaler: loader.attempt(
                "reconstruction_scaler",
                loader.layout.reconstruction_scaler(),
                |p| FeatureScaler::load(p, STATS_FEATURE_COUNT),
            ),
            threshold: loader.attempt("threshold", loader.layout.threshold(), ThresholdConfig::load),
            model: loader
                .attempt(
                    "reconstruction_model",
                    loader.layout.reconstruction_model(),
                    OnnxAutoencoder::load,
                )
                .map(|m| Box::new(m) as Box<dyn Reconstructor>),
        };

        if stage2.model.is_none() && loader.layout.reconstruction_trainable().exists() {
            log::warn!(
                "Found {} but only the ONNX export is loadable; export the model to {}",
                loader.layout.reconstruction_trainable().display(),
                loader.layout.reconstruction_model().display()
            );
        }

        let repository = Self {
            stage1,
            stage2,
            root: Some(loader.layout.root().to_path_buf()),
            artifacts: loader.statuses,
            loaded_at: Utc::now(),
        };

        repository.log_summary();
        repository
    }

    pub fn status(&self) -> RepositoryStatus {
        RepositoryStatus {
            root: self.root.clone(),
            stage1_available: self.stage1.is_available(),
            stage2_available: self.stage2.is_available(),
            threshold: self.stage2.threshold.map(|t| t.threshold),
            artifacts: self.artifacts.clone(),
            loaded_at: self.loaded_at,
        }
    }

    fn log_summary(&self) {
        let describe = |available: bool| if available { "available" } else { "UNAVAILABLE" };

        log::info!(
            "Stage 1 (classifier): {} | Stage 2 (reconstruction): {}",
            describe(self.stage1.is_available()),
            describe(self.stage2.is_available())
        );

        if !self.stage1.is_available() && !self.stage2.is_available() {
            log::warn!("No detection stage is available - every flow will be dropped");
        } else if self.stage2.is_available() && self.stage2.model.is_none() {
            log::warn!("Stage 2 has a threshold but no reconstruction model - its flows will be dropped");
        }
    }
}

fn in_memory(name: &str, loaded: bool) -> ArtifactStatus {
    ArtifactStatus {
        name: name.to_string(),
        path: None,
        loaded,
        error: None,
    }
}

// ============================================================================
// LOADER
// ============================================================================

struct Loader {
    layout: ArtifactLayout,
    manifest: Option<ArtifactManifest>,
    statuses: Vec<ArtifactStatus>,
}

impl Loader {
    /// Load one artifact, recording the outcome. Errors and panics both
    /// end up as an absent artifact.
    fn attempt<T>(
        &mut self,
        name: &str,
        path: PathBuf,
        load: impl FnOnce(&Path) -> Result<T, ArtifactError>,
    ) -> Option<T> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            if let (Some(manifest), true) = (&self.manifest, path.exists()) {
                manifest.verify(&self.layout, &path)?;
            }
            load(&path)
        }))
        .unwrap_or_else(|_| Err(ArtifactError::invalid(&path, "loader panicked")));

        let (value, error) = match outcome {
            Ok(value) => {
                log::info!("Loaded {} ({})", name, path.display());
                (Some(value), None)
            }
            Err(e) => {
                log::warn!("{} unavailable: {}", name, e);
                (None, Some(e.to_string()))
            }
        };

        self.statuses.push(ArtifactStatus {
            name: name.to_string(),
            path: Some(path),
            loaded: value.is_some(),
            error,
        });

        value
    }
}
