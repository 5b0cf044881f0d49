//! Model Module - Artifact loading and inference
//!
//! The repository owns every artifact; the cascade borrows it read-only.

pub mod artifacts;
pub mod inference;
pub mod labels;
pub mod repository;
pub mod scaler;
pub mod threshold;

// Re-export common types
pub use artifacts::{ArtifactError, ArtifactLayout};
pub use inference::{reconstruction_error, Classifier, InferenceError, Reconstructor};
pub use labels::LabelDecoder;
pub use repository::{
    ArtifactStatus, ClassifierStage, ModelRepository, ReconstructionStage, RepositoryStatus,
};
pub use scaler::FeatureScaler;
pub use threshold::ThresholdConfig;
