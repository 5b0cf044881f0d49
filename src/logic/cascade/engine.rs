//! Detection Cascade - two-stage decision per flow
//!
//! ```text
//! START → STAGE1 ─ anomalous ──────────────→ DONE(stage 1)
//!            │ benign / no result
//!            ▼
//!         STAGE2 ─ anomalous ──────────────→ DONE(stage 2)
//!                  benign / no result ─────→ DONE(stage 1 if any, else stage 2)
//! ```
//!
//! Both stages without a result is an error, never an implicit benign.

use crate::logic::features::{AssembledVectors, PortStatsVector, StatsVector};
use crate::logic::model::{reconstruction_error, InferenceError, ModelRepository};

use super::types::{CascadeError, Detection, StageOutcome, Verdict};

/// Per-flow state; the cascade holds no state between flows
#[derive(Debug)]
enum CascadeState {
    Stage1,
    Stage2 { carried: Option<Detection> },
    Done(Option<Detection>),
}

/// Read-only view over the loaded artifacts
pub struct Cascade<'r> {
    repository: &'r ModelRepository,
}

impl<'r> Cascade<'r> {
    pub fn new(repository: &'r ModelRepository) -> Self {
        Self { repository }
    }

    /// Final detection for one flow
    pub fn evaluate(&self, vectors: &AssembledVectors) -> Result<Detection, CascadeError> {
        let mut state = CascadeState::Stage1;

        loop {
            state = match state {
                CascadeState::Stage1 => {
                    match self.classify(&vectors.port_stats).map_err(CascadeError::Classifier)? {
                        StageOutcome::Anomalous(detection) => CascadeState::Done(Some(detection)),
                        StageOutcome::Benign(detection) => CascadeState::Stage2 {
                            carried: Some(detection),
                        },
                        StageOutcome::NoResult => CascadeState::Stage2 { carried: None },
                    }
                }
                CascadeState::Stage2 { carried } => {
                    match self.reconstruct(&vectors.stats).map_err(CascadeError::Reconstruction)? {
                        StageOutcome::Anomalous(detection) => CascadeState::Done(Some(detection)),
                        StageOutcome::Benign(detection) => {
                            CascadeState::Done(carried.or(Some(detection)))
                        }
                        StageOutcome::NoResult => CascadeState::Done(carried),
                    }
                }
                CascadeState::Done(result) => return result.ok_or(CascadeError::NoVerdict),
            };
        }
    }

    /// [`evaluate`](Self::evaluate) wrapped with the source interface
    pub fn verdict(
        &self,
        interface_name: &str,
        vectors: &AssembledVectors,
    ) -> Result<Verdict, CascadeError> {
        self.evaluate(vectors)
            .map(|detection| Verdict::new(interface_name, detection))
    }

    /// Stage 1: scale → classify → decode
    pub fn classify(&self, input: &PortStatsVector) -> Result<StageOutcome, InferenceError> {
        let stage = &self.repository.stage1;
        let Some(classifier) = stage.classifier.as_deref() else {
            return Ok(StageOutcome::NoResult);
        };

        let scaled = match &stage.scaler {
            Some(scaler) => to_f32(&scaler.transform(input.as_slice())?),
            None => input.to_f32(),
        };

        let class = classifier.predict_class(&scaled)?;

        let label = match &stage.decoder {
            Some(decoder) => decoder.decode(class)?.to_string(),
            None => class.to_string(),
        };

        Ok(Detection::classified(label).into())
    }

    /// Stage 2: scale → reconstruct → compare error with the threshold
    pub fn reconstruct(&self, input: &StatsVector) -> Result<StageOutcome, InferenceError> {
        let stage = &self.repository.stage2;
        let Some(threshold) = stage.threshold else {
            return Ok(StageOutcome::NoResult);
        };

        let scaled = match &stage.scaler {
            Some(scaler) => to_f32(&scaler.transform(input.as_slice())?),
            None => input.to_f32(),
        };

        let model = stage
            .model
            .as_deref()
            .ok_or(InferenceError::NotLoaded("reconstruction model"))?;

        let output = model.reconstruct(&scaled)?;
        let error = reconstruction_error(&scaled, &output)?;

        Ok(Detection::reconstructed(error, threshold.is_anomaly(error)).into())
    }
}

fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}
