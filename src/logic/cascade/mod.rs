//! Cascade Module - two-stage detection decision
//!
//! Stage 1 classifies; stage 2 double-checks flows stage 1 called benign
//! (or every flow, when stage 1 is unavailable).

pub mod engine;
pub mod types;


pub use engine::Cascade;
pub use types::{CascadeError, Detection, Stage, StageOutcome, Verdict};
