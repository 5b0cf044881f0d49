//! API Module
//!
//! Host-facing status reporting. `EngineStatus` is what `--check-models`
//! prints and what an embedding host can poll.

pub mod engine_status;

pub use engine_status::{DetectionMode, EngineStatus};
