//! Logic Module - Detection engines
//!
//! - `features/` - Flow record normalization and vector assembly
//! - `model/` - Artifact loading and inference (ONNX, scalers, threshold)
//! - `cascade/` - Two-stage detection decision
//! - `source/`, `sink` - Flow input and verdict output
//! - `analysis_loop` - Fail-isolated per-flow processing

pub mod analysis_loop;
pub mod cascade;
pub mod config;
pub mod features;
pub mod model;
pub mod sink;
pub mod source;
