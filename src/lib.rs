//! Flow Sentinel - two-stage ML detection over network flow records
//!
//! A flow meter produces one statistics record per flow. Each record is
//! assembled into the fixed feature vectors the models expect, run through
//! a classifier with a reconstruction-error fallback, and emitted as one
//! JSON verdict line.

pub mod api;
pub mod constants;
pub mod logic;
