//! Features Module - Flow Feature Assembly
//!
//! Turns an open-ended flow record into the fixed-order numeric vectors
//! the detection models expect.

pub mod layout;
pub mod record;
pub mod vector;

#[cfg(test)]
mod tests;

// Re-export common types
pub use layout::{LayoutInfo, PORT_FEATURE_COUNT, STATS_FEATURE_COUNT};
pub use record::{FieldAliases, FieldLookup, FieldValue, FlowRecord, NormalizeError};
pub use vector::{assemble, AssembledVectors, FeatureVector, PortStatsVector, StatsVector};
