//! Feature Vector - fixed-order model input
//!
//! **Versioned feature vectors with layout metadata**
//!
//! The length is part of the type, so a 77-vector can never reach the
//! stage-1 model and vice versa.

use super::layout::{
    layout_hash, port_feature_names, DESTINATION_PORT, FEATURE_VERSION, PORT_FEATURE_COUNT,
    STATS_FEATURES, STATS_FEATURE_COUNT,
};
use super::record::FieldLookup;

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// Feature values in canonical order, tagged with the layout they follow
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector<const N: usize> {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout
    pub layout_hash: u32,
    values: [f64; N],
}

/// Stage-2 input: the 77 flow statistics
pub type StatsVector = FeatureVector<STATS_FEATURE_COUNT>;

/// Stage-1 input: destination port + the 77 flow statistics
pub type PortStatsVector = FeatureVector<PORT_FEATURE_COUNT>;

impl<const N: usize> FeatureVector<N> {
    /// Zeroed vector with the current layout
    pub fn new() -> Self {
        Self::from_values([0.0; N])
    }

    pub fn from_values(values: [f64; N]) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn len(&self) -> usize {
        N
    }

    pub fn is_empty(&self) -> bool {
        N == 0
    }

    /// Values narrowed to the model dtype
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }
}

impl<const N: usize> Default for FeatureVector<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl PortStatsVector {
    pub fn destination_port(&self) -> f64 {
        self.values[0]
    }

    /// The statistics part, i.e. everything after the port
    pub fn stats(&self) -> &[f64] {
        &self.values[1..]
    }

    /// JSON form for trace logging, one named entry per slot
    pub fn to_log_entry(&self) -> serde_json::Value {
        named_entry(self.version, self.layout_hash, port_feature_names(), &self.values)
    }
}

fn named_entry<'a>(
    version: u8,
    hash: u32,
    names: impl Iterator<Item = &'a str>,
    values: &[f64],
) -> serde_json::Value {
    serde_json::json!({
        "feature_version": version,
        "layout_hash": hash,
        "named_values": names
            .zip(values.iter())
            .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
            .collect::<serde_json::Map<_, _>>(),
    })
}

// ============================================================================
// ASSEMBLER
// ============================================================================

/// Both model inputs for one flow
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledVectors {
    pub stats: StatsVector,
    pub port_stats: PortStatsVector,
}

/// Build the 77- and 78-vectors for one flow.
///
/// Absent fields and fields without a numeric reading become `0.0`.
/// Pure: the same lookup always yields the same vectors.
pub fn assemble<L: FieldLookup + ?Sized>(flow: &L) -> AssembledVectors {
    let read = |name: &str| flow.get_numeric(name).unwrap_or(0.0);

    let mut stats = [0.0f64; STATS_FEATURE_COUNT];
    for (slot, name) in stats.iter_mut().zip(STATS_FEATURES.iter()) {
        *slot = read(*name);
    }

    let mut port_stats = [0.0f64; PORT_FEATURE_COUNT];
    port_stats[0] = read(DESTINATION_PORT);
    port_stats[1..].copy_from_slice(&stats);

    AssembledVectors {
        stats: StatsVector::from_values(stats),
        port_stats: PortStatsVector::from_values(port_stats),
    }
}
