//! Feature Layout - Canonical Flow Feature Definition
//!
//! **CRITICAL: This file controls the feature schema shared with the
//! pretrained models.**
//!
//! ## Rules (NEVER break these):
//! 1. Never reorder or rename a feature: the models were trained on this order
//! 2. Any change to the layout → increment FEATURE_VERSION
//! 3. `Fwd Header Length.1` is a distinct column, not a typo
//!
//! The stage-2 model consumes the 77 flow statistics. The stage-1 model
//! consumes the destination port followed by the same 77 statistics.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Number of flow statistics (stage-2 input)
pub const STATS_FEATURE_COUNT: usize = 77;

/// Destination port + flow statistics (stage-1 input)
pub const PORT_FEATURE_COUNT: usize = STATS_FEATURE_COUNT + 1;

/// Name of the field prepended to form the 78-feature vector
pub const DESTINATION_PORT: &str = "Destination Port";

/// Flow statistics in exact model order.
/// The array type pins the length at compile time.
pub const STATS_FEATURES: [&str; STATS_FEATURE_COUNT] = [
    // === Duration / volume (0-4) ===
    "Flow Duration",
    "Total Fwd Packets",
    "Total Backward Packets",
    "Total Length of Fwd Packets",
    "Total Length of Bwd Packets",
    // === Packet length, per direction (5-12) ===
    "Fwd Packet Length Max",
    "Fwd Packet Length Min",
    "Fwd Packet Length Mean",
    "Fwd Packet Length Std",
    "Bwd Packet Length Max",
    "Bwd Packet Length Min",
    "Bwd Packet Length Mean",
    "Bwd Packet Length Std",
    // === Rates (13-14) ===
    "Flow Bytes/s",
    "Flow Packets/s",
    // === Inter-arrival times (15-28) ===
    "Flow IAT Mean",
    "Flow IAT Std",
    "Flow IAT Max",
    "Flow IAT Min",
    "Fwd IAT Total",
    "Fwd IAT Mean",
    "Fwd IAT Std",
    "Fwd IAT Max",
    "Fwd IAT Min",
    "Bwd IAT Total",
    "Bwd IAT Mean",
    "Bwd IAT Std",
    "Bwd IAT Max",
    "Bwd IAT Min",
    // === Directional flags / headers (29-36) ===
    "Fwd PSH Flags",
    "Bwd PSH Flags",
    "Fwd URG Flags",
    "Bwd URG Flags",
    "Fwd Header Length",
    "Bwd Header Length",
    "Fwd Packets/s",
    "Bwd Packets/s",
    // === Packet length, both directions (37-41) ===
    "Min Packet Length",
    "Max Packet Length",
    "Packet Length Mean",
    "Packet Length Std",
    "Packet Length Variance",
    // === Flag counts (42-49) ===
    "FIN Flag Count",
    "SYN Flag Count",
    "RST Flag Count",
    "PSH Flag Count",
    "ACK Flag Count",
    "URG Flag Count",
    "CWE Flag Count",
    "ECE Flag Count",
    // === Ratios / segment sizes (50-54) ===
    "Down/Up Ratio",
    "Average Packet Size",
    "Avg Fwd Segment Size",
    "Avg Bwd Segment Size",
    "Fwd Header Length.1",
    // === Bulk (55-60) ===
    "Fwd Avg Bytes/Bulk",
    "Fwd Avg Packets/Bulk",
    "Fwd Avg Bulk Rate",
    "Bwd Avg Bytes/Bulk",
    "Bwd Avg Packets/Bulk",
    "Bwd Avg Bulk Rate",
    // === Subflows (61-64) ===
    "Subflow Fwd Packets",
    "Subflow Fwd Bytes",
    "Subflow Bwd Packets",
    "Subflow Bwd Bytes",
    // === TCP window / segments (65-68) ===
    "Init_Win_bytes_forward",
    "Init_Win_bytes_backward",
    "act_data_pkt_fwd",
    "min_seg_size_forward",
    // === Active / idle timing (69-76) ===
    "Active Mean",
    "Active Std",
    "Active Max",
    "Active Min",
    "Idle Mean",
    "Idle Std",
    "Idle Max",
    "Idle Min",
];

/// Stage-1 feature names: destination port, then the flow statistics
pub fn port_feature_names() -> impl Iterator<Item = &'static str> {
    std::iter::once(DESTINATION_PORT).chain(STATS_FEATURES.iter().copied())
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over version + ordered names of the 78-feature layout.
/// The 77 layout is a suffix of it, so one hash covers both.
pub fn layout_hash() -> u32 {
    let mut hasher = Hasher::new();

    hasher.update(&[FEATURE_VERSION]);

    for name in port_feature_names() {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }

    hasher.finalize()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Layout information for status reports and logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub stats_feature_count: usize,
    pub port_feature_count: usize,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            stats_feature_count: STATS_FEATURE_COUNT,
            port_feature_count: PORT_FEATURE_COUNT,
        }
    }

    /// Whether an artifact built for `version`/`hash` matches this build
    pub fn is_compatible(&self, version: u8, hash: u32) -> bool {
        self.version == version && self.hash == hash
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Slot of a flow statistic in the 77-vector
pub fn stats_index(name: &str) -> Option<usize> {
    STATS_FEATURES.iter().position(|&n| n == name)
}

/// Whether `name` is one of the 78 canonical names
pub fn is_canonical(name: &str) -> bool {
    name == DESTINATION_PORT || stats_index(name).is_some()
}
