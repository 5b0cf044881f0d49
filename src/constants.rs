//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Environment variables override these; CLI flags override both.

use std::path::PathBuf;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Flow Sentinel";

/// Directory name of the artifact root next to the executable / in the data dir
pub const MODEL_DIR_NAME: &str = "models";

/// Default external flow meter command
pub const DEFAULT_METER: &str = "sentinel-meter";

/// Log loop statistics every N flows (debug level)
pub const DEFAULT_STATS_INTERVAL: u64 = 1000;

/// Label used by stage 2, which flags anomalies but never names the class
pub const UNKNOWN_LABEL: &str = "unknown";

/// Label of the benign class (compared case-insensitively)
pub const BENIGN_LABEL: &str = "benign";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Artifact root from `SENTINEL_MODEL_DIR`, if set
pub fn get_model_dir_override() -> Option<PathBuf> {
    std::env::var("SENTINEL_MODEL_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// Flow meter command from `SENTINEL_METER`, if set
pub fn get_meter_override() -> Option<String> {
    std::env::var("SENTINEL_METER")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Stats interval from `SENTINEL_STATS_INTERVAL`, if set and numeric
pub fn get_stats_interval_override() -> Option<u64> {
    std::env::var("SENTINEL_STATS_INTERVAL")
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Candidate artifact roots, in lookup order
pub fn model_dir_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = get_model_dir_override() {
        candidates.push(dir);
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
    {
        candidates.push(exe_dir.join(MODEL_DIR_NAME));
    }

    candidates.push(PathBuf::from(MODEL_DIR_NAME));

    if let Some(data_dir) = dirs::data_local_dir() {
        candidates.push(data_dir.join("flow-sentinel").join(MODEL_DIR_NAME));
    }

    candidates
}

/// First existing candidate, or `./models` when none exists
pub fn resolve_model_dir() -> PathBuf {
    model_dir_candidates()
        .into_iter()
        .find(|p| p.is_dir())
        .unwrap_or_else(|| PathBuf::from(MODEL_DIR_NAME))
}
