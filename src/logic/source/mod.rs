//! Flow Source - where flow records come from
//!
//! A source yields one raw payload (a JSON object line) per observed flow.
//! Production uses a spawned flow meter; replay reads JSON lines from a
//! file or stdin.

pub mod meter;
pub mod reader;

use std::process::ExitStatus;

use thiserror::Error;

pub use meter::MeterProcess;
pub use reader::JsonLinesSource;

/// Pull-based flow stream. `Ok(None)` means the stream ended cleanly.
pub trait FlowSource {
    fn next_payload(&mut self) -> Result<Option<String>, SourceError>;
}

impl<S: FlowSource + ?Sized> FlowSource for Box<S> {
    fn next_payload(&mut self) -> Result<Option<String>, SourceError> {
        (**self).next_payload()
    }
}

/// Capture session parameters handed to the flow meter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub statistical_analysis: bool,
    pub decode_tunnels: bool,
    pub promiscuous: bool,
    pub bpf_filter: &'static str,
}

impl CaptureSettings {
    /// The only capture configuration the models were trained against
    pub const FIXED: CaptureSettings = CaptureSettings {
        statistical_analysis: true,
        decode_tunnels: true,
        promiscuous: true,
        bpf_filter: "ip",
    };

    /// Command-line form understood by the meter
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.statistical_analysis {
            args.push("--statistical-analysis".to_string());
        }
        if self.decode_tunnels {
            args.push("--decode-tunnels".to_string());
        }
        if self.promiscuous {
            args.push("--promiscuous".to_string());
        }
        if !self.bpf_filter.is_empty() {
            args.push("--bpf-filter".to_string());
            args.push(self.bpf_filter.to_string());
        }
        args
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to start flow meter '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open flow input {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("flow source read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("flow meter exited with {0}")]
    MeterExited(ExitStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_capture_args() {
        let args = CaptureSettings::FIXED.to_args();
        assert_eq!(
            args,
            vec![
                "--statistical-analysis",
                "--decode-tunnels",
                "--promiscuous",
                "--bpf-filter",
                "ip"
            ]
        );
    }

    #[test]
    fn test_disabled_options_are_omitted() {
        let settings = CaptureSettings {
            statistical_analysis: false,
            decode_tunnels: false,
            promiscuous: true,
            bpf_filter: "",
        };
        assert_eq!(settings.to_args(), vec!["--promiscuous"]);
    }
}
