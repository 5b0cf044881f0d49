//! Analysis Loop - fail-isolated per-flow processing
//!
//! Pulls one flow at a time from the source, runs normalize → assemble →
//! cascade → emit, and moves on. A failure (or panic) inside one flow drops
//! that flow only. The loop ends when the source ends or fails.

use std::any::Any;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::logic::cascade::{Cascade, CascadeError, Verdict};
use crate::logic::features::{assemble, FieldAliases, FlowRecord, NormalizeError};
use crate::logic::model::ModelRepository;
use crate::logic::sink::{SinkError, VerdictSink};
use crate::logic::source::{FlowSource, SourceError};

thread_local! {
    static IN_FLOW: Cell<bool> = const { Cell::new(false) };
}

/// Report panics through the log instead of raw stderr. A panic inside a
/// flow only drops that flow, so it is logged at debug; anywhere else it
/// is an error.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        log::log!(panic_log_level(), "{}", info);
    }));
}

fn panic_log_level() -> log::Level {
    if IN_FLOW.with(Cell::get) {
        log::Level::Debug
    } else {
        log::Level::Error
    }
}

/// Why a single flow produced no verdict
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Cascade(#[from] CascadeError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("flow processing panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct LoopStats {
    pub flows_received: u64,
    pub verdicts_emitted: u64,
    pub flows_dropped: u64,
    pub anomalies: u64,
    pub total_latency_us: u64,
    pub started_at: DateTime<Utc>,
}

impl LoopStats {
    fn new() -> Self {
        Self {
            flows_received: 0,
            verdicts_emitted: 0,
            flows_dropped: 0,
            anomalies: 0,
            total_latency_us: 0,
            started_at: Utc::now(),
        }
    }

    pub fn avg_latency_us(&self) -> f64 {
        if self.flows_received == 0 {
            0.0
        } else {
            self.total_latency_us as f64 / self.flows_received as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "received={} emitted={} dropped={} anomalies={} avg_latency={:.1}us",
            self.flows_received,
            self.verdicts_emitted,
            self.flows_dropped,
            self.anomalies,
            self.avg_latency_us()
        )
    }
}

pub struct AnalysisLoop<'r> {
    interface_name: String,
    cascade: Cascade<'r>,
    aliases: FieldAliases,
    stats_interval: u64,
    stats: LoopStats,
}

impl<'r> AnalysisLoop<'r> {
    pub fn new(interface_name: impl Into<String>, repository: &'r ModelRepository) -> Self {
        Self {
            interface_name: interface_name.into(),
            cascade: Cascade::new(repository),
            aliases: FieldAliases::default(),
            stats_interval: crate::constants::DEFAULT_STATS_INTERVAL,
            stats: LoopStats::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: FieldAliases) -> Self {
        self.aliases = aliases;
        self
    }

    /// Log stats every `interval` flows; 0 disables periodic logging
    pub fn with_stats_interval(mut self, interval: u64) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Consume `source` until it ends. Only a source failure is an error.
    pub fn run<S, K>(mut self, source: &mut S, sink: &mut K) -> Result<LoopStats, SourceError>
    where
        S: FlowSource + ?Sized,
        K: VerdictSink + ?Sized,
    {
        log::info!("Analysis loop started on {}", self.interface_name);

        loop {
            match source.next_payload() {
                Ok(Some(payload)) => self.handle(&payload, sink),
                Ok(None) => break,
                Err(e) => {
                    log::error!("Flow source failed: {} ({})", e, self.stats.summary());
                    return Err(e);
                }
            }
        }

        log::info!("Analysis loop finished: {}", self.stats.summary());
        Ok(self.stats)
    }

    /// One bounded unit of work; never propagates anything
    fn handle<K: VerdictSink + ?Sized>(&mut self, payload: &str, sink: &mut K) {
        let started = Instant::now();
        self.stats.flows_received += 1;

        IN_FLOW.with(|f| f.set(true));
        let outcome = catch_unwind(AssertUnwindSafe(|| self.process_flow(payload, sink)))
            .unwrap_or_else(|panic| Err(FlowError::Panicked(panic_message(panic))));
        IN_FLOW.with(|f| f.set(false));

        match outcome {
            Ok(verdict) => {
                self.stats.verdicts_emitted += 1;
                if verdict.is_anomaly {
                    self.stats.anomalies += 1;
                }
            }
            Err(e) => {
                self.stats.flows_dropped += 1;
                log::debug!("Dropped flow #{}: {}", self.stats.flows_received, e);
            }
        }

        self.stats.total_latency_us += started.elapsed().as_micros() as u64;

        if self.stats_interval > 0 && self.stats.flows_received % self.stats_interval == 0 {
            log::debug!("Loop stats: {}", self.stats.summary());
        }
    }

    /// normalize → assemble → cascade → emit
    pub fn process_flow<K: VerdictSink + ?Sized>(
        &self,
        payload: &str,
        sink: &mut K,
    ) -> Result<Verdict, FlowError> {
        let mut record = FlowRecord::from_json_str(payload)?;
        if !self.aliases.is_empty() {
            record.apply_aliases(&self.aliases);
        }

        let vectors = assemble(&record);
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Flow vectors: {}", vectors.port_stats.to_log_entry());
        }
        let verdict = self.cascade.verdict(&self.interface_name, &vectors)?;

        sink.emit(&verdict)?;
        Ok(verdict)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::logic::cascade::Detection;
    use crate::logic::model::{
        Classifier, ClassifierStage, InferenceError, LabelDecoder, ReconstructionStage,
    };
    use crate::logic::sink::JsonLinesSink;
    use crate::logic::source::JsonLinesSource;

    /// Predicts the destination port as the class index; panics on port 13
    struct PortClassifier;

    impl Classifier for PortClassifier {
        fn predict_class(&self, input: &[f32]) -> Result<i64, InferenceError> {
            let port = input[0] as i64;
            if port == 13 {
                panic!("model runtime crashed");
            }
            Ok(port)
        }
    }

    /// Records the panic log level in effect while the model runs
    struct LevelRecordingClassifier {
        level: Arc<Mutex<Option<log::Level>>>,
    }

    impl Classifier for LevelRecordingClassifier {
        fn predict_class(&self, _input: &[f32]) -> Result<i64, InferenceError> {
            *self.level.lock() = Some(panic_log_level());
            Ok(0)
        }
    }

    fn repository() -> ModelRepository {
        let classes = (0..20).map(|i| format!("class{}", i)).collect();
        ModelRepository::new(
            ClassifierStage {
                classifier: Some(Box::new(PortClassifier)),
                scaler: None,
                decoder: Some(LabelDecoder::new(classes)),
            },
            ReconstructionStage::default(),
        )
    }

    fn verdicts(output: Vec<u8>) -> Vec<Verdict> {
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    struct FailingSource {
        remaining: Vec<String>,
    }

    impl FlowSource for FailingSource {
        fn next_payload(&mut self) -> Result<Option<String>, SourceError> {
            match self.remaining.pop() {
                Some(p) => Ok(Some(p)),
                None => Err(SourceError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "capture interface went away",
                ))),
            }
        }
    }

    #[test]
    fn test_malformed_flows_do_not_stop_the_loop() {
        let lines: Vec<String> = (0..10)
            .map(|i| {
                if i % 2 == 1 {
                    match i {
                        1 => "not json at all".to_string(),
                        3 => "[1, 2, 3]".to_string(),
                        5 => "{\"Destination Port\": ".to_string(),
                        _ => "null".to_string(),
                    }
                } else {
                    format!("{{\"Destination Port\": {}, \"Flow Duration\": 12}}", i)
                }
            })
            .collect();

        let repo = repository();
        let mut source = JsonLinesSource::new(Cursor::new(lines.join("\n")));
        let mut sink = JsonLinesSink::new(Vec::new());

        let stats = AnalysisLoop::new("eth0", &repo)
            .run(&mut source, &mut sink)
            .unwrap();

        let labels: Vec<String> = verdicts(sink.into_inner())
            .into_iter()
            .map(|v| v.label)
            .collect();
        assert_eq!(labels, vec!["class0", "class2", "class4", "class6", "class8"]);
        assert_eq!(stats.flows_received, 10);
        assert_eq!(stats.verdicts_emitted, 5);
        assert_eq!(stats.flows_dropped, 5);
    }

    #[test]
    fn test_panicking_model_drops_only_that_flow() {
        let input = "{\"Destination Port\": 12}\n{\"Destination Port\": 13}\n{\"Destination Port\": 14}\n";
        let repo = repository();
        let mut source = JsonLinesSource::new(Cursor::new(input));
        let mut sink = JsonLinesSink::new(Vec::new());

        let stats = AnalysisLoop::new("eth1", &repo)
            .run(&mut source, &mut sink)
            .unwrap();

        let out = verdicts(sink.into_inner());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].label, "class12");
        assert_eq!(out[1].label, "class14");
        assert!(out.iter().all(|v| v.interface_name == "eth1"));
        assert_eq!(stats.flows_dropped, 1);
        assert_eq!(stats.anomalies, 2);
    }

    #[test]
    fn test_no_available_stage_drops_every_flow() {
        let repo = ModelRepository::empty();
        let mut source = JsonLinesSource::new(Cursor::new("{}\n{}\n"));
        let mut sink = JsonLinesSink::new(Vec::new());

        let stats = AnalysisLoop::new("eth0", &repo)
            .run(&mut source, &mut sink)
            .unwrap();

        assert!(sink.into_inner().is_empty());
        assert_eq!(stats.flows_dropped, 2);
        assert_eq!(stats.verdicts_emitted, 0);
    }

    #[test]
    fn test_source_failure_ends_the_loop() {
        let repo = repository();
        let mut source = FailingSource {
            remaining: vec!["{\"Destination Port\": 2}".to_string()],
        };
        let mut sink = JsonLinesSink::new(Vec::new());

        let result = AnalysisLoop::new("eth0", &repo).run(&mut source, &mut sink);

        assert!(matches!(result, Err(SourceError::Io(_))));
        assert_eq!(verdicts(sink.into_inner()).len(), 1);
    }

    #[test]
    fn test_sink_failure_is_a_dropped_flow() {
        struct ClosedSink;
        impl VerdictSink for ClosedSink {
            fn emit(&mut self, _verdict: &Verdict) -> Result<(), SinkError> {
                Err(SinkError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "stdout closed",
                )))
            }
        }

        let repo = repository();
        let mut source = JsonLinesSource::new(Cursor::new("{\"Destination Port\": 1}\n"));

        let stats = AnalysisLoop::new("eth0", &repo)
            .run(&mut source, &mut ClosedSink)
            .unwrap();

        assert_eq!(stats.flows_dropped, 1);
        assert_eq!(stats.verdicts_emitted, 0);
    }

    #[test]
    fn test_aliases_feed_canonical_fields() {
        let mut map = HashMap::new();
        map.insert("dst_port".to_string(), "Destination Port".to_string());

        let repo = repository();
        let lp = AnalysisLoop::new("eth0", &repo).with_aliases(FieldAliases::new(map));
        let mut sink = JsonLinesSink::new(Vec::new());

        let verdict = lp.process_flow(r#"{"dst_port": 7, "_internal": 99}"#, &mut sink).unwrap();
        assert_eq!(verdict, Verdict::new("eth0", Detection::classified("class7")));
    }

    #[test]
    fn test_panics_inside_a_flow_log_at_debug() {
        let level = Arc::new(Mutex::new(None));
        let repo = ModelRepository::new(
            ClassifierStage {
                classifier: Some(Box::new(LevelRecordingClassifier { level: level.clone() })),
                scaler: None,
                decoder: None,
            },
            ReconstructionStage::default(),
        );
        let mut source = JsonLinesSource::new(Cursor::new("{}\n"));
        let mut sink = JsonLinesSink::new(Vec::new());

        assert_eq!(panic_log_level(), log::Level::Error);
        AnalysisLoop::new("eth0", &repo)
            .run(&mut source, &mut sink)
            .unwrap();

        assert_eq!(*level.lock(), Some(log::Level::Debug));
        assert_eq!(panic_log_level(), log::Level::Error);
    }

    #[test]
    fn test_avg_latency() {
        let mut stats = LoopStats::new();
        assert_eq!(stats.avg_latency_us(), 0.0);
        stats.flows_received = 4;
        stats.total_latency_us = 10;
        assert_eq!(stats.avg_latency_us(), 2.5);
    }
}
