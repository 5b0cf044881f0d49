//! Verdict Sink - one flushed JSON line per verdict

use std::io::Write;

use thiserror::Error;

use crate::logic::cascade::Verdict;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to encode verdict: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write verdict: {0}")]
    Io(#[from] std::io::Error),
}

pub trait VerdictSink {
    fn emit(&mut self, verdict: &Verdict) -> Result<(), SinkError>;
}

impl<S: VerdictSink + ?Sized> VerdictSink for Box<S> {
    fn emit(&mut self, verdict: &Verdict) -> Result<(), SinkError> {
        (**self).emit(verdict)
    }
}

/// Writes `{"iface":..,"label":..,"is_anomaly":..}\n` and flushes immediately
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> VerdictSink for JsonLinesSink<W> {
    fn emit(&mut self, verdict: &Verdict) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(verdict)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::cascade::Detection;

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_one_line_per_verdict() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.emit(&Verdict::new("eth0", Detection::classified("BENIGN"))).unwrap();
        sink.emit(&Verdict::new("eth0", Detection::reconstructed(0.7, true))).unwrap();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"iface":"eth0","label":"BENIGN","is_anomaly":false}"#,
                r#"{"iface":"eth0","label":"unknown","is_anomaly":true}"#,
            ]
        );
    }

    #[test]
    fn test_write_failure_is_an_error() {
        let mut sink = JsonLinesSink::new(FailingWriter);
        let result = sink.emit(&Verdict::new("eth0", Detection::classified("DDoS")));
        assert!(matches!(result, Err(SinkError::Io(_))));
    }
}
