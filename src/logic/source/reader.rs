//! JSON-lines replay source (file or stdin)

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use super::{FlowSource, SourceError};

/// One flow record per line; blank lines are skipped
pub struct JsonLinesSource<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
    line_no: u64,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            line_no: 0,
        }
    }

    /// Lines read so far, blank ones included
    pub fn line_no(&self) -> u64 {
        self.line_no
    }
}

impl JsonLinesSource<Box<dyn BufRead>> {
    /// `-` reads stdin, anything else is a file path
    pub fn open(input: &str) -> Result<Self, SourceError> {
        let reader: Box<dyn BufRead> = if input == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            let file = File::open(Path::new(input)).map_err(|source| SourceError::Open {
                path: input.to_string(),
                source,
            })?;
            Box::new(BufReader::new(file))
        };
        Ok(Self::new(reader))
    }
}

impl<R: BufRead> FlowSource for JsonLinesSource<R> {
    fn next_payload(&mut self) -> Result<Option<String>, SourceError> {
        while let Some(line) = read_line(&mut self.reader, &mut self.buf)? {
            self.line_no += 1;
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}

/// Read one line as text. Invalid UTF-8 is replaced rather than treated as a
/// stream error, so one garbled record only costs that record.
pub(super) fn read_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> Result<Option<String>, SourceError> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }

    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }

    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    #[test]
    fn test_reads_lines_and_skips_blanks() {
        let input = "{\"a\": 1}\r\n\n   \n{\"b\": 2}";
        let mut source = JsonLinesSource::new(Cursor::new(input));

        assert_eq!(source.next_payload().unwrap().as_deref(), Some("{\"a\": 1}"));
        assert_eq!(source.next_payload().unwrap().as_deref(), Some("{\"b\": 2}"));
        assert_eq!(source.next_payload().unwrap(), None);
        assert_eq!(source.line_no(), 4);
    }

    #[test]
    fn test_invalid_utf8_is_not_a_stream_error() {
        let input: &[u8] = b"{\"x\": \xff}\n{\"y\": 1}\n";
        let mut source = JsonLinesSource::new(Cursor::new(input));

        let first = source.next_payload().unwrap().unwrap();
        assert!(first.contains('\u{FFFD}'));
        assert_eq!(source.next_payload().unwrap().as_deref(), Some("{\"y\": 1}"));
    }

    #[test]
    fn test_open_file() {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{\"Destination Port\": 443}\n").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let mut source = JsonLinesSource::open(&path).unwrap();
        assert!(source.next_payload().unwrap().is_some());
        assert!(source.next_payload().unwrap().is_none());
    }

    #[test]
    fn test_open_missing_file() {
        let result = JsonLinesSource::open("/nonexistent/flows.jsonl");
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }
}
