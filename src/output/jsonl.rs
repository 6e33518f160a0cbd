use std::io::{BufWriter, Write};

use super::OutputSink;
use crate::error::OutputError;
use crate::event::TraceEvent;

/// JSONL output sink - one JSON object per line.
pub struct JsonlSink {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl JsonlSink {
    pub fn new_file(file: std::fs::File) -> Self {
        Self {
            writer: BufWriter::new(Box::new(file)),
        }
    }
}

impl OutputSink for JsonlSink {
    fn emit(&mut self, event: &TraceEvent) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Access, AccessEvent, AccessMode, TraceSummary};

    #[test]
    fn writes_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut sink = JsonlSink::new_file(std::fs::File::create(&path).unwrap());

        sink.emit(&TraceEvent::Access(AccessEvent {
            timestamp: chrono::Utc::now(),
            pid: 3,
            syscall_nr: 257,
            access: Access::Openat {
                path: "/w/sub/file".to_string(),
                access_mode: AccessMode::ReadWrite,
                raw_flags: 0o2,
            },
        }))
        .unwrap();
        sink.emit(&TraceEvent::Summary(TraceSummary {
            timestamp: chrono::Utc::now(),
            syscall_stops: 10,
            tracked_entries: 2,
            accesses: 1,
            read_failures: 0,
            duration_ms: 5,
            exit_code: 0,
        }))
        .unwrap();
        sink.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event_type"], "access");
        assert_eq!(lines[0]["kind"], "openat");
        assert_eq!(lines[0]["access_mode"], "read_write");
        assert_eq!(lines[1]["event_type"], "summary");
        assert_eq!(lines[1]["accesses"], 1);
    }
}
