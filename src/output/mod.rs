use crate::error::OutputError;
use crate::event::TraceEvent;

pub mod jsonl;
pub mod terminal;

pub trait OutputSink: Send {
    fn emit(&mut self, event: &TraceEvent) -> Result<(), OutputError>;
    fn flush(&mut self) -> Result<(), OutputError>;
}

pub struct OutputManager {
    sinks: Vec<Box<dyn OutputSink>>,
}

impl OutputManager {
    pub fn new(jsonl_output: Option<std::fs::File>, terminal: bool, no_color: bool) -> Self {
        let mut sinks: Vec<Box<dyn OutputSink>> = Vec::new();

        if let Some(file) = jsonl_output {
            sinks.push(Box::new(jsonl::JsonlSink::new_file(file)));
        }

        // The tracee owns stdout, so human-readable lines go to stderr
        if terminal {
            sinks.push(Box::new(terminal::TerminalSink::new(no_color)));
        }

        Self { sinks }
    }

    #[cfg(test)]
    pub fn with_sinks(sinks: Vec<Box<dyn OutputSink>>) -> Self {
        Self { sinks }
    }

    pub fn emit_event(&mut self, event: TraceEvent) -> Result<(), OutputError> {
        for sink in &mut self.sinks {
            sink.emit(&event)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}
