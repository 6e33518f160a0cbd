use std::io::{self, Write};

use colored::Colorize;

use super::OutputSink;
use crate::error::OutputError;
use crate::event::*;

/// Colored terminal output sink (writes to stderr).
pub struct TerminalSink;

impl TerminalSink {
    pub fn new(no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self
    }

    fn format_access(&self, event: &AccessEvent) -> String {
        let pid = format!("[{}]", event.pid).dimmed().to_string();
        let kind = event.access.kind().to_string().cyan().to_string();

        match &event.access {
            Access::Chdir { path } => format!("{pid} {kind} {path}"),
            Access::Open {
                path,
                access_mode,
                raw_flags,
            }
            | Access::Openat {
                path,
                access_mode,
                raw_flags,
            } => {
                let mode = match access_mode {
                    AccessMode::ReadOnly => access_mode.to_string().green().to_string(),
                    AccessMode::Unknown => access_mode.to_string().dimmed().to_string(),
                    _ => access_mode.to_string().yellow().to_string(),
                };
                format!("{pid} {kind} {path}, flags {mode}, raw {raw_flags:#x}")
            }
        }
    }

    fn format_process(&self, event: &ProcessEvent) -> String {
        match event {
            ProcessEvent::Exited { pid, exit_code, .. } => {
                let code = if *exit_code == 0 {
                    exit_code.to_string().green().to_string()
                } else {
                    exit_code.to_string().red().to_string()
                };
                format!("[{pid}] {} code={code}", "exited".bold())
            }
            ProcessEvent::Signaled { pid, signal, .. } => {
                format!("[{pid}] {} by {signal}", "killed".red().bold())
            }
        }
    }

    fn format_summary(&self, summary: &TraceSummary) -> String {
        format!(
            "{} {} accesses inside root, {} tracked syscalls, {} unreadable paths, {} stops in {}ms",
            "summary:".bold(),
            summary.accesses,
            summary.tracked_entries,
            summary.read_failures,
            summary.syscall_stops,
            summary.duration_ms
        )
    }
}

impl OutputSink for TerminalSink {
    fn emit(&mut self, event: &TraceEvent) -> Result<(), OutputError> {
        let line = match event {
            TraceEvent::Access(e) => self.format_access(e),
            TraceEvent::Process(e) => self.format_process(e),
            TraceEvent::Summary(s) => self.format_summary(s),
        };
        let ts = event.timestamp().format("%H:%M:%S%.3f");
        writeln!(io::stderr(), "{ts} {line}")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        io::stderr().flush()?;
        Ok(())
    }
}
