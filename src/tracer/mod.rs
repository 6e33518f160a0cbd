use crate::config::TraceConfig;
use crate::error::{Result, TracerError};
use crate::event::{AccessEvent, ProcessEvent, TraceEvent, TraceSummary};
use crate::output::OutputManager;
use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub mod arch;
pub mod decoder;
pub mod memory;
pub mod state;

use arch::Architecture;
use decoder::AccessFilter;
use memory::PtraceMemory;
use state::{SyscallPhase, TracedProcess};

/// Exit status reported when the run is cancelled with Ctrl-C.
const CANCELLED_EXIT_CODE: i32 = 128 + Signal::SIGINT as i32;

pub struct Tracer {
    config: TraceConfig,
    output: OutputManager,
    architecture: Box<dyn Architecture>,
    filter: AccessFilter,
    start_time: Instant,
    stats: TraceStats,
    shutdown: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct TraceStats {
    syscall_stops: u64,
    tracked_entries: u64,
    accesses: u64,
    read_failures: u64,
}

impl Tracer {
    pub fn new(config: TraceConfig, output: OutputManager, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let architecture = arch::detect_architecture()?;
        let filter = AccessFilter::new(&config.resolution_base, &config.root);
        log::debug!(
            "tracing on {} with root {}",
            architecture.name(),
            filter.boundary().root().display()
        );

        Ok(Self {
            config,
            output,
            architecture,
            filter,
            start_time: Instant::now(),
            stats: TraceStats::default(),
            shutdown,
        })
    }

    /// Launch the command and trace it to completion. Returns the exit code
    /// the monitor should exit with.
    pub fn run(&mut self) -> Result<i32> {
        let mut tracee = self.launch()?;
        self.start_time = Instant::now();

        let result = self.trace_loop(&mut tracee);
        if result.is_err() && tracee.alive {
            self.kill_tracee(&mut tracee);
        }

        self.emit_summary(*result.as_ref().unwrap_or(&-1));
        result
    }

    /// Spawn the command with PTRACE_TRACEME set before exec, so the child is
    /// traced from its first instruction and stops with SIGTRAP after exec.
    fn launch(&self) -> Result<TracedProcess> {
        let program = &self.config.command[0];
        let mut cmd = Command::new(program);
        cmd.args(&self.config.command[1..]);
        unsafe {
            cmd.pre_exec(|| ptrace::traceme().map_err(std::io::Error::from));
        }

        let child = cmd.spawn().map_err(|source| TracerError::Launch {
            command: program.clone(),
            source,
        })?;
        let pid = Pid::from_raw(child.id() as i32);
        log::info!("launched {:?} as pid {}", self.config.command, pid);

        match waitpid(pid, None).map_err(TracerError::Wait)? {
            WaitStatus::Stopped(_, Signal::SIGTRAP) => {
                log::debug!("pid {} stopped after exec, setting ptrace options", pid);
            }
            other => {
                return Err(TracerError::UnexpectedStop(format!("{other:?}")).into());
            }
        }

        // TRACESYSGOOD separates syscall stops from real SIGTRAPs; TRACEEXEC
        // turns the post-exec SIGTRAP into an event stop; EXITKILL takes the
        // tracee down if the monitor dies.
        let options = ptrace::Options::PTRACE_O_TRACESYSGOOD
            | ptrace::Options::PTRACE_O_TRACEEXEC
            | ptrace::Options::PTRACE_O_EXITKILL;
        ptrace::setoptions(pid, options).map_err(TracerError::Ptrace)?;

        Ok(TracedProcess::new(pid))
    }

    fn trace_loop(&mut self, tracee: &mut TracedProcess) -> Result<i32> {
        self.resume(tracee.pid, None)?;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                log::info!("cancelled, killing pid {}", tracee.pid);
                self.kill_tracee(tracee);
                return Ok(CANCELLED_EXIT_CODE);
            }

            let status = match waitpid(tracee.pid, Some(WaitPidFlag::__WALL)) {
                Ok(s) => s,
                // Ctrl-C landed while blocked; recheck the shutdown flag
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(TracerError::Wait(e).into()),
            };

            match status {
                WaitStatus::PtraceSyscall(pid) => {
                    self.handle_syscall(tracee)?;
                    tracee.advance();
                    self.resume(pid, None)?;
                }
                WaitStatus::Stopped(pid, signal) => {
                    // Signal-delivery stop: pass it on, phase is unchanged
                    log::trace!("pid {} received {:?}", pid, signal);
                    self.resume(pid, Some(signal))?;
                }
                WaitStatus::PtraceEvent(pid, _, event) => {
                    // PTRACE_EVENT_EXEC: a new image, the exec's exit stop follows
                    log::debug!("pid {} ptrace event {}", pid, event);
                    self.resume(pid, None)?;
                }
                WaitStatus::Exited(pid, code) => {
                    tracee.mark_exited();
                    log::info!("pid {} exited with {}", pid, code);
                    self.output.emit_event(TraceEvent::Process(ProcessEvent::Exited {
                        timestamp: chrono::Utc::now(),
                        pid: pid.as_raw(),
                        exit_code: code,
                    }))?;
                    return Ok(code);
                }
                WaitStatus::Signaled(pid, signal, _) => {
                    tracee.mark_exited();
                    log::info!("pid {} killed by {:?}", pid, signal);
                    self.output.emit_event(TraceEvent::Process(ProcessEvent::Signaled {
                        timestamp: chrono::Utc::now(),
                        pid: pid.as_raw(),
                        signal: format!("{:?}", signal),
                    }))?;
                    return Ok(128 + signal as i32);
                }
                _ => {}
            }
        }
    }

    fn handle_syscall(&mut self, tracee: &TracedProcess) -> Result<()> {
        self.stats.syscall_stops += 1;

        // A stopped tracee always has readable registers; failure here is fatal.
        let snapshot = self.architecture.read_registers(tracee.pid)?;

        if tracee.phase == SyscallPhase::Exiting {
            log::trace!("pid {} exit from syscall {}", tracee.pid, snapshot.number);
            return Ok(());
        }

        let Some(descriptor) = self.architecture.classify(snapshot.number) else {
            return Ok(());
        };
        self.stats.tracked_entries += 1;

        let memory = PtraceMemory::new(tracee.pid);
        match self.filter.inspect(&snapshot, descriptor, &memory) {
            Ok(Some(access)) => {
                self.stats.accesses += 1;
                self.output.emit_event(TraceEvent::Access(AccessEvent {
                    timestamp: chrono::Utc::now(),
                    pid: tracee.pid.as_raw(),
                    syscall_nr: snapshot.number,
                    access,
                }))?;
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.read_failures += 1;
                log::warn!(
                    "syscall {} ({}): could not read path argument: {}",
                    snapshot.number,
                    descriptor.kind,
                    e
                );
            }
        }

        Ok(())
    }

    /// Let the tracee run to its next syscall boundary.
    fn resume(&self, pid: Pid, signal: Option<Signal>) -> Result<()> {
        match ptrace::syscall(pid, signal) {
            Ok(()) => Ok(()),
            // Killed between the stop and the resume; the next wait reports it.
            Err(Errno::ESRCH) => {
                log::debug!("pid {} vanished before resume", pid);
                Ok(())
            }
            Err(e) => Err(TracerError::Ptrace(e).into()),
        }
    }

    fn kill_tracee(&mut self, tracee: &mut TracedProcess) {
        let _ = signal::kill(tracee.pid, Signal::SIGKILL);
        let _ = waitpid(tracee.pid, Some(WaitPidFlag::__WALL));
        tracee.mark_exited();
    }

    fn emit_summary(&mut self, exit_code: i32) {
        let summary = TraceSummary {
            timestamp: chrono::Utc::now(),
            syscall_stops: self.stats.syscall_stops,
            tracked_entries: self.stats.tracked_entries,
            accesses: self.stats.accesses,
            read_failures: self.stats.read_failures,
            duration_ms: self.start_time.elapsed().as_millis() as u64,
            exit_code,
        };

        if let Err(e) = self.output.emit_event(TraceEvent::Summary(summary)) {
            log::warn!("failed to write trace summary: {}", e);
        }
        if let Err(e) = self.output.flush() {
            log::warn!("failed to flush trace output: {}", e);
        }
    }
}
