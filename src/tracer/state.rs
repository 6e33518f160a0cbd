use nix::unistd::Pid;

#[derive(Debug)]
pub struct TracedProcess {
    pub pid: Pid,
    pub phase: SyscallPhase,
    pub alive: bool,
}

/// Which side of a syscall the tracee is stopped on. Syscall stops carry no
/// entry/exit tag, so this flips on every stop starting from `Entering`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallPhase {
    Entering,
    Exiting,
}

impl TracedProcess {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            phase: SyscallPhase::Entering,
            alive: true,
        }
    }

    pub fn advance(&mut self) {
        self.phase = match self.phase {
            SyscallPhase::Entering => SyscallPhase::Exiting,
            SyscallPhase::Exiting => SyscallPhase::Entering,
        };
    }

    pub fn mark_exited(&mut self) {
        self.alive = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_entry() {
        let p = TracedProcess::new(Pid::from_raw(100));
        assert_eq!(p.phase, SyscallPhase::Entering);
        assert!(p.alive);
    }

    #[test]
    fn phase_alternates_on_each_stop() {
        let mut p = TracedProcess::new(Pid::from_raw(100));
        let phases: Vec<_> = (0..5)
            .map(|_| {
                let current = p.phase;
                p.advance();
                current
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                SyscallPhase::Entering,
                SyscallPhase::Exiting,
                SyscallPhase::Entering,
                SyscallPhase::Exiting,
                SyscallPhase::Entering,
            ]
        );
    }

    #[test]
    fn exit_clears_alive() {
        let mut p = TracedProcess::new(Pid::from_raw(100));
        p.mark_exited();
        assert!(!p.alive);
    }
}
