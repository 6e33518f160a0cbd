use super::decoder::SyscallDescriptor;
use crate::error::Result;
use nix::unistd::Pid;

#[cfg(any(target_arch = "aarch64", test))]
pub mod aarch64;
#[cfg(any(target_arch = "x86_64", test))]
pub mod x86_64;

/// Calling-convention knowledge for one target: where the syscall number
/// and arguments live, and which syscall numbers carry a path we track.
pub trait Architecture: Send + Sync {
    fn name(&self) -> &'static str;

    fn read_registers(&self, pid: Pid) -> Result<RegisterSnapshot>;

    fn descriptors(&self) -> &'static [SyscallDescriptor];

    fn classify(&self, nr: u64) -> Option<&'static SyscallDescriptor> {
        self.descriptors().iter().find(|d| d.number == nr)
    }
}

/// Syscall number and argument registers captured at one stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub number: u64,
    pub args: [u64; 6],
}

impl RegisterSnapshot {
    pub fn arg(&self, index: usize) -> u64 {
        self.args.get(index).copied().unwrap_or(0)
    }
}

pub fn detect_architecture() -> Result<Box<dyn Architecture>> {
    #[cfg(target_arch = "x86_64")]
    {
        Ok(Box::new(x86_64::X86_64Arch))
    }

    #[cfg(target_arch = "aarch64")]
    {
        Ok(Box::new(aarch64::Aarch64Arch))
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        Err(crate::error::TracerError::UnsupportedArch(std::env::consts::ARCH.to_string()).into())
    }
}
