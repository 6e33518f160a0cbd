use super::{Architecture, RegisterSnapshot};
use crate::error::{Result, TracerError};
use crate::event::AccessKind;
use crate::tracer::decoder::SyscallDescriptor;
use nix::unistd::Pid;

pub struct X86_64Arch;

// x86_64 syscall numbers from arch/x86/entry/syscalls/syscall_64.tbl
const SYS_OPEN: u64 = 2;
const SYS_CHDIR: u64 = 80;
const SYS_OPENAT: u64 = 257;

static DESCRIPTORS: [SyscallDescriptor; 3] = [
    SyscallDescriptor {
        number: SYS_CHDIR,
        kind: AccessKind::Chdir,
        path_arg: 0,
        flags_arg: None,
    },
    SyscallDescriptor {
        number: SYS_OPEN,
        kind: AccessKind::Open,
        path_arg: 0,
        flags_arg: Some(1),
    },
    SyscallDescriptor {
        number: SYS_OPENAT,
        kind: AccessKind::Openat,
        path_arg: 1,
        flags_arg: Some(2),
    },
];

impl Architecture for X86_64Arch {
    fn name(&self) -> &'static str {
        "x86_64"
    }

    fn read_registers(&self, pid: Pid) -> Result<RegisterSnapshot> {
        read_registers(pid)
    }

    fn descriptors(&self) -> &'static [SyscallDescriptor] {
        &DESCRIPTORS
    }
}

#[cfg(target_arch = "x86_64")]
fn read_registers(pid: Pid) -> Result<RegisterSnapshot> {
    let regs = nix::sys::ptrace::getregs(pid).map_err(|source| TracerError::Registers {
        pid: pid.as_raw(),
        source,
    })?;

    // orig_rax survives the kernel overwriting rax with the return value
    Ok(RegisterSnapshot {
        number: regs.orig_rax,
        args: [regs.rdi, regs.rsi, regs.rdx, regs.r10, regs.r8, regs.r9],
    })
}

#[cfg(not(target_arch = "x86_64"))]
fn read_registers(_pid: Pid) -> Result<RegisterSnapshot> {
    Err(TracerError::UnsupportedArch("x86_64 registers on a foreign host".to_string()).into())
}
