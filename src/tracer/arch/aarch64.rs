use super::{Architecture, RegisterSnapshot};
use crate::error::{Result, TracerError};
use crate::event::AccessKind;
use crate::tracer::decoder::SyscallDescriptor;
use nix::unistd::Pid;

pub struct Aarch64Arch;

// Generic syscall table (include/uapi/asm-generic/unistd.h). There is no
// legacy open(2) on aarch64; libc routes everything through openat.
const SYS_CHDIR: u64 = 49;
const SYS_OPENAT: u64 = 56;

static DESCRIPTORS: [SyscallDescriptor; 2] = [
    SyscallDescriptor {
        number: SYS_CHDIR,
        kind: AccessKind::Chdir,
        path_arg: 0,
        flags_arg: None,
    },
    SyscallDescriptor {
        number: SYS_OPENAT,
        kind: AccessKind::Openat,
        path_arg: 1,
        flags_arg: Some(2),
    },
];

impl Architecture for Aarch64Arch {
    fn name(&self) -> &'static str {
        "aarch64"
    }

    fn read_registers(&self, pid: Pid) -> Result<RegisterSnapshot> {
        read_registers(pid)
    }

    fn descriptors(&self) -> &'static [SyscallDescriptor] {
        &DESCRIPTORS
    }
}

#[cfg(target_arch = "aarch64")]
fn read_registers(pid: Pid) -> Result<RegisterSnapshot> {
    use std::mem;

    // On aarch64, use PTRACE_GETREGSET with NT_PRSTATUS
    let mut regs: libc::user_pt_regs = unsafe { mem::zeroed() };

    let iov = libc::iovec {
        iov_base: &mut regs as *mut _ as *mut libc::c_void,
        iov_len: mem::size_of::<libc::user_pt_regs>(),
    };

    let res = unsafe {
        libc::ptrace(
            libc::PTRACE_GETREGSET,
            pid.as_raw(),
            libc::NT_PRSTATUS as *mut libc::c_void,
            &iov as *const _,
        )
    };

    if res < 0 {
        return Err(TracerError::Registers {
            pid: pid.as_raw(),
            source: nix::errno::Errno::last(),
        }
        .into());
    }

    // x8 holds the number, x0..x5 the arguments (x0 is only valid on entry)
    Ok(RegisterSnapshot {
        number: regs.regs[8],
        args: [
            regs.regs[0],
            regs.regs[1],
            regs.regs[2],
            regs.regs[3],
            regs.regs[4],
            regs.regs[5],
        ],
    })
}

#[cfg(not(target_arch = "aarch64"))]
fn read_registers(_pid: Pid) -> Result<RegisterSnapshot> {
    Err(TracerError::UnsupportedArch("aarch64 registers on a foreign host".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_legacy_open() {
        assert!(Aarch64Arch
            .descriptors()
            .iter()
            .all(|d| d.kind != AccessKind::Open));
    }

    #[test]
    fn openat_layout_matches_x86_64() {
        let d = Aarch64Arch.classify(SYS_OPENAT).unwrap();
        assert_eq!(d.path_arg, 1);
        assert_eq!(d.flags_arg, Some(2));
    }
}
