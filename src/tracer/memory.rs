use crate::error::MemoryError;
use nix::errno::Errno;
use nix::unistd::Pid;

/// First chunk size tried when looking for a string terminator.
pub const INITIAL_CHUNK: usize = 64;
/// Largest chunk read before giving up on finding a terminator.
pub const MAX_CHUNK: usize = 64_000;

/// Read access to a tracee's address space.
pub trait TraceeMemory {
    /// Read up to `len` bytes at `addr`. A short result means everything
    /// past the returned bytes is unreadable.
    fn read(&self, addr: u64, len: usize) -> Result<Vec<u8>, MemoryError>;
}

pub struct PtraceMemory {
    pid: Pid,
}

impl PtraceMemory {
    pub fn new(pid: Pid) -> Self {
        Self { pid }
    }
}

impl TraceeMemory for PtraceMemory {
    /// Primary: process_vm_readv (fast)
    /// Fallback: ptrace::read (slower, word by word)
    fn read(&self, addr: u64, len: usize) -> Result<Vec<u8>, MemoryError> {
        match read_memory_process_vm(self.pid, addr, len) {
            Ok(data) => return Ok(data),
            Err(e) => {
                log::trace!("process_vm_readv failed, falling back to ptrace: {}", e);
            }
        }

        read_memory_ptrace(self.pid, addr, len)
    }
}

fn read_memory_process_vm(pid: Pid, addr: u64, len: usize) -> Result<Vec<u8>, MemoryError> {
    let mut buf = vec![0u8; len];

    let local_iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: len,
    };
    let remote_iov = libc::iovec {
        iov_base: addr as *mut libc::c_void,
        iov_len: len,
    };

    let res = unsafe { libc::process_vm_readv(pid.as_raw(), &local_iov, 1, &remote_iov, 1, 0) };

    if res < 0 {
        return Err(MemoryError::Fault {
            addr,
            source: Errno::last(),
        });
    }

    buf.truncate(res as usize);
    Ok(buf)
}

fn read_memory_ptrace(pid: Pid, addr: u64, len: usize) -> Result<Vec<u8>, MemoryError> {
    let mut buf = Vec::with_capacity(len);
    let mut current_addr = addr;

    while buf.len() < len {
        match nix::sys::ptrace::read(pid, current_addr as *mut libc::c_void) {
            Ok(word) => {
                let bytes = word.to_ne_bytes();
                let to_copy = std::cmp::min(len - buf.len(), bytes.len());
                buf.extend_from_slice(&bytes[..to_copy]);
                current_addr += bytes.len() as u64;
            }
            Err(e) => {
                // Partial read is okay if we got some data
                if buf.is_empty() {
                    return Err(MemoryError::Fault { addr, source: e });
                }
                break;
            }
        }
    }

    Ok(buf)
}

/// Read a NUL-terminated string at `addr`, returning the bytes before the
/// terminator. A null `addr` yields an empty string without touching memory.
///
/// The chunk read from `addr` doubles until it contains a terminator, up to
/// [`MAX_CHUNK`] bytes.
pub fn read_cstring<M: TraceeMemory + ?Sized>(memory: &M, addr: u64) -> Result<Vec<u8>, MemoryError> {
    if addr == 0 {
        return Ok(Vec::new());
    }

    let mut size = INITIAL_CHUNK;
    loop {
        let mut chunk = memory.read(addr, size)?;

        if let Some(end) = chunk.iter().position(|&b| b == 0) {
            chunk.truncate(end);
            return Ok(chunk);
        }

        if chunk.len() < size {
            // The string runs into memory we cannot read.
            return Err(MemoryError::Fault {
                addr,
                source: Errno::EFAULT,
            });
        }

        if size >= MAX_CHUNK {
            return Err(MemoryError::Unterminated {
                addr,
                limit: MAX_CHUNK,
            });
        }

        size = (size * 2).min(MAX_CHUNK);
    }
}
