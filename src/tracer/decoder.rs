use super::arch::RegisterSnapshot;
use super::memory::{read_cstring, TraceeMemory};
use crate::error::MemoryError;
use crate::event::{Access, AccessKind, AccessMode};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

/// Where a tracked syscall keeps its path and open flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallDescriptor {
    pub number: u64,
    pub kind: AccessKind,
    pub path_arg: usize,
    pub flags_arg: Option<usize>,
}

/// Decode the access mode from the low three bits of an open flag word.
/// Creation, truncation and every other higher bit are ignored.
pub fn decode_access_mode(flags: u64) -> AccessMode {
    match flags % 8 {
        0 => AccessMode::ReadOnly,
        1 => AccessMode::WriteOnly,
        2 => AccessMode::ReadWrite,
        _ => AccessMode::Unknown,
    }
}

/// Make `raw` absolute against `base` and normalize it lexically.
/// Symlinks are not followed.
pub fn resolve_path(raw: &Path, base: &Path) -> PathBuf {
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        base.join(raw)
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::CurDir => {}
            Component::RootDir => out.push(Component::RootDir),
            Component::ParentDir => {
                // ".." at "/" stays at "/"
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// The directory tree accesses are reported for.
#[derive(Debug, Clone)]
pub struct RootBoundary {
    root: PathBuf,
}

impl RootBoundary {
    pub fn new(root: &Path) -> Self {
        Self {
            root: normalize(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True for the root itself and anything below it. Matching is per
    /// component, so `/a/bb` is not inside `/a/b`.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

/// Resolves tracee paths and keeps the ones inside the root boundary.
///
/// Relative paths are resolved against `resolution_base`, the monitor's own
/// working directory. A `chdir` made by the tracee does not move it, and
/// `openat` directory descriptors other than the cwd are not followed.
#[derive(Debug, Clone)]
pub struct AccessFilter {
    resolution_base: PathBuf,
    boundary: RootBoundary,
}

impl AccessFilter {
    pub fn new(resolution_base: &Path, root: &Path) -> Self {
        Self {
            resolution_base: normalize(resolution_base),
            boundary: RootBoundary::new(root),
        }
    }

    pub fn boundary(&self) -> &RootBoundary {
        &self.boundary
    }

    /// Returns the absolute path when it lies inside the root, `None` when the
    /// access is suppressed. An empty raw path is always suppressed.
    pub fn resolve_and_filter(&self, raw: &[u8]) -> Option<PathBuf> {
        if raw.is_empty() {
            return None;
        }
        let resolved = resolve_path(Path::new(OsStr::from_bytes(raw)), &self.resolution_base);
        self.boundary.contains(&resolved).then_some(resolved)
    }

    /// Decode one syscall-entry stop. `Ok(None)` covers both null path
    /// arguments and paths outside the root; `Err` means the path could not
    /// be read from the tracee.
    pub fn inspect<M: TraceeMemory + ?Sized>(
        &self,
        snapshot: &RegisterSnapshot,
        descriptor: &SyscallDescriptor,
        memory: &M,
    ) -> Result<Option<Access>, MemoryError> {
        let raw = read_cstring(memory, snapshot.arg(descriptor.path_arg))?;
        let Some(path) = self.resolve_and_filter(&raw) else {
            return Ok(None);
        };
        let path = path.to_string_lossy().into_owned();

        let raw_flags = descriptor.flags_arg.map(|i| snapshot.arg(i)).unwrap_or(0);
        let access_mode = decode_access_mode(raw_flags);

        let access = match descriptor.kind {
            AccessKind::Chdir => Access::Chdir { path },
            AccessKind::Open => Access::Open {
                path,
                access_mode,
                raw_flags,
            },
            AccessKind::Openat => Access::Openat {
                path,
                access_mode,
                raw_flags,
            },
        };
        Ok(Some(access))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::arch::x86_64::X86_64Arch;
    use crate::tracer::arch::Architecture;
    use crate::tracer::memory::tests::FakeMemory;

    const ROOT: &str = "/home/user/project";
    const PATH_ADDR: u64 = 0x7ffd_0000;
    const AT_FDCWD: u64 = -100i64 as u64;

    fn filter() -> AccessFilter {
        AccessFilter::new(Path::new(ROOT), Path::new(ROOT))
    }

    fn run(nr: u64, args: [u64; 6], path: &str) -> Result<Option<Access>, MemoryError> {
        let descriptor = X86_64Arch.classify(nr).expect("tracked syscall");
        let snapshot = RegisterSnapshot { number: nr, args };
        let memory = FakeMemory::with_string(PATH_ADDR, path);
        filter().inspect(&snapshot, descriptor, &memory)
    }

    #[test]
    fn access_mode_from_low_bits() {
        assert_eq!(decode_access_mode(0), AccessMode::ReadOnly);
        assert_eq!(decode_access_mode(1), AccessMode::WriteOnly);
        assert_eq!(decode_access_mode(2), AccessMode::ReadWrite);
        assert_eq!(decode_access_mode(3), AccessMode::Unknown);
        assert_eq!(decode_access_mode(7), AccessMode::Unknown);
    }

    #[test]
    fn access_mode_ignores_high_bits() {
        let o_creat_trunc = (libc::O_CREAT | libc::O_TRUNC) as u64;
        for flags in [0u64, 1, 2, 3, 4, 5, 6, 7] {
            assert_eq!(
                decode_access_mode(flags | o_creat_trunc | 0x8000_0000),
                decode_access_mode(flags)
            );
        }
        assert_eq!(
            decode_access_mode((libc::O_WRONLY | libc::O_CREAT | libc::O_CLOEXEC) as u64),
            AccessMode::WriteOnly
        );
    }

    #[test]
    fn resolve_relative_against_base() {
        assert_eq!(
            resolve_path(Path::new("./data.txt"), Path::new(ROOT)),
            PathBuf::from("/home/user/project/data.txt")
        );
        assert_eq!(
            resolve_path(Path::new("../sibling"), Path::new(ROOT)),
            PathBuf::from("/home/user/sibling")
        );
    }

    #[test]
    fn resolve_cleans_dots_and_trailing_slashes() {
        assert_eq!(
            resolve_path(Path::new("/a/./b/../c//d/"), Path::new("/unused")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(
            resolve_path(Path::new("/../../etc"), Path::new("/unused")),
            PathBuf::from("/etc")
        );
        assert_eq!(resolve_path(Path::new("."), Path::new("/x/y")), PathBuf::from("/x/y"));
    }

    #[test]
    fn boundary_includes_root_and_children() {
        let boundary = RootBoundary::new(Path::new("/a/b"));
        assert!(boundary.contains(Path::new("/a/b")));
        assert!(boundary.contains(Path::new("/a/b/x")));
        assert!(boundary.contains(Path::new("/a/b/x/y/z")));
    }

    #[test]
    fn boundary_excludes_string_prefix_siblings() {
        let boundary = RootBoundary::new(Path::new("/a/b"));
        assert!(!boundary.contains(Path::new("/a/bb")));
        assert!(!boundary.contains(Path::new("/a/b.txt")));
        assert!(!boundary.contains(Path::new("/a")));
        assert!(!boundary.contains(Path::new("/")));
    }

    #[test]
    fn boundary_normalizes_its_root() {
        let boundary = RootBoundary::new(Path::new("/a/b/"));
        assert_eq!(boundary.root(), Path::new("/a/b"));
        assert!(boundary.contains(Path::new("/a/b/c")));
    }

    #[test]
    fn empty_path_is_suppressed() {
        assert_eq!(filter().resolve_and_filter(b""), None);
    }

    #[test]
    fn dotdot_escape_is_suppressed() {
        assert_eq!(filter().resolve_and_filter(b"sub/../../project2/x"), None);
        assert_eq!(
            filter().resolve_and_filter(b"sub/../x"),
            Some(PathBuf::from("/home/user/project/x"))
        );
    }

    #[test]
    fn open_outside_root_is_suppressed() {
        let rdonly = libc::O_RDONLY as u64;
        let result = run(2, [PATH_ADDR, rdonly, 0, 0, 0, 0], "/etc/passwd").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn open_relative_inside_root() {
        let wronly = libc::O_WRONLY as u64;
        let result = run(2, [PATH_ADDR, wronly, 0o644, 0, 0, 0], "./data.txt").unwrap();
        assert_eq!(
            result,
            Some(Access::Open {
                path: "/home/user/project/data.txt".to_string(),
                access_mode: AccessMode::WriteOnly,
                raw_flags: wronly,
            })
        );
    }

    #[test]
    fn chdir_to_sibling_is_suppressed() {
        let result = run(80, [PATH_ADDR, 0, 0, 0, 0, 0], "../sibling").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn chdir_inside_root() {
        let result = run(80, [PATH_ADDR, 0, 0, 0, 0, 0], "src").unwrap();
        assert_eq!(
            result,
            Some(Access::Chdir {
                path: "/home/user/project/src".to_string(),
            })
        );
    }

    #[test]
    fn openat_cwd_inside_root() {
        let rdwr = libc::O_RDWR as u64;
        let result = run(257, [AT_FDCWD, PATH_ADDR, rdwr, 0, 0, 0], "sub/file").unwrap();
        assert_eq!(
            result,
            Some(Access::Openat {
                path: "/home/user/project/sub/file".to_string(),
                access_mode: AccessMode::ReadWrite,
                raw_flags: rdwr,
            })
        );
    }

    #[test]
    fn openat_reads_path_from_second_argument() {
        // A first-argument pointer must never be dereferenced for openat.
        let result = run(257, [PATH_ADDR, 0, 0, 0, 0, 0], "ignored").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn null_path_pointer_is_suppressed() {
        let result = run(2, [0, 0, 0, 0, 0, 0], "unused").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn unreadable_path_is_an_error() {
        let result = run(2, [0x10, 0, 0, 0, 0, 0], "unused");
        assert!(matches!(result, Err(MemoryError::Fault { addr: 0x10, .. })));
    }
}
