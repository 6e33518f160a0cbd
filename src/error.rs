use thiserror::Error;

#[derive(Error, Debug)]
pub enum RootwatchError {
    #[error("Tracer error: {0}")]
    Tracer(#[from] TracerError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Error, Debug)]
pub enum TracerError {
    #[error("Failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Ptrace error: {0}")]
    Ptrace(#[source] nix::Error),

    #[error("Failed to read registers of pid {pid}: {source}")]
    Registers {
        pid: i32,
        #[source]
        source: nix::Error,
    },

    #[error("Wait failed: {0}")]
    Wait(#[source] nix::Error),

    #[error("Unexpected stop while launching tracee: {0}")]
    UnexpectedStop(String),

    #[error("Architecture not supported: {0}")]
    #[cfg_attr(
        all(not(test), any(target_arch = "x86_64", target_arch = "aarch64")),
        allow(dead_code)
    )]
    UnsupportedArch(String),
}

/// Per-event failures while pulling a string out of the tracee.
/// These never abort a trace run.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory read failed at {addr:#x}: {source}")]
    Fault {
        addr: u64,
        #[source]
        source: nix::Error,
    },

    #[error("No string terminator within {limit} bytes of {addr:#x}")]
    Unterminated { addr: u64, limit: usize },
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RootwatchError>;
