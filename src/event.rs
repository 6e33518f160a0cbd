use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TraceEvent {
    Access(AccessEvent),
    Process(ProcessEvent),
    Summary(TraceSummary),
}

/// A tracked syscall whose path resolved inside the root boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub timestamp: DateTime<Utc>,
    pub pid: i32,
    pub syscall_nr: u64,
    #[serde(flatten)]
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Access {
    Chdir {
        path: String,
    },
    Open {
        path: String,
        access_mode: AccessMode,
        raw_flags: u64,
    },
    Openat {
        path: String,
        access_mode: AccessMode,
        raw_flags: u64,
    },
}

impl Access {
    pub fn kind(&self) -> AccessKind {
        match self {
            Access::Chdir { .. } => AccessKind::Chdir,
            Access::Open { .. } => AccessKind::Open,
            Access::Openat { .. } => AccessKind::Openat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Chdir,
    Open,
    Openat,
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessKind::Chdir => write!(f, "chdir"),
            AccessKind::Open => write!(f, "open"),
            AccessKind::Openat => write!(f, "openat"),
        }
    }
}

/// Read/write intent carried in the low bits of an open flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    Unknown,
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessMode::ReadOnly => write!(f, "read_only"),
            AccessMode::WriteOnly => write!(f, "write_only"),
            AccessMode::ReadWrite => write!(f, "read_write"),
            AccessMode::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProcessEvent {
    Exited {
        timestamp: DateTime<Utc>,
        pid: i32,
        exit_code: i32,
    },
    Signaled {
        timestamp: DateTime<Utc>,
        pid: i32,
        signal: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub timestamp: DateTime<Utc>,
    pub syscall_stops: u64,
    pub tracked_entries: u64,
    pub accesses: u64,
    pub read_failures: u64,
    pub duration_ms: u64,
    pub exit_code: i32,
}

impl TraceEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TraceEvent::Access(e) => e.timestamp,
            TraceEvent::Process(e) => match e {
                ProcessEvent::Exited { timestamp, .. } => *timestamp,
                ProcessEvent::Signaled { timestamp, .. } => *timestamp,
            },
            TraceEvent::Summary(e) => e.timestamp,
        }
    }
}
