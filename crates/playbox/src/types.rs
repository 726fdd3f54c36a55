use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunLimits {
    /// Wall clock time limit in milliseconds
    #[serde(default)]
    pub wall_time_ms: Option<u64>,

    /// Memory budget in bytes (scratch allocations plus emitted output)
    #[serde(default)]
    pub memory_cap_bytes: Option<u64>,
}

impl RunLimits {
    /// 1 kibibyte in bytes
    pub const KIB: u64 = 1024;
    /// 1 mebibyte in bytes
    pub const MIB: u64 = 1024 * 1024;

    /// Create new limits with all fields unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wall clock time limit in milliseconds
    pub fn with_wall_time_ms(mut self, ms: u64) -> Self {
        self.wall_time_ms = Some(ms);
        self
    }

    /// Set the memory budget in bytes
    pub fn with_memory_cap_bytes(mut self, bytes: u64) -> Self {
        self.memory_cap_bytes = Some(bytes);
        self
    }

    /// Apply overrides from another RunLimits, preferring values from `overrides`
    ///
    /// Returns a new RunLimits with values from `overrides` taking precedence
    /// over values from `self` when both are present.
    pub fn with_overrides(&self, overrides: &RunLimits) -> RunLimits {
        RunLimits {
            wall_time_ms: overrides.wall_time_ms.or(self.wall_time_ms),
            memory_cap_bytes: overrides.memory_cap_bytes.or(self.memory_cap_bytes),
        }
    }

    /// Wall clock limit as a Duration, falling back to the library default
    pub fn wall_time(&self) -> Duration {
        Duration::from_millis(self.wall_time_ms.unwrap_or(defaults::WALL_TIME_MS))
    }

    /// Memory budget in bytes, falling back to the library default
    pub fn memory_cap(&self) -> u64 {
        self.memory_cap_bytes.unwrap_or(defaults::MEMORY_CAP_BYTES)
    }
}

/// Fallback limit values used when neither the snippet nor the configuration
/// specifies one.
pub mod defaults {
    /// Default wall clock limit in milliseconds
    pub const WALL_TIME_MS: u64 = 2_000;
    /// Default memory budget in bytes (16 MiB)
    pub const MEMORY_CAP_BYTES: u64 = 16 * 1024 * 1024;
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Snippet ran to the end of its entry point
    Completed,

    /// Wall clock budget was exceeded and the run was stopped
    TimedOut,

    /// The caller cancelled the run before it finished
    Cancelled,

    /// The snippet faulted or exceeded its memory budget
    Failed,
}

impl RunStatus {
    /// Check if the run completed without fault, timeout, or cancellation
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::TimedOut => "timed_out",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Kind of runtime fault raised inside a snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Source text did not parse
    Parse,
    /// Entry point or called function is not defined
    UnknownFunction,
    /// Call depth bound exceeded
    CallDepth,
    /// Arithmetic overflow
    Arithmetic,
    /// The snippet raised a fault explicitly
    Explicit,
    /// The interpreter task itself died
    Internal,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FaultKind::Parse => "parse",
            FaultKind::UnknownFunction => "unknown_function",
            FaultKind::CallDepth => "call_depth",
            FaultKind::Arithmetic => "arithmetic",
            FaultKind::Explicit => "explicit",
            FaultKind::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

/// Structured detail attached to a `Failed` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDetail {
    /// An uncaught fault inside the snippet
    RuntimeFault { kind: FaultKind, message: String },

    /// The memory budget was exceeded
    ResourceExceeded { used_bytes: u64, cap_bytes: u64 },
}

impl std::fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureDetail::RuntimeFault { kind, message } => {
                write!(f, "runtime fault ({kind}): {message}")
            }
            FailureDetail::ResourceExceeded {
                used_bytes,
                cap_bytes,
            } => {
                write!(
                    f,
                    "memory budget exceeded: {used_bytes} of {cap_bytes} bytes"
                )
            }
        }
    }
}

/// Which standard stream a chunk of output was written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamTag {
    Stdout,
    Stderr,
}

/// One write produced by a snippet, ordered by sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Monotonically increasing within one run
    pub seq: u64,

    /// Stream the bytes were written to
    pub stream: StreamTag,

    /// Raw payload
    pub data: Vec<u8>,
}

/// Priority class of a run request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Opaque handle identifying an in-flight run, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunToken(pub(crate) u64);

impl RunToken {
    /// Reconstruct a token from its raw value (e.g. from a wire format)
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RunToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// A request to execute a registered snippet
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Id of the snippet to run
    pub snippet_id: String,

    /// Priority class for admission
    pub priority: Priority,

    /// Wall clock override applied on top of the snippet's declared limit
    pub timeout_override_ms: Option<u64>,
}

impl RunRequest {
    /// Create a request with normal priority and no overrides
    pub fn new(snippet_id: impl Into<String>) -> Self {
        Self {
            snippet_id: snippet_id.into(),
            priority: Priority::Normal,
            timeout_override_ms: None,
        }
    }

    /// Set the priority class
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Override the wall clock limit for this run only
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_override_ms = Some(ms);
        self
    }
}

/// Outcome of one run
///
/// Produced exactly once per request. Both output buffers are always present;
/// a run that wrote nothing yields empty buffers, not absent ones.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Id of the snippet that ran
    pub snippet_id: String,

    /// Terminal status
    pub status: RunStatus,

    /// Captured standard output, in production order
    pub stdout: Vec<u8>,

    /// Captured standard error, in production order
    pub stderr: Vec<u8>,

    /// Wall clock duration of the run
    pub duration: Duration,

    /// Structured detail when status is `Failed`
    pub failure: Option<FailureDetail>,
}

impl RunResult {
    /// Check if the run completed successfully
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Captured stdout decoded lossily as UTF-8
    pub fn stdout_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Captured stderr decoded lossily as UTF-8
    pub fn stderr_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}
