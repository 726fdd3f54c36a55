//! A sandboxed runner for playground code snippets.
//!
//! Playbox executes named, self-contained example snippets in isolation:
//! each run gets a fresh execution context, a wall clock deadline, and a
//! memory budget, and its output is captured as a deterministic, ordered
//! event log.
//!
//! # Features
//!
//! - **Snippet registry** — In-memory catalog of immutable snippets with
//!   replace-or-conflict registration and removal guarded by in-flight runs.
//! - **Sandboxed execution** — One disposable interpreter per run; faults
//!   never cross the sandbox boundary.
//! - **Deterministic capture** — Output as sequence-numbered, stream-tagged
//!   chunks folded into a final immutable result.
//! - **Scheduling** — Bounded worker pool, stable two-class priority queue,
//!   queue-wait timeouts, and cooperative cancellation.
//! - **TOML configuration** — Every policy number is configurable.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, ReplacePolicy};
pub use registry::{DEFAULT_ENTRY_POINT, InFlightSet, RegistryError, Snippet, SnippetRegistry};
pub use sandbox::{OutputCapture, ParseError, Program, Sandbox, SandboxOutcome};
pub use scheduler::{CancelError, RunHandle, RunScheduler, SubmitError};
pub use types::{
    FailureDetail, FaultKind, OutputChunk, Priority, RunLimits, RunRequest, RunResult, RunStatus,
    RunToken, StreamTag,
};

pub mod config;
pub mod registry;
pub mod sandbox;
pub mod scheduler;
pub mod types;
