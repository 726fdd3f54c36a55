//! Per-run execution sandbox
//!
//! Runs exactly one snippet in a fresh, disposable execution context and
//! forwards its output as an ordered event stream. The sandbox enforces the
//! wall clock deadline and relays cancellation; the interpreter enforces the
//! memory budget. Faults inside the snippet are converted into a terminal
//! outcome and never propagate to the caller.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

pub use crate::sandbox::capture::OutputCapture;
use crate::sandbox::interp::{Interp, InterpOutcome};
pub use crate::sandbox::program::{ParseError, Program};

use crate::registry::Snippet;
use crate::types::{FailureDetail, FaultKind, OutputChunk, RunLimits, RunStatus};

pub mod capture;
mod interp;
pub mod program;

/// Buffered output chunks between the interpreter and the collector
const OUTPUT_CHANNEL_CAPACITY: usize = 128;

/// How one sandboxed run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOutcome {
    /// Terminal status of the run
    pub status: RunStatus,

    /// Structured detail when status is `Failed`
    pub failure: Option<FailureDetail>,
}

impl SandboxOutcome {
    fn completed() -> Self {
        Self {
            status: RunStatus::Completed,
            failure: None,
        }
    }

    fn failed(failure: FailureDetail) -> Self {
        Self {
            status: RunStatus::Failed,
            failure: Some(failure),
        }
    }

    fn terminal(status: RunStatus) -> Self {
        Self {
            status,
            failure: None,
        }
    }
}

/// Executes one snippet per call, each in a fresh execution context
#[derive(Debug, Clone)]
pub struct Sandbox {
    /// Time granted for cooperative unwind after a stop signal
    grace: Duration,
}

impl Sandbox {
    /// Create a sandbox with the given stop grace period
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Execute `snippet` under `limits`, forwarding output to `on_output`
    ///
    /// `limits` are the fully resolved effective limits for this run. The
    /// `cancel` channel requests early termination; output chunks delivered
    /// before the stop signal are forwarded, later ones are discarded.
    ///
    /// This method always returns a terminal outcome. Snippet faults,
    /// including interpreter task panics, surface as `Failed` with detail.
    #[instrument(skip_all, fields(snippet = %snippet.id()))]
    pub async fn run<F>(
        &self,
        snippet: &Snippet,
        limits: &RunLimits,
        mut cancel: watch::Receiver<bool>,
        mut on_output: F,
    ) -> SandboxOutcome
    where
        F: FnMut(OutputChunk),
    {
        let program = match program::parse(snippet.source()) {
            Ok(program) => program,
            Err(err) => {
                debug!(%err, "snippet source rejected");
                return SandboxOutcome::failed(FailureDetail::RuntimeFault {
                    kind: FaultKind::Parse,
                    message: err.to_string(),
                });
            }
        };

        let deadline = Instant::now() + limits.wall_time();
        let (tx, mut rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);

        // Fresh interpreter state per run; nothing is shared with earlier or
        // concurrent runs.
        let interp = Interp::new(limits.memory_cap(), tx, stop_rx);
        let entry = snippet.entry_point().to_string();
        let mut task = tokio::spawn(async move { interp.run(&program, &entry).await });

        // Forward output until the interpreter finishes or a stop condition
        // fires. A run whose caller dropped the cancel sender simply becomes
        // uncancellable; it still honors its deadline.
        let mut stop_status: Option<RunStatus> = None;
        let mut cancel_open = true;
        loop {
            tokio::select! {
                biased;

                changed = cancel.changed(), if cancel_open => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            debug!("cancellation requested");
                            stop_status = Some(RunStatus::Cancelled);
                        }
                        Ok(()) => {}
                        Err(_) => cancel_open = false,
                    }
                }

                _ = tokio::time::sleep_until(deadline) => {
                    debug!("wall clock deadline reached");
                    stop_status = Some(RunStatus::TimedOut);
                }

                chunk = rx.recv() => {
                    match chunk {
                        Some(chunk) => on_output(chunk),
                        None => break,
                    }
                }
            }

            if stop_status.is_some() {
                break;
            }
        }

        if stop_status.is_some() {
            let _ = stop_tx.send(true);
        }
        // Closing the channel unblocks any in-flight send; the interpreter
        // treats it like an observed stop signal.
        drop(rx);

        let outcome = match tokio::time::timeout(self.grace, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    grace_ms = self.grace.as_millis() as u64,
                    "grace period expired, aborting run"
                );
                task.abort();
                task.await
            }
        };

        match (stop_status, outcome) {
            // A stop signal takes precedence over whatever the interpreter
            // reported while unwinding.
            (Some(status), _) => SandboxOutcome::terminal(status),
            (None, Ok(InterpOutcome::Finished)) => SandboxOutcome::completed(),
            (None, Ok(InterpOutcome::Fault(failure))) => SandboxOutcome::failed(failure),
            (None, Ok(InterpOutcome::Stopped)) => {
                // Only reachable if the interpreter lost its channel without a
                // stop signal; report it rather than losing the run.
                SandboxOutcome::failed(FailureDetail::RuntimeFault {
                    kind: FaultKind::Internal,
                    message: "interpreter stopped without a stop signal".to_string(),
                })
            }
            (None, Err(join_err)) => {
                warn!(%join_err, "interpreter task died");
                SandboxOutcome::failed(FailureDetail::RuntimeFault {
                    kind: FaultKind::Internal,
                    message: join_err.to_string(),
                })
            }
        }
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::defaults::GRACE_MS))
    }
}
