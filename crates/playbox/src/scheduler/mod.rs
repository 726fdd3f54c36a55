//! Run scheduler
//!
//! Accepts run requests, enforces the concurrency cap via a stable priority
//! admission queue, hands admitted runs to fresh sandboxes on their own
//! tasks, and delivers exactly one terminal [`RunResult`] per request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::registry::SnippetRegistry;
use crate::sandbox::{OutputCapture, Sandbox};
use crate::scheduler::queue::{AdmissionQueue, Waiter};
use crate::types::{
    FailureDetail, FaultKind, RunLimits, RunRequest, RunResult, RunStatus, RunToken,
};

mod queue;

/// Errors returned synchronously on submission
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("snippet '{0}' is not registered")]
    NotFound(String),

    #[error("no worker slot freed up within {waited_ms}ms")]
    QueueTimeout { waited_ms: u64 },
}

/// Errors returned on cancellation
#[derive(Debug, Error)]
pub enum CancelError {
    #[error("{0} is unknown or already terminal")]
    NotFoundOrAlreadyTerminal(RunToken),
}

/// Handle to a submitted run
///
/// Carries the run token for cancellation and resolves to the terminal
/// result exactly once.
#[derive(Debug)]
pub struct RunHandle {
    token: RunToken,
    snippet_id: String,
    result: oneshot::Receiver<RunResult>,
}

impl RunHandle {
    /// Token identifying this run for cancellation
    pub fn token(&self) -> RunToken {
        self.token
    }

    /// Id of the snippet being run
    pub fn snippet_id(&self) -> &str {
        &self.snippet_id
    }

    /// Wait for the terminal result
    pub async fn outcome(self) -> RunResult {
        let snippet_id = self.snippet_id;
        self.result.await.unwrap_or_else(|_| {
            // The run task dropped its sender without a result; this is a
            // scheduler defect, but the caller still gets a terminal answer.
            warn!(snippet = %snippet_id, "run task dropped without delivering a result");
            RunResult {
                snippet_id,
                status: RunStatus::Failed,
                stdout: Vec::new(),
                stderr: Vec::new(),
                duration: Duration::ZERO,
                failure: Some(FailureDetail::RuntimeFault {
                    kind: FaultKind::Internal,
                    message: "run task dropped without delivering a result".to_string(),
                }),
            }
        })
    }
}

#[derive(Debug)]
struct SchedState {
    running: usize,
    queue: AdmissionQueue,
}

/// One granted worker slot
///
/// Dropping the permit frees the slot and admits the next live waiter, so a
/// slot can never leak, even if the submitting future is dropped mid-grant.
#[derive(Debug)]
pub(crate) struct SlotPermit {
    state: Arc<Mutex<SchedState>>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        release_slot(&self.state);
    }
}

/// Holds the in-flight registry reference for the lifetime of one run
#[derive(Debug)]
struct SnippetLease {
    registry: Arc<SnippetRegistry>,
    id: String,
}

impl Drop for SnippetLease {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}

/// Admission-controlled executor of snippet runs
#[derive(Debug)]
pub struct RunScheduler {
    registry: Arc<SnippetRegistry>,
    concurrency: usize,
    queue_wait: Duration,
    grace: Duration,
    default_limits: RunLimits,
    state: Arc<Mutex<SchedState>>,
    active: Arc<Mutex<HashMap<RunToken, watch::Sender<bool>>>>,
    next_token: AtomicU64,
}

impl RunScheduler {
    /// Create a scheduler over the given registry
    pub fn new(config: &Config, registry: Arc<SnippetRegistry>) -> Self {
        Self {
            registry,
            concurrency: config.concurrency,
            queue_wait: Duration::from_millis(config.queue_wait_ms),
            grace: Duration::from_millis(config.grace_ms),
            default_limits: config.default_limits.clone(),
            state: Arc::new(Mutex::new(SchedState {
                running: 0,
                queue: AdmissionQueue::new(),
            })),
            active: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(1),
        }
    }

    /// Submit a request and wait for its terminal result
    ///
    /// The submit-and-wait form of [`submit`](Self::submit). Resubmitting
    /// after a failure is a brand-new request; the scheduler never retries.
    pub async fn run(&self, request: RunRequest) -> Result<RunResult, SubmitError> {
        let handle = self.submit(request).await?;
        Ok(handle.outcome().await)
    }

    /// Submit a request, blocking in the admission queue if all workers are
    /// busy, and return a handle once the run is admitted
    ///
    /// Fails with [`SubmitError::NotFound`] if the snippet is not registered
    /// and [`SubmitError::QueueTimeout`] if no worker slot frees up within
    /// the configured queue wait.
    #[instrument(skip_all, fields(snippet = %request.snippet_id))]
    pub async fn submit(&self, request: RunRequest) -> Result<RunHandle, SubmitError> {
        // The lease keeps the snippet removable only after this run (and any
        // other holder) reaches a terminal status.
        let snippet = self
            .registry
            .checkout(&request.snippet_id)
            .map_err(|_| SubmitError::NotFound(request.snippet_id.clone()))?;
        let lease = SnippetLease {
            registry: Arc::clone(&self.registry),
            id: snippet.id().to_string(),
        };

        let mut limits = self.default_limits.with_overrides(snippet.limits());
        if let Some(ms) = request.timeout_override_ms {
            limits = limits.with_overrides(&RunLimits::new().with_wall_time_ms(ms));
        }

        let token = RunToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let submitted_at = Instant::now();
        let permit = self.admit(token, &request, submitted_at).await?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        lock(&self.active).insert(token, cancel_tx);

        let (result_tx, result_rx) = oneshot::channel();
        let active = Arc::clone(&self.active);
        let grace = self.grace;
        let snippet_id = snippet.id().to_string();

        info!(%token, snippet = %snippet_id, "run admitted");

        tokio::spawn(async move {
            let sandbox = Sandbox::new(grace);
            let mut capture = OutputCapture::new();
            let started = Instant::now();

            let outcome = sandbox
                .run(&snippet, &limits, cancel_rx, |chunk| capture.record(chunk))
                .await;

            let result = capture.into_run_result(
                snippet.id(),
                outcome.status,
                outcome.failure,
                started.elapsed(),
            );

            debug!(%token, status = %result.status, "run terminal");

            // Terminal bookkeeping before the result is visible: cancel must
            // see the run as gone, and the snippet and slot must free up.
            lock(&active).remove(&token);
            drop(lease);
            drop(permit);

            let _ = result_tx.send(result);
        });

        Ok(RunHandle {
            token,
            snippet_id,
            result: result_rx,
        })
    }

    /// Request cancellation of an in-flight run
    ///
    /// Succeeds at most once per run; an unknown token or a run that already
    /// reached a terminal status is an error. The run winds down
    /// cooperatively and its result reports `Cancelled`.
    pub fn cancel(&self, token: RunToken) -> Result<(), CancelError> {
        let active = lock(&self.active);
        match active.get(&token) {
            Some(cancel_tx) if cancel_tx.send(true).is_ok() => {
                debug!(%token, "cancellation requested");
                Ok(())
            }
            _ => Err(CancelError::NotFoundOrAlreadyTerminal(token)),
        }
    }

    /// Number of runs currently occupying workers
    pub fn running(&self) -> usize {
        lock(&self.state).running
    }

    /// Number of requests waiting for admission
    pub fn queued(&self) -> usize {
        lock(&self.state).queue.len()
    }

    /// Concurrency cap
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Wait for a worker slot, honoring the queue-wait timeout
    async fn admit(
        &self,
        token: RunToken,
        request: &RunRequest,
        submitted_at: Instant,
    ) -> Result<SlotPermit, SubmitError> {
        let mut grant_rx = {
            let mut state = lock(&self.state);
            if state.running < self.concurrency {
                state.running += 1;
                return Ok(SlotPermit {
                    state: Arc::clone(&self.state),
                });
            }

            let (grant, grant_rx) = oneshot::channel();
            state.queue.push(
                request.priority,
                Waiter {
                    token,
                    grant,
                    queued_at: submitted_at,
                },
            );
            grant_rx
        };

        debug!(%token, priority = ?request.priority, "queued for admission");

        match tokio::time::timeout(self.queue_wait, &mut grant_rx).await {
            Ok(Ok(permit)) => Ok(permit),
            // The grant sender only disappears with the scheduler itself.
            Ok(Err(_)) => Err(SubmitError::QueueTimeout {
                waited_ms: submitted_at.elapsed().as_millis() as u64,
            }),
            Err(_) => {
                // A grant may have raced the timeout; if it did, the slot is
                // ours and the run proceeds.
                match grant_rx.try_recv() {
                    Ok(permit) => Ok(permit),
                    _ => {
                        debug!(%token, "queue wait expired");
                        Err(SubmitError::QueueTimeout {
                            waited_ms: submitted_at.elapsed().as_millis() as u64,
                        })
                    }
                }
            }
        }
    }
}

/// Free a worker slot and grant it to the next live waiter
///
/// A grant that cannot be delivered comes back as a permit; dropping it
/// outside the lock re-enters this function and moves on to the next waiter.
fn release_slot(state: &Arc<Mutex<SchedState>>) {
    let mut undeliverable = None;
    {
        let mut locked = lock(state);
        locked.running = locked.running.saturating_sub(1);

        if let Some(waiter) = locked.queue.pop_next() {
            locked.running += 1;
            let waited = waiter.queued_at.elapsed();
            let permit = SlotPermit {
                state: Arc::clone(state),
            };
            match waiter.grant.send(permit) {
                Ok(()) => {
                    debug!(
                        token = %waiter.token,
                        waited_ms = waited.as_millis() as u64,
                        "admitted from queue"
                    );
                }
                Err(permit) => {
                    // The waiter gave up (queue timeout); try the next one.
                    debug!(token = %waiter.token, "skipping abandoned waiter");
                    undeliverable = Some(permit);
                }
            }
        }
    }
    drop(undeliverable);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}
