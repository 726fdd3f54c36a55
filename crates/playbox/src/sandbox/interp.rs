//! Snippet interpreter
//!
//! Executes one parsed [`Program`] from its entry point. Every run gets a
//! fresh `Interp` value, so no state can survive between runs. The
//! interpreter checks the stop signal and yields at every instruction
//! boundary, which keeps long-running snippets responsive to timeout and
//! cancellation without any forced thread termination.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::sandbox::program::{Instr, Program};
use crate::types::{FailureDetail, FaultKind, OutputChunk, StreamTag};

/// Bound on `call` nesting
const MAX_CALL_DEPTH: usize = 64;

/// Slice length for interruptible sleeps
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// How one interpreter run ended
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InterpOutcome {
    /// The entry point ran to completion
    Finished,

    /// The snippet faulted or ran over its memory budget
    Fault(FailureDetail),

    /// The stop signal was observed before completion
    Stopped,
}

struct Frame<'p> {
    body: &'p [Instr],
    pc: usize,
}

/// One run's interpreter state
pub(crate) struct Interp {
    seq: u64,
    used_bytes: u64,
    memory_cap: u64,
    tx: mpsc::Sender<OutputChunk>,
    stop: watch::Receiver<bool>,
}

impl Interp {
    pub(crate) fn new(
        memory_cap: u64,
        tx: mpsc::Sender<OutputChunk>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            seq: 0,
            used_bytes: 0,
            memory_cap,
            tx,
            stop,
        }
    }

    /// Run `entry` to completion, fault, or stop
    pub(crate) async fn run(mut self, program: &Program, entry: &str) -> InterpOutcome {
        let Some(body) = program.function(entry) else {
            return InterpOutcome::Fault(FailureDetail::RuntimeFault {
                kind: FaultKind::UnknownFunction,
                message: format!("entry point '{entry}' is not defined"),
            });
        };

        let mut stack = vec![Frame { body, pc: 0 }];

        while let Some(frame) = stack.last_mut() {
            if self.stopped() {
                return InterpOutcome::Stopped;
            }

            let Some(instr) = frame.body.get(frame.pc) else {
                stack.pop();
                continue;
            };
            frame.pc += 1;

            match instr {
                Instr::Print(text) => {
                    if let Some(outcome) = self.emit(StreamTag::Stdout, text.as_bytes()).await {
                        return outcome;
                    }
                }
                Instr::PrintErr(text) => {
                    if let Some(outcome) = self.emit(StreamTag::Stderr, text.as_bytes()).await {
                        return outcome;
                    }
                }
                Instr::Add(operands) => {
                    let mut sum: i64 = 0;
                    for value in operands {
                        sum = match sum.checked_add(*value) {
                            Some(sum) => sum,
                            None => {
                                return InterpOutcome::Fault(FailureDetail::RuntimeFault {
                                    kind: FaultKind::Arithmetic,
                                    message: "sum overflowed".to_string(),
                                });
                            }
                        };
                    }
                    let text = sum.to_string();
                    if let Some(outcome) = self.emit(StreamTag::Stdout, text.as_bytes()).await {
                        return outcome;
                    }
                }
                Instr::Sleep(ms) => {
                    if self.sleep(Duration::from_millis(*ms)).await {
                        return InterpOutcome::Stopped;
                    }
                }
                Instr::Loop(count) => {
                    let mut remaining = *count;
                    loop {
                        match remaining.as_mut() {
                            Some(0) => break,
                            Some(n) => *n -= 1,
                            None => {}
                        }
                        if self.stopped() {
                            return InterpOutcome::Stopped;
                        }
                        tokio::task::yield_now().await;
                    }
                }
                Instr::Alloc(bytes) => {
                    if let Some(fault) = self.charge(*bytes) {
                        return InterpOutcome::Fault(fault);
                    }
                }
                Instr::Fail(message) => {
                    return InterpOutcome::Fault(FailureDetail::RuntimeFault {
                        kind: FaultKind::Explicit,
                        message: message.clone(),
                    });
                }
                Instr::Call(name) => {
                    let Some(body) = program.function(name) else {
                        return InterpOutcome::Fault(FailureDetail::RuntimeFault {
                            kind: FaultKind::UnknownFunction,
                            message: format!("function '{name}' is not defined"),
                        });
                    };
                    if stack.len() >= MAX_CALL_DEPTH {
                        return InterpOutcome::Fault(FailureDetail::RuntimeFault {
                            kind: FaultKind::CallDepth,
                            message: format!("call depth exceeded {MAX_CALL_DEPTH}"),
                        });
                    }
                    stack.push(Frame { body, pc: 0 });
                }
            }

            tokio::task::yield_now().await;
        }

        debug!(chunks = self.seq, used_bytes = self.used_bytes, "snippet finished");
        InterpOutcome::Finished
    }

    fn stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Charge bytes against the memory budget
    fn charge(&mut self, bytes: u64) -> Option<FailureDetail> {
        self.used_bytes = self.used_bytes.saturating_add(bytes);
        if self.used_bytes > self.memory_cap {
            Some(FailureDetail::ResourceExceeded {
                used_bytes: self.used_bytes,
                cap_bytes: self.memory_cap,
            })
        } else {
            None
        }
    }

    /// Send one output chunk; returns a terminal outcome on budget or channel failure
    async fn emit(&mut self, stream: StreamTag, data: &[u8]) -> Option<InterpOutcome> {
        if let Some(fault) = self.charge(data.len() as u64) {
            return Some(InterpOutcome::Fault(fault));
        }

        let chunk = OutputChunk {
            seq: self.seq,
            stream,
            data: data.to_vec(),
        };
        self.seq += 1;

        // The receiver is dropped once the sandbox stops collecting; treat a
        // closed channel like an observed stop signal.
        match self.tx.send(chunk).await {
            Ok(()) => None,
            Err(_) => Some(InterpOutcome::Stopped),
        }
    }

    /// Sleep in slices, returning true if stopped mid-sleep
    async fn sleep(&mut self, total: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            let slice = remaining.min(SLEEP_SLICE);
            tokio::select! {
                _ = tokio::time::sleep(slice) => {}
                _ = self.stop.changed() => {
                    if self.stopped() {
                        return true;
                    }
                }
            }
            remaining = remaining.saturating_sub(slice);
        }
        false
    }
}
