//! Deterministic output capture
//!
//! Consumes the ordered `(seq, stream, bytes)` events a sandbox run produces
//! and folds them into the two final byte sequences of a [`RunResult`]. The
//! producer side is a single interpreter task, so events arrive in sequence
//! order; the capture still verifies monotonicity and logs regressions.

use std::time::Duration;

use tracing::warn;

use crate::types::{FailureDetail, OutputChunk, RunResult, RunStatus, StreamTag};

/// Accumulates the output of one run
#[derive(Debug, Default)]
pub struct OutputCapture {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    last_seq: Option<u64>,
    chunks: u64,
}

impl OutputCapture {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one output chunk
    pub fn record(&mut self, chunk: OutputChunk) {
        if let Some(last) = self.last_seq
            && chunk.seq <= last
        {
            warn!(seq = chunk.seq, last, "output sequence went backwards");
        }
        self.last_seq = Some(chunk.seq);
        self.chunks += 1;

        match chunk.stream {
            StreamTag::Stdout => self.stdout.extend_from_slice(&chunk.data),
            StreamTag::Stderr => self.stderr.extend_from_slice(&chunk.data),
        }
    }

    /// Number of chunks recorded so far
    pub fn chunk_count(&self) -> u64 {
        self.chunks
    }

    /// Total bytes captured across both streams
    pub fn captured_bytes(&self) -> usize {
        self.stdout.len() + self.stderr.len()
    }

    /// Assemble the final immutable result
    pub fn into_run_result(
        self,
        snippet_id: impl Into<String>,
        status: RunStatus,
        failure: Option<FailureDetail>,
        duration: Duration,
    ) -> RunResult {
        RunResult {
            snippet_id: snippet_id.into(),
            status,
            stdout: self.stdout,
            stderr: self.stderr,
            duration,
            failure,
        }
    }
}
