//! Admission queue
//!
//! A stable two-class priority queue of waiting run requests. High-priority
//! waiters are granted before normal ones regardless of arrival time; within
//! a class, order is first-in first-out.

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::scheduler::SlotPermit;
use crate::types::{Priority, RunToken};

/// One queued run waiting for a worker slot
#[derive(Debug)]
pub(crate) struct Waiter {
    pub(crate) token: RunToken,
    pub(crate) grant: oneshot::Sender<SlotPermit>,
    pub(crate) queued_at: Instant,
}

#[derive(Debug, Default)]
pub(crate) struct AdmissionQueue {
    high: VecDeque<Waiter>,
    normal: VecDeque<Waiter>,
}

impl AdmissionQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a waiter to its priority class
    pub(crate) fn push(&mut self, priority: Priority, waiter: Waiter) {
        match priority {
            Priority::High => self.high.push_back(waiter),
            Priority::Normal => self.normal.push_back(waiter),
        }
    }

    /// Take the next waiter: high before normal, FIFO within a class
    pub(crate) fn pop_next(&mut self) -> Option<Waiter> {
        self.high.pop_front().or_else(|| self.normal.pop_front())
    }

    pub(crate) fn len(&self) -> usize {
        self.high.len() + self.normal.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.high.is_empty() && self.normal.is_empty()
    }
}
