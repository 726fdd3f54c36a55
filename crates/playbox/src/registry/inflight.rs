//! In-flight run reference counts
//!
//! The scheduler checks snippets out for the lifetime of a run; the registry
//! consults the same set before removal. Both paths take this lock first, so
//! a removal can never race an admission referencing the same snippet.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Reference counts of snippets held by in-flight runs
#[derive(Debug, Default)]
pub struct InFlightSet {
    counts: Mutex<HashMap<String, usize>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<String, usize>> {
        self.counts.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Check if any in-flight run references the id
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Number of in-flight references to the id
    pub fn count(&self, id: &str) -> usize {
        self.lock().get(id).copied().unwrap_or(0)
    }

    /// Total in-flight references across all snippets
    pub fn total(&self) -> usize {
        self.lock().values().sum()
    }

    /// Drop one reference to the id
    pub(crate) fn release(&self, id: &str) {
        let mut counts = self.lock();
        match counts.get_mut(id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                counts.remove(id);
            }
            None => {}
        }
    }
}
