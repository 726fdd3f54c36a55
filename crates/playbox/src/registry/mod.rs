//! Snippet catalog
//!
//! An in-memory map from snippet id to immutable snippet. Lookups are cheap
//! and concurrent; mutation is serialized. Removal is refused while any
//! in-flight run still references the snippet.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::debug;

pub use crate::registry::inflight::InFlightSet;
pub use crate::registry::snippet::{DEFAULT_ENTRY_POINT, Snippet};

use crate::config::ReplacePolicy;

mod inflight;
mod snippet;

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("snippet '{0}' is not registered")]
    NotFound(String),

    #[error("snippet '{0}' is already registered and the policy forbids replacement")]
    DuplicateId(String),

    #[error("snippet '{0}' is referenced by an in-flight run")]
    InUse(String),

    #[error("invalid snippet: {0}")]
    InvalidSnippet(String),
}

/// In-memory snippet catalog
#[derive(Debug)]
pub struct SnippetRegistry {
    snippets: RwLock<HashMap<String, Arc<Snippet>>>,
    in_flight: Arc<InFlightSet>,
    replace_policy: ReplacePolicy,
}

impl SnippetRegistry {
    /// Create a registry with the given replacement policy
    pub fn new(replace_policy: ReplacePolicy) -> Self {
        Self {
            snippets: RwLock::new(HashMap::new()),
            in_flight: Arc::new(InFlightSet::new()),
            replace_policy,
        }
    }

    /// Register a snippet
    ///
    /// With [`ReplacePolicy::Replace`] (the default policy) an existing id is
    /// replaced atomically; in-flight runs keep the snippet they checked out.
    /// With [`ReplacePolicy::Conflict`] an existing id is an error.
    pub fn register(&self, snippet: Snippet) -> Result<(), RegistryError> {
        snippet.validate()?;

        let mut snippets = self.write();
        if snippets.contains_key(snippet.id()) && self.replace_policy == ReplacePolicy::Conflict {
            return Err(RegistryError::DuplicateId(snippet.id().to_string()));
        }

        debug!(id = snippet.id(), "registered snippet");
        snippets.insert(snippet.id().to_string(), Arc::new(snippet));
        Ok(())
    }

    /// Look up a snippet by id
    pub fn lookup(&self, id: &str) -> Result<Arc<Snippet>, RegistryError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Remove a snippet
    ///
    /// Fails with [`RegistryError::InUse`] while any in-flight run references
    /// the id. The in-flight lock is held across the removal so a checkout
    /// cannot slip in between the check and the removal.
    pub fn remove(&self, id: &str) -> Result<(), RegistryError> {
        let counts = self.in_flight.lock();
        if counts.contains_key(id) {
            return Err(RegistryError::InUse(id.to_string()));
        }

        let removed = self.write().remove(id);
        drop(counts);

        match removed {
            Some(_) => {
                debug!(id, "removed snippet");
                Ok(())
            }
            None => Err(RegistryError::NotFound(id.to_string())),
        }
    }

    /// Look up a snippet and take an in-flight reference to it
    ///
    /// The reference blocks removal until [`release`](Self::release) is
    /// called. Used by the scheduler for the lifetime of a run.
    pub(crate) fn checkout(&self, id: &str) -> Result<Arc<Snippet>, RegistryError> {
        let mut counts = self.in_flight.lock();
        let snippet = self
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        *counts.entry(id.to_string()).or_insert(0) += 1;
        Ok(snippet)
    }

    /// Drop one in-flight reference
    pub(crate) fn release(&self, id: &str) {
        self.in_flight.release(id);
    }

    /// The in-flight reference set shared with the scheduler
    pub fn in_flight(&self) -> Arc<InFlightSet> {
        Arc::clone(&self.in_flight)
    }

    /// Registered snippet ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered snippets
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the registry holds no snippets
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Snippet>>> {
        self.snippets
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Snippet>>> {
        self.snippets
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Default for SnippetRegistry {
    fn default() -> Self {
        Self::new(ReplacePolicy::Replace)
    }
}
