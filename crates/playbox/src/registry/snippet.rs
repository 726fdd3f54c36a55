use serde::{Deserialize, Serialize};

use crate::registry::RegistryError;
use crate::types::RunLimits;

/// Default entry point when a snippet does not declare one
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// A named, self-contained unit of playground code
///
/// Snippets are immutable once registered. Re-registering an id replaces the
/// stored snippet wholesale; in-flight runs keep the copy they checked out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    /// Unique identifier
    id: String,

    /// Source text in the playground snippet format
    source: String,

    /// Function to execute
    #[serde(default = "default_entry_point")]
    entry_point: String,

    /// Declared resource limits; unset fields use configured defaults
    #[serde(default)]
    limits: RunLimits,
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}

impl Snippet {
    /// Create a snippet with the default entry point and no declared limits
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            entry_point: default_entry_point(),
            limits: RunLimits::new(),
        }
    }

    /// Set the entry point
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// Declare a wall clock limit in milliseconds
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.limits.wall_time_ms = Some(ms);
        self
    }

    /// Declare a memory budget in bytes
    pub fn with_memory_cap_bytes(mut self, bytes: u64) -> Self {
        self.limits.memory_cap_bytes = Some(bytes);
        self
    }

    /// Replace the declared limits wholesale
    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Unique identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Declared entry point
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Declared limits
    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// Check structural requirements before registration
    pub(crate) fn validate(&self) -> Result<(), RegistryError> {
        if self.id.trim().is_empty() {
            return Err(RegistryError::InvalidSnippet(
                "snippet id must not be empty".to_string(),
            ));
        }
        if self.entry_point.trim().is_empty() {
            return Err(RegistryError::InvalidSnippet(format!(
                "snippet '{}' has an empty entry point",
                self.id
            )));
        }
        if self.limits.wall_time_ms == Some(0) {
            return Err(RegistryError::InvalidSnippet(format!(
                "snippet '{}' declares a zero wall clock limit",
                self.id
            )));
        }
        if self.limits.memory_cap_bytes == Some(0) {
            return Err(RegistryError::InvalidSnippet(format!(
                "snippet '{}' declares a zero memory budget",
                self.id
            )));
        }
        Ok(())
    }
}
