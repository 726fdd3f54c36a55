use serde::Deserialize;
use thiserror::Error;

use crate::types::RunLimits;

mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../playbox.example.toml");

/// Fallback policy values used when the configuration does not set them.
pub mod defaults {
    /// Default worker pool size
    pub const CONCURRENCY: usize = 4;
    /// Default admission wait in milliseconds
    pub const QUEUE_WAIT_MS: u64 = 2_000;
    /// Default cooperative-unwind grace period in milliseconds
    pub const GRACE_MS: u64 = 25;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What `register` does when the snippet id already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacePolicy {
    /// Replace the stored snippet wholesale (in-flight runs are unaffected)
    #[default]
    Replace,

    /// Reject the registration with a duplicate-id error
    Conflict,
}

/// Config for Playbox
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Worker pool size: how many runs may execute at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// How long a submission may wait for a worker slot before failing
    /// with a queue timeout, in milliseconds.
    #[serde(default = "default_queue_wait_ms")]
    pub queue_wait_ms: u64,

    /// Grace period granted to a stopped run for cooperative unwind before
    /// it is forcibly aborted, in milliseconds.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    /// Registration behavior for duplicate snippet ids.
    #[serde(default)]
    pub replace_policy: ReplacePolicy,

    /// Default resource limits applied to all runs.
    /// Per-snippet declarations and per-request overrides take precedence.
    #[serde(default)]
    pub default_limits: RunLimits,
}

impl Config {
    /// Create a config from the embedded example
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge resource limits with the configured defaults
    pub fn effective_limits(&self, overrides: Option<&RunLimits>) -> RunLimits {
        match overrides {
            Some(limits) => self.default_limits.with_overrides(limits),
            None => self.default_limits.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_concurrency() -> usize {
    defaults::CONCURRENCY
}

fn default_queue_wait_ms() -> u64 {
    defaults::QUEUE_WAIT_MS
}

fn default_grace_ms() -> u64 {
    defaults::GRACE_MS
}
