//! Integration tests for playbox
//!
//! The sandbox is fully in-process, so these tests need no external binary
//! or privileges. Run with: cargo test -p playbox --test integration

use std::fs;
use std::sync::Arc;

use playbox::{Config, RunScheduler, SnippetRegistry};

mod concurrency;
mod config_loading;
mod execution;
mod registry_lifecycle;
mod timeouts;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture snippet source
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/snippets/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Create a test config with a short queue wait so timeout paths stay fast
pub(crate) fn test_config(concurrency: usize) -> Config {
    Config {
        concurrency,
        queue_wait_ms: 500,
        ..Config::default()
    }
}

/// Registry plus scheduler wired together the way library users do it
pub(crate) fn harness(concurrency: usize) -> (Arc<SnippetRegistry>, Arc<RunScheduler>) {
    let config = test_config(concurrency);
    let registry = Arc::new(SnippetRegistry::new(config.replace_policy));
    let scheduler = Arc::new(RunScheduler::new(&config, Arc::clone(&registry)));
    (registry, scheduler)
}
