use std::time::Duration;

use playbox::{
    Config, RegistryError, ReplacePolicy, RunRequest, RunScheduler, RunStatus, Snippet,
    SnippetRegistry,
};

use super::{fixture_source, harness};

#[tokio::test]
async fn register_lookup_remove_roundtrip() {
    let (registry, _scheduler) = harness(2);

    registry
        .register(Snippet::new("demo", "fn main\nprint x\nend"))
        .expect("registration should succeed");
    assert_eq!(registry.lookup("demo").unwrap().id(), "demo");

    registry.remove("demo").expect("removal should succeed");
    assert!(matches!(
        registry.lookup("demo"),
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn re_registering_identical_content_is_idempotent() {
    let (registry, scheduler) = harness(2);
    let snippet = Snippet::new("sum", fixture_source("sum.play")).with_timeout_ms(1_000);

    registry.register(snippet.clone()).unwrap();
    registry.register(snippet).unwrap();

    assert_eq!(registry.len(), 1);
    let result = scheduler.run(RunRequest::new("sum")).await.unwrap();
    assert_eq!(result.stdout, b"15");
}

#[tokio::test]
async fn conflict_policy_surfaces_duplicate_id() {
    let config = Config {
        replace_policy: ReplacePolicy::Conflict,
        ..Config::default()
    };
    let registry = SnippetRegistry::new(config.replace_policy);

    registry
        .register(Snippet::new("once", "fn main\nend"))
        .unwrap();
    assert!(matches!(
        registry.register(Snippet::new("once", "fn main\nend")),
        Err(RegistryError::DuplicateId(_))
    ));
}

#[tokio::test]
async fn snippet_with_running_run_cannot_be_removed() {
    let (registry, scheduler) = harness(2);
    registry
        .register(Snippet::new("napper", fixture_source("napper.play")).with_timeout_ms(2_000))
        .unwrap();

    let handle = scheduler.submit(RunRequest::new("napper")).await.unwrap();

    // The run holds the snippet; removal must be refused
    assert!(matches!(
        registry.remove("napper"),
        Err(RegistryError::InUse(_))
    ));

    let result = handle.outcome().await;
    assert_eq!(result.status, RunStatus::Completed);

    // Terminal status releases the reference
    registry.remove("napper").expect("removal after terminal");
}

#[tokio::test]
async fn replacement_does_not_disturb_in_flight_run() {
    let (registry, scheduler) = harness(2);
    registry
        .register(Snippet::new("napper", "fn main\nsleep 200\nprint old\nend").with_timeout_ms(2_000))
        .unwrap();

    let handle = scheduler.submit(RunRequest::new("napper")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Replace while the first run is still sleeping
    registry
        .register(Snippet::new("napper", "fn main\nprint new\nend"))
        .unwrap();

    // The in-flight run still executes the source it checked out
    let first = handle.outcome().await;
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first.stdout, b"old");

    // A new run sees the replacement
    let second = scheduler.run(RunRequest::new("napper")).await.unwrap();
    assert_eq!(second.stdout, b"new");
}

#[tokio::test]
async fn scheduler_reads_in_flight_set_shared_with_registry() {
    let config = Config::default();
    let registry = std::sync::Arc::new(SnippetRegistry::new(config.replace_policy));
    let scheduler = RunScheduler::new(&config, std::sync::Arc::clone(&registry));

    registry
        .register(Snippet::new("napper", fixture_source("napper.play")).with_timeout_ms(2_000))
        .unwrap();

    let in_flight = registry.in_flight();
    assert_eq!(in_flight.total(), 0);

    let handle = scheduler.submit(RunRequest::new("napper")).await.unwrap();
    assert_eq!(in_flight.count("napper"), 1);

    handle.outcome().await;
    assert_eq!(in_flight.total(), 0);
}
