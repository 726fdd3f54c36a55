use std::time::{Duration, Instant};

use playbox::{RunRequest, RunStatus, Snippet};

use super::{fixture_source, harness};

#[tokio::test]
async fn infinite_loop_times_out_within_bounded_overshoot() {
    let (registry, scheduler) = harness(2);
    registry
        .register(Snippet::new("spinner", fixture_source("spinner.play")).with_timeout_ms(10))
        .unwrap();

    let started = Instant::now();
    let result = scheduler.run(RunRequest::new("spinner")).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(result.status, RunStatus::TimedOut);
    // Deadline (10ms) plus grace (25ms) plus scheduling slack
    assert!(elapsed < Duration::from_millis(500), "took {elapsed:?}");
}

#[tokio::test]
async fn timeout_override_shortens_a_declared_limit() {
    let (registry, scheduler) = harness(2);
    registry
        .register(Snippet::new("spinner", fixture_source("spinner.play")).with_timeout_ms(5_000))
        .unwrap();

    let started = Instant::now();
    let result = scheduler
        .run(RunRequest::new("spinner").with_timeout_ms(20))
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::TimedOut);
    assert!(started.elapsed() < Duration::from_millis(1_000));
}

#[tokio::test]
async fn output_flushed_before_the_deadline_is_kept() {
    let (registry, scheduler) = harness(2);
    registry
        .register(
            Snippet::new("half", "fn main\nprint early\nloop\nend").with_timeout_ms(30),
        )
        .unwrap();

    let result = scheduler.run(RunRequest::new("half")).await.unwrap();
    assert_eq!(result.status, RunStatus::TimedOut);
    assert_eq!(result.stdout, b"early");
}

#[tokio::test]
async fn completed_run_reports_duration() {
    let (registry, scheduler) = harness(2);
    registry
        .register(Snippet::new("napper", "fn main\nsleep 50\nend").with_timeout_ms(2_000))
        .unwrap();

    let result = scheduler.run(RunRequest::new("napper")).await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.duration >= Duration::from_millis(50));
}
